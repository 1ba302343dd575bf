use async_trait::async_trait;
use common::{ChoiceId, CourseId, QuestionId, QuizId};
use messaging::QuestionType;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    AnswerKey, Question, QuestionBank, QuestionBankError, QuestionChoice, QuestionStatus, Quiz,
    QuizQuestion, QuizStatus, Result,
};

/// PostgreSQL-backed question bank.
#[derive(Clone)]
pub struct PgQuestionBank {
    pool: PgPool,
}

impl PgQuestionBank {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and runs pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("../../migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inserts or replaces a question and its choices.
    pub async fn save_question(&self, question: &Question) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO questions (id, course_id, text, question_type, points, status, correct_answer)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                text = EXCLUDED.text,
                question_type = EXCLUDED.question_type,
                points = EXCLUDED.points,
                status = EXCLUDED.status,
                correct_answer = EXCLUDED.correct_answer
            "#,
        )
        .bind(question.id.as_uuid())
        .bind(question.course_id.as_uuid())
        .bind(&question.text)
        .bind(question.question_type.as_str())
        .bind(question.points)
        .bind(question.status.as_str())
        .bind(&question.correct_answer)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM question_choices WHERE question_id = $1")
            .bind(question.id.as_uuid())
            .execute(&mut *tx)
            .await?;

        for (position, choice) in question.choices.iter().enumerate() {
            sqlx::query(
                "INSERT INTO question_choices (id, question_id, text, is_correct, position) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(choice.id.as_uuid())
            .bind(question.id.as_uuid())
            .bind(&choice.text)
            .bind(choice.is_correct)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Inserts or replaces a quiz and its question list.
    pub async fn save_quiz(&self, quiz: &Quiz) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO quizzes (id, course_id, name, total_marks, duration_minutes, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                total_marks = EXCLUDED.total_marks,
                duration_minutes = EXCLUDED.duration_minutes,
                status = EXCLUDED.status
            "#,
        )
        .bind(quiz.id.as_uuid())
        .bind(quiz.course_id.as_uuid())
        .bind(&quiz.name)
        .bind(quiz.total_marks)
        .bind(quiz.duration_minutes)
        .bind(quiz.status.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM quiz_questions WHERE quiz_id = $1")
            .bind(quiz.id.as_uuid())
            .execute(&mut *tx)
            .await?;

        for slot in &quiz.questions {
            sqlx::query(
                "INSERT INTO quiz_questions (quiz_id, question_id, point_override, order_index) VALUES ($1, $2, $3, $4)",
            )
            .bind(quiz.id.as_uuid())
            .bind(slot.question_id.as_uuid())
            .bind(slot.point_override)
            .bind(slot.order_index)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_quiz(&self, quiz_id: QuizId) -> Result<Option<Quiz>> {
        let Some(row) = sqlx::query(
            "SELECT id, course_id, name, total_marks, duration_minutes, status FROM quizzes WHERE id = $1",
        )
        .bind(quiz_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let slots = sqlx::query(
            "SELECT question_id, point_override, order_index FROM quiz_questions WHERE quiz_id = $1 ORDER BY order_index",
        )
        .bind(quiz_id.as_uuid())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|r| {
            Ok(QuizQuestion {
                question_id: QuestionId::from_uuid(r.try_get::<Uuid, _>("question_id")?),
                point_override: r.try_get("point_override")?,
                order_index: r.try_get("order_index")?,
            })
        })
        .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

        let status: String = row.try_get("status")?;
        Ok(Some(Quiz {
            id: quiz_id,
            course_id: CourseId::from_uuid(row.try_get::<Uuid, _>("course_id")?),
            name: row.try_get("name")?,
            total_marks: row.try_get("total_marks")?,
            duration_minutes: row.try_get("duration_minutes")?,
            status: QuizStatus::parse(&status).unwrap_or(QuizStatus::Hidden),
            questions: slots,
        }))
    }

    async fn load_questions(&self, quiz_id: QuizId) -> Result<Vec<Question>> {
        let rows = sqlx::query(
            r#"
            SELECT q.id, q.course_id, q.text, q.question_type, q.points, q.status, q.correct_answer
            FROM questions q
            JOIN quiz_questions qq ON qq.question_id = q.id
            WHERE qq.quiz_id = $1
            "#,
        )
        .bind(quiz_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let choice_rows = sqlx::query(
            r#"
            SELECT c.id, c.question_id, c.text, c.is_correct
            FROM question_choices c
            JOIN quiz_questions qq ON qq.question_id = c.question_id
            WHERE qq.quiz_id = $1
            ORDER BY c.question_id, c.position
            "#,
        )
        .bind(quiz_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in rows {
            let id = QuestionId::from_uuid(row.try_get::<Uuid, _>("id")?);
            let type_name: String = row.try_get("question_type")?;
            let question_type = parse_question_type(&type_name).ok_or_else(|| {
                QuestionBankError::MalformedQuestion {
                    question_id: id,
                    reason: format!("unknown question type '{type_name}'"),
                }
            })?;
            let status: String = row.try_get("status")?;

            let mut choices = Vec::new();
            for c in &choice_rows {
                if c.try_get::<Uuid, _>("question_id")? == id.as_uuid() {
                    choices.push(QuestionChoice {
                        id: ChoiceId::from_uuid(c.try_get::<Uuid, _>("id")?),
                        text: c.try_get("text")?,
                        is_correct: c.try_get("is_correct")?,
                    });
                }
            }

            questions.push(Question {
                id,
                course_id: CourseId::from_uuid(row.try_get::<Uuid, _>("course_id")?),
                text: row.try_get("text")?,
                question_type,
                points: row.try_get("points")?,
                status: QuestionStatus::parse(&status).unwrap_or(QuestionStatus::Active),
                choices,
                correct_answer: row.try_get("correct_answer")?,
            });
        }

        Ok(questions)
    }
}

fn parse_question_type(value: &str) -> Option<QuestionType> {
    match value {
        "MultipleChoice" => Some(QuestionType::MultipleChoice),
        "TrueFalse" => Some(QuestionType::TrueFalse),
        "ShortAnswer" => Some(QuestionType::ShortAnswer),
        _ => None,
    }
}

#[async_trait]
impl QuestionBank for PgQuestionBank {
    #[tracing::instrument(skip(self))]
    async fn answer_key(&self, quiz_id: QuizId) -> Result<Option<AnswerKey>> {
        let Some(quiz) = self.load_quiz(quiz_id).await? else {
            return Ok(None);
        };
        let questions = self.load_questions(quiz_id).await?;
        AnswerKey::build(&quiz, &questions).map(Some)
    }
}
