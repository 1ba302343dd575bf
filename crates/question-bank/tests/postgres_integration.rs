//! PostgreSQL question bank tests.
//!
//! ```bash
//! cargo test -p question-bank --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{CourseId, QuizId};
use messaging::Answer;
use question_bank::{
    GradingEngine, PgQuestionBank, Question, QuestionBank, QuestionChoice, Quiz,
};
use serial_test::serial;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn fresh_bank() -> PgQuestionBank {
    let info = container_info().await;
    let bank = PgQuestionBank::connect(&info.connection_string)
        .await
        .unwrap();
    sqlx::query("TRUNCATE TABLE quiz_questions, question_choices, questions, quizzes")
        .execute(bank.pool())
        .await
        .unwrap();
    bank
}

#[tokio::test]
#[serial]
async fn missing_quiz_returns_none() {
    let bank = fresh_bank().await;
    assert!(bank.answer_key(QuizId::new()).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn stored_quiz_grades_like_in_memory() {
    let bank = fresh_bank().await;
    let course = CourseId::new();

    let mc = Question::multiple_choice(
        course,
        "Pick A",
        5.0,
        vec![QuestionChoice::new("A", true), QuestionChoice::new("B", false)],
    );
    let sa = Question::short_answer(course, "Capital of France?", 5.0, "Paris");
    let quiz = Quiz::new(course, "Stored")
        .with_question(mc.id, None)
        .with_question(sa.id, Some(10.0));

    bank.save_question(&mc).await.unwrap();
    bank.save_question(&sa).await.unwrap();
    bank.save_quiz(&quiz).await.unwrap();

    let key = bank.answer_key(quiz.id).await.unwrap().unwrap();
    assert_eq!(key.entries().len(), 2);
    assert_eq!(key.entries()[0].question_id, mc.id);
    assert_eq!(key.total_marks(), 15.0);

    let answers = vec![
        Answer::multiple_choice(mc.id, [mc.choice("A").unwrap().id]),
        Answer::short_answer(sa.id, " PARIS"),
    ];
    let report = GradingEngine::default().grade(&key, &answers);
    assert_eq!(report.total_points_earned, 15.0);
    assert_eq!(report.percentage_score, 100.0);
}

#[tokio::test]
#[serial]
async fn resaving_a_question_replaces_its_choices() {
    let bank = fresh_bank().await;
    let course = CourseId::new();

    let mut question = Question::multiple_choice(
        course,
        "Pick A",
        1.0,
        vec![QuestionChoice::new("A", true), QuestionChoice::new("B", false)],
    );
    let quiz = Quiz::new(course, "Edited").with_question(question.id, None);
    bank.save_question(&question).await.unwrap();
    bank.save_quiz(&quiz).await.unwrap();

    question.choices = vec![QuestionChoice::new("C", true)];
    bank.save_question(&question).await.unwrap();

    let key = bank.answer_key(quiz.id).await.unwrap().unwrap();
    let answer = Answer::multiple_choice(question.id, [question.choices[0].id]);
    let report = GradingEngine::default().grade(&key, &[answer]);
    assert_eq!(report.total_points_earned, 1.0);
}
