//! Answer-key lookup.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{QuestionId, QuizId};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::{AnswerKey, Question, QuestionBankError, Quiz, Result};

/// Read access to quizzes and their answer keys.
///
/// Grading only ever reads through this trait; nothing here writes on
/// behalf of a submission.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Loads the answer key of a quiz, or `None` if the quiz does not exist.
    async fn answer_key(&self, quiz_id: QuizId) -> Result<Option<AnswerKey>>;
}

#[derive(Default)]
struct Catalog {
    quizzes: HashMap<QuizId, Quiz>,
    questions: HashMap<QuestionId, Question>,
}

/// Quizzes and questions to load into an [`InMemoryQuestionBank`].
#[derive(Debug, Default, Deserialize)]
pub struct CatalogFixture {
    #[serde(default)]
    pub quizzes: Vec<Quiz>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// In-memory question bank for tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryQuestionBank {
    catalog: Arc<RwLock<Catalog>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryQuestionBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a bank from a JSON [`CatalogFixture`].
    pub fn from_fixture_json(json: &str) -> Result<Self> {
        let fixture: CatalogFixture = serde_json::from_str(json)?;
        let catalog = Catalog {
            quizzes: fixture.quizzes.into_iter().map(|q| (q.id, q)).collect(),
            questions: fixture.questions.into_iter().map(|q| (q.id, q)).collect(),
        };
        tracing::info!(
            quizzes = catalog.quizzes.len(),
            questions = catalog.questions.len(),
            "Loaded question bank fixture"
        );
        Ok(Self {
            catalog: Arc::new(RwLock::new(catalog)),
            unavailable: Arc::default(),
        })
    }

    pub async fn quiz_count(&self) -> usize {
        self.catalog.read().await.quizzes.len()
    }

    pub async fn insert_question(&self, question: Question) {
        self.catalog
            .write()
            .await
            .questions
            .insert(question.id, question);
    }

    pub async fn insert_quiz(&self, quiz: Quiz) {
        self.catalog.write().await.quizzes.insert(quiz.id, quiz);
    }

    /// Stores a quiz together with its questions.
    pub async fn seed(&self, quiz: Quiz, questions: Vec<Question>) {
        let mut catalog = self.catalog.write().await;
        for question in questions {
            catalog.questions.insert(question.id, question);
        }
        catalog.quizzes.insert(quiz.id, quiz);
    }

    pub async fn remove_quiz(&self, quiz_id: QuizId) -> Option<Quiz> {
        self.catalog.write().await.quizzes.remove(&quiz_id)
    }

    /// Makes lookups fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl QuestionBank for InMemoryQuestionBank {
    async fn answer_key(&self, quiz_id: QuizId) -> Result<Option<AnswerKey>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QuestionBankError::Unavailable);
        }

        let catalog = self.catalog.read().await;
        let Some(quiz) = catalog.quizzes.get(&quiz_id) else {
            return Ok(None);
        };

        let questions: Vec<Question> = quiz
            .questions
            .iter()
            .filter_map(|slot| catalog.questions.get(&slot.question_id).cloned())
            .collect();

        AnswerKey::build(quiz, &questions).map(Some)
    }
}
