//! Message contracts exchanged by the two halves of the grading saga.
//!
//! Field names are camelCase on the wire. Answers are a tagged union keyed
//! by `questionType`, so a choice answer can never carry free text and a
//! short answer can never carry choice ids.

use chrono::{DateTime, Utc};
use common::{AggregateId, ChoiceId, CourseId, QuestionId, QuizId, UserId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A message that can travel over the saga channel.
pub trait Message: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// Channel the message is published to.
    const TOPIC: &'static str;

    /// Partition key. Both saga messages are keyed by the attempt result so
    /// that messages about one attempt stay on one partition.
    fn key(&self) -> AggregateId;
}

/// The kind of a question in the question bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

impl QuestionType {
    /// Returns true for types graded by comparing selected choices.
    pub fn is_choice_based(&self) -> bool {
        matches!(self, QuestionType::MultipleChoice | QuestionType::TrueFalse)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "MultipleChoice",
            QuestionType::TrueFalse => "TrueFalse",
            QuestionType::ShortAnswer => "ShortAnswer",
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One answer given by a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "questionType", rename_all_fields = "camelCase")]
pub enum Answer {
    MultipleChoice {
        question_id: QuestionId,
        #[serde(default)]
        selected_choice_ids: Vec<ChoiceId>,
    },
    TrueFalse {
        question_id: QuestionId,
        #[serde(default)]
        selected_choice_ids: Vec<ChoiceId>,
    },
    ShortAnswer {
        question_id: QuestionId,
        #[serde(default)]
        text_answer: String,
    },
}

impl Answer {
    pub fn multiple_choice(
        question_id: QuestionId,
        selected: impl IntoIterator<Item = ChoiceId>,
    ) -> Self {
        Answer::MultipleChoice {
            question_id,
            selected_choice_ids: selected.into_iter().collect(),
        }
    }

    pub fn true_false(question_id: QuestionId, selected: ChoiceId) -> Self {
        Answer::TrueFalse {
            question_id,
            selected_choice_ids: vec![selected],
        }
    }

    pub fn short_answer(question_id: QuestionId, text: impl Into<String>) -> Self {
        Answer::ShortAnswer {
            question_id,
            text_answer: text.into(),
        }
    }

    pub fn question_id(&self) -> QuestionId {
        match self {
            Answer::MultipleChoice { question_id, .. }
            | Answer::TrueFalse { question_id, .. }
            | Answer::ShortAnswer { question_id, .. } => *question_id,
        }
    }

    pub fn question_type(&self) -> QuestionType {
        match self {
            Answer::MultipleChoice { .. } => QuestionType::MultipleChoice,
            Answer::TrueFalse { .. } => QuestionType::TrueFalse,
            Answer::ShortAnswer { .. } => QuestionType::ShortAnswer,
        }
    }
}

/// Published by the attempt owner once a student's answers are recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmitted {
    pub result_id: AggregateId,
    pub quiz_id: QuizId,
    pub user_quiz_id: AggregateId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub answers: Vec<Answer>,
    pub submitted_at: DateTime<Utc>,
}

impl Message for QuizSubmitted {
    const TOPIC: &'static str = "quiz.submitted";

    fn key(&self) -> AggregateId {
        self.result_id
    }
}

/// Per-question outcome reported back to the attempt owner.
///
/// Deliberately carries no answer-key content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedQuestion {
    pub question_id: QuestionId,
    pub is_correct: bool,
    pub points_earned: f64,
    pub max_points: f64,
}

/// Published by the grading engine after grading a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizGraded {
    pub quiz_id: QuizId,
    pub result_id: AggregateId,
    pub user_quiz_id: AggregateId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub total_points_earned: f64,
    pub total_marks: f64,
    pub percentage_score: f64,
    pub is_passed: bool,
    pub graded_questions: Vec<GradedQuestion>,
    pub graded_at: DateTime<Utc>,
}

impl Message for QuizGraded {
    const TOPIC: &'static str = "quiz.graded";

    fn key(&self) -> AggregateId {
        self.result_id
    }
}
