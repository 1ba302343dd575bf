//! Attempt commands.

use std::collections::HashMap;

use common::{AggregateId, CourseId, QuizId, UserId};
use messaging::{Answer, QuizGraded};

use crate::command::Command;

use super::{QuizResult, UserQuiz};

/// Create the user's record for a quiz, which is also the first attempt.
#[derive(Debug, Clone)]
pub struct CreateAttempt {
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub course_id: CourseId,
}

impl CreateAttempt {
    pub fn new(user_id: UserId, quiz_id: QuizId, course_id: CourseId) -> Self {
        Self {
            user_id,
            quiz_id,
            course_id,
        }
    }
}

impl Command for CreateAttempt {
    type Aggregate = UserQuiz;

    fn aggregate_id(&self) -> AggregateId {
        UserQuiz::id_for(self.user_id, self.quiz_id)
    }
}

#[derive(Debug, Clone)]
pub struct RetakeAttempt {
    pub user_quiz_id: AggregateId,
}

impl Command for RetakeAttempt {
    type Aggregate = UserQuiz;

    fn aggregate_id(&self) -> AggregateId {
        self.user_quiz_id
    }
}

/// Open a result for the next available attempt.
#[derive(Debug, Clone)]
pub struct StartResult {
    pub user_quiz_id: AggregateId,
    pub result_id: AggregateId,
}

impl StartResult {
    /// Starts a result with a fresh id.
    pub fn for_user_quiz(user_quiz_id: AggregateId) -> Self {
        Self {
            user_quiz_id,
            result_id: AggregateId::new(),
        }
    }
}

impl Command for StartResult {
    type Aggregate = QuizResult;

    fn aggregate_id(&self) -> AggregateId {
        self.result_id
    }
}

#[derive(Debug, Clone)]
pub struct SubmitAnswers {
    pub result_id: AggregateId,
    pub answers: Vec<Answer>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SubmitAnswers {
    pub fn new(result_id: AggregateId, answers: Vec<Answer>) -> Self {
        Self {
            result_id,
            answers,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

impl Command for SubmitAnswers {
    type Aggregate = QuizResult;

    fn aggregate_id(&self) -> AggregateId {
        self.result_id
    }
}

/// Apply a grade to the result it belongs to.
#[derive(Debug, Clone)]
pub struct RecordResultGrade {
    pub graded: QuizGraded,
}

impl Command for RecordResultGrade {
    type Aggregate = QuizResult;

    fn aggregate_id(&self) -> AggregateId {
        self.graded.result_id
    }
}

/// Fold a result's grade into its user quiz.
#[derive(Debug, Clone)]
pub struct RecordUserQuizGrade {
    pub user_quiz_id: AggregateId,
    pub result_id: AggregateId,
    pub points_earned: f64,
    pub is_passed: bool,
}

impl From<&QuizGraded> for RecordUserQuizGrade {
    fn from(graded: &QuizGraded) -> Self {
        Self {
            user_quiz_id: graded.user_quiz_id,
            result_id: graded.result_id,
            points_earned: graded.total_points_earned,
            is_passed: graded.is_passed,
        }
    }
}

impl Command for RecordUserQuizGrade {
    type Aggregate = UserQuiz;

    fn aggregate_id(&self) -> AggregateId {
        self.user_quiz_id
    }
}

#[derive(Debug, Clone)]
pub struct MarkRepublished {
    pub result_id: AggregateId,
}

impl Command for MarkRepublished {
    type Aggregate = QuizResult;

    fn aggregate_id(&self) -> AggregateId {
        self.result_id
    }
}

#[derive(Debug, Clone)]
pub struct AbandonSubmission {
    pub result_id: AggregateId,
}

impl Command for AbandonSubmission {
    type Aggregate = QuizResult;

    fn aggregate_id(&self) -> AggregateId {
        self.result_id
    }
}
