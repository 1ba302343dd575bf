//! Events of the attempt aggregates.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{AggregateId, CourseId, QuizId, UserId};
use messaging::{Answer, GradedQuestion};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::UserQuizStatus;

/// Events of the [`UserQuiz`](super::UserQuiz) aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum UserQuizEvent {
    UserQuizCreated(UserQuizCreatedData),
    AttemptRetaken(AttemptRetakenData),
    /// An attempt number was handed to a new result.
    ResultStarted(ResultStartedData),
    GradeRecorded(GradeRecordedData),
}

impl DomainEvent for UserQuizEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserQuizEvent::UserQuizCreated(_) => "UserQuizCreated",
            UserQuizEvent::AttemptRetaken(_) => "AttemptRetaken",
            UserQuizEvent::ResultStarted(_) => "ResultStarted",
            UserQuizEvent::GradeRecorded(_) => "GradeRecorded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserQuizCreatedData {
    pub user_quiz_id: AggregateId,
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub course_id: CourseId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRetakenData {
    /// Attempt count after the retake.
    pub attempt_count: u32,
    pub retaken_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultStartedData {
    pub result_id: AggregateId,
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeRecordedData {
    pub result_id: AggregateId,
    pub points_earned: f64,
    pub is_passed: bool,
    /// Best score after this grade.
    pub best_score: f64,
    /// Status after this grade.
    pub status: UserQuizStatus,
    /// True when this grade moved the user quiz to Passed for the first time.
    pub first_pass: bool,
    pub recorded_at: DateTime<Utc>,
}

impl UserQuizEvent {
    pub fn user_quiz_created(
        user_quiz_id: AggregateId,
        user_id: UserId,
        quiz_id: QuizId,
        course_id: CourseId,
    ) -> Self {
        UserQuizEvent::UserQuizCreated(UserQuizCreatedData {
            user_quiz_id,
            user_id,
            quiz_id,
            course_id,
            created_at: Utc::now(),
        })
    }

    pub fn attempt_retaken(attempt_count: u32) -> Self {
        UserQuizEvent::AttemptRetaken(AttemptRetakenData {
            attempt_count,
            retaken_at: Utc::now(),
        })
    }

    pub fn result_started(result_id: AggregateId, attempt_number: u32) -> Self {
        UserQuizEvent::ResultStarted(ResultStartedData {
            result_id,
            attempt_number,
            started_at: Utc::now(),
        })
    }

    pub fn grade_recorded(
        result_id: AggregateId,
        points_earned: f64,
        is_passed: bool,
        best_score: f64,
        status: UserQuizStatus,
        first_pass: bool,
    ) -> Self {
        UserQuizEvent::GradeRecorded(GradeRecordedData {
            result_id,
            points_earned,
            is_passed,
            best_score,
            status,
            first_pass,
            recorded_at: Utc::now(),
        })
    }
}

/// Events of the [`QuizResult`](super::QuizResult) aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum QuizResultEvent {
    ResultOpened(ResultOpenedData),
    AnswersSubmitted(AnswersSubmittedData),
    ResultGraded(ResultGradedData),
    /// The submission was published again by reconciliation.
    SubmissionRepublished(SubmissionRepublishedData),
    /// Reconciliation stopped republishing; the result stays Pending.
    SubmissionAbandoned(SubmissionAbandonedData),
}

impl DomainEvent for QuizResultEvent {
    fn event_type(&self) -> &'static str {
        match self {
            QuizResultEvent::ResultOpened(_) => "ResultOpened",
            QuizResultEvent::AnswersSubmitted(_) => "AnswersSubmitted",
            QuizResultEvent::ResultGraded(_) => "ResultGraded",
            QuizResultEvent::SubmissionRepublished(_) => "SubmissionRepublished",
            QuizResultEvent::SubmissionAbandoned(_) => "SubmissionAbandoned",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultOpenedData {
    pub result_id: AggregateId,
    pub user_quiz_id: AggregateId,
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub course_id: CourseId,
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswersSubmittedData {
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub submitted_at: DateTime<Utc>,
    pub duration_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultGradedData {
    pub score: f64,
    pub total_marks: f64,
    pub percentage_score: f64,
    pub is_passed: bool,
    pub graded_questions: Vec<GradedQuestion>,
    pub graded_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRepublishedData {
    /// Number of republishes including this one.
    pub republish_count: u32,
    pub republished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionAbandonedData {
    pub republish_count: u32,
    pub abandoned_at: DateTime<Utc>,
}

impl QuizResultEvent {
    pub fn answers_submitted(
        answers: Vec<Answer>,
        metadata: HashMap<String, serde_json::Value>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let submitted_at = Utc::now();
        QuizResultEvent::AnswersSubmitted(AnswersSubmittedData {
            answers,
            metadata,
            submitted_at,
            duration_seconds: (submitted_at - started_at).num_seconds().max(0),
        })
    }

    pub fn submission_republished(republish_count: u32) -> Self {
        QuizResultEvent::SubmissionRepublished(SubmissionRepublishedData {
            republish_count,
            republished_at: Utc::now(),
        })
    }

    pub fn submission_abandoned(republish_count: u32) -> Self {
        QuizResultEvent::SubmissionAbandoned(SubmissionAbandonedData {
            republish_count,
            abandoned_at: Utc::now(),
        })
    }
}
