//! The QuizResult aggregate: one attempt at a quiz.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{AggregateId, ChoiceId, CourseId, QuestionId, QuizId, UserId};
use event_store::Version;
use messaging::{Answer, GradedQuestion, QuizGraded, QuizSubmitted};

use crate::aggregate::Aggregate;

use super::{
    AttemptError, QuizResultEvent, ResultStatus,
    events::{AnswersSubmittedData, ResultGradedData, ResultOpenedData},
};

#[derive(Debug, Clone, Default)]
pub struct QuizResult {
    id: Option<AggregateId>,
    version: Version,
    user_quiz_id: Option<AggregateId>,
    user_id: Option<UserId>,
    quiz_id: Option<QuizId>,
    course_id: Option<CourseId>,
    attempt_number: u32,
    status: ResultStatus,
    answers: Vec<Answer>,
    metadata: HashMap<String, serde_json::Value>,
    score: Option<f64>,
    total_marks: Option<f64>,
    percentage_score: Option<f64>,
    is_passed: Option<bool>,
    graded_questions: Vec<GradedQuestion>,
    started_at: Option<DateTime<Utc>>,
    submitted_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    duration_seconds: Option<i64>,
    republish_count: u32,
    last_republished_at: Option<DateTime<Utc>>,
    abandoned_at: Option<DateTime<Utc>>,
}

impl Aggregate for QuizResult {
    type Event = QuizResultEvent;
    type Error = AttemptError;

    fn aggregate_type() -> &'static str {
        "QuizResult"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            QuizResultEvent::ResultOpened(data) => self.apply_opened(data),
            QuizResultEvent::AnswersSubmitted(data) => self.apply_submitted(data),
            QuizResultEvent::ResultGraded(data) => self.apply_graded(data),
            QuizResultEvent::SubmissionRepublished(data) => {
                self.republish_count = data.republish_count;
                self.last_republished_at = Some(data.republished_at);
            }
            QuizResultEvent::SubmissionAbandoned(data) => {
                self.republish_count = data.republish_count;
                self.abandoned_at = Some(data.abandoned_at);
            }
        }
    }
}

impl QuizResult {
    fn apply_opened(&mut self, data: ResultOpenedData) {
        self.id = Some(data.result_id);
        self.user_quiz_id = Some(data.user_quiz_id);
        self.user_id = Some(data.user_id);
        self.quiz_id = Some(data.quiz_id);
        self.course_id = Some(data.course_id);
        self.attempt_number = data.attempt_number;
        self.status = ResultStatus::InProgress;
        self.started_at = Some(data.started_at);
    }

    fn apply_submitted(&mut self, data: AnswersSubmittedData) {
        self.answers = data.answers;
        self.metadata = data.metadata;
        self.submitted_at = Some(data.submitted_at);
        self.duration_seconds = Some(data.duration_seconds);
        self.status = ResultStatus::Pending;
    }

    fn apply_graded(&mut self, data: ResultGradedData) {
        self.score = Some(data.score);
        self.total_marks = Some(data.total_marks);
        self.percentage_score = Some(data.percentage_score);
        self.is_passed = Some(data.is_passed);
        self.graded_questions = data.graded_questions;
        self.completed_at = Some(data.completed_at);
        self.status = ResultStatus::Completed;
    }
}

// Query methods
impl QuizResult {
    pub fn user_quiz_id(&self) -> Option<AggregateId> {
        self.user_quiz_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn quiz_id(&self) -> Option<QuizId> {
        self.quiz_id
    }

    pub fn course_id(&self) -> Option<CourseId> {
        self.course_id
    }

    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    pub fn status(&self) -> ResultStatus {
        self.status
    }

    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    /// (question, choice) pairs picked on choice-based questions.
    pub fn selected_choices(&self) -> Vec<(QuestionId, ChoiceId)> {
        self.answers
            .iter()
            .flat_map(|answer| match answer {
                Answer::MultipleChoice {
                    question_id,
                    selected_choice_ids,
                }
                | Answer::TrueFalse {
                    question_id,
                    selected_choice_ids,
                } => selected_choice_ids
                    .iter()
                    .map(|choice| (*question_id, *choice))
                    .collect::<Vec<_>>(),
                Answer::ShortAnswer { .. } => Vec::new(),
            })
            .collect()
    }

    /// Free-text answers given on short-answer questions.
    pub fn input_answers(&self) -> Vec<(QuestionId, &str)> {
        self.answers
            .iter()
            .filter_map(|answer| match answer {
                Answer::ShortAnswer {
                    question_id,
                    text_answer,
                } => Some((*question_id, text_answer.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn total_marks(&self) -> Option<f64> {
        self.total_marks
    }

    pub fn percentage_score(&self) -> Option<f64> {
        self.percentage_score
    }

    pub fn is_passed(&self) -> Option<bool> {
        self.is_passed
    }

    pub fn graded_questions(&self) -> &[GradedQuestion] {
        &self.graded_questions
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.duration_seconds
    }

    pub fn republish_count(&self) -> u32 {
        self.republish_count
    }

    /// When `QuizSubmitted` last went out for this result: the latest
    /// republish, or the original submission.
    pub fn last_published_at(&self) -> Option<DateTime<Utc>> {
        self.last_republished_at.or(self.submitted_at)
    }

    pub fn abandoned_at(&self) -> Option<DateTime<Utc>> {
        self.abandoned_at
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned_at.is_some()
    }

    /// Rebuilds the submission message for this result.
    ///
    /// Returns `None` until answers have been submitted.
    pub fn to_submission(&self) -> Option<QuizSubmitted> {
        Some(QuizSubmitted {
            result_id: self.id?,
            quiz_id: self.quiz_id?,
            user_quiz_id: self.user_quiz_id?,
            user_id: self.user_id?,
            course_id: self.course_id?,
            answers: self.answers.clone(),
            submitted_at: self.submitted_at?,
        })
    }
}

// Command methods (return events)
impl QuizResult {
    pub fn open(
        &self,
        result_id: AggregateId,
        user_quiz_id: AggregateId,
        user_id: UserId,
        quiz_id: QuizId,
        course_id: CourseId,
        attempt_number: u32,
    ) -> Result<Vec<QuizResultEvent>, AttemptError> {
        if let Some(existing) = self.user_quiz_id {
            // Reopening from the same user quiz is a retry of the same start.
            if existing == user_quiz_id {
                return Ok(vec![]);
            }
            return Err(AttemptError::ResultAlreadyExists(result_id));
        }

        Ok(vec![QuizResultEvent::ResultOpened(ResultOpenedData {
            result_id,
            user_quiz_id,
            user_id,
            quiz_id,
            course_id,
            attempt_number,
            started_at: Utc::now(),
        })])
    }

    /// Records the student's answers and moves the result to Pending.
    pub fn submit(
        &self,
        answers: Vec<Answer>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<Vec<QuizResultEvent>, AttemptError> {
        let started_at = self.started_at.ok_or(AttemptError::ResultNotFound)?;

        if !self.status.can_submit() {
            return Err(AttemptError::InvalidResultTransition {
                current: self.status,
                action: "submit",
            });
        }

        Ok(vec![QuizResultEvent::answers_submitted(
            answers, metadata, started_at,
        )])
    }

    /// Applies a grade. A result that is already Completed keeps its score.
    pub fn grade(&self, graded: &QuizGraded) -> Result<Vec<QuizResultEvent>, AttemptError> {
        if self.id.is_none() {
            return Err(AttemptError::ResultNotFound);
        }

        if self.status.is_terminal() {
            return Ok(vec![]);
        }

        if !self.status.can_grade() {
            return Err(AttemptError::InvalidResultTransition {
                current: self.status,
                action: "grade",
            });
        }

        Ok(vec![QuizResultEvent::ResultGraded(ResultGradedData {
            score: graded.total_points_earned,
            total_marks: graded.total_marks,
            percentage_score: graded.percentage_score,
            is_passed: graded.is_passed,
            graded_questions: graded.graded_questions.clone(),
            graded_at: graded.graded_at,
            completed_at: Utc::now(),
        })])
    }

    /// Notes that the submission was published again.
    pub fn mark_republished(&self) -> Result<Vec<QuizResultEvent>, AttemptError> {
        let id = self.id.ok_or(AttemptError::ResultNotFound)?;

        if self.status != ResultStatus::Pending {
            return Err(AttemptError::InvalidResultTransition {
                current: self.status,
                action: "republish",
            });
        }

        if self.is_abandoned() {
            return Err(AttemptError::SubmissionAbandoned(id));
        }

        Ok(vec![QuizResultEvent::submission_republished(
            self.republish_count + 1,
        )])
    }

    /// Stops reconciliation for a Pending result. Abandoning twice is a
    /// no-op; a late grade can still complete the result afterwards.
    pub fn abandon(&self) -> Result<Vec<QuizResultEvent>, AttemptError> {
        if self.id.is_none() {
            return Err(AttemptError::ResultNotFound);
        }

        if self.is_abandoned() {
            return Ok(vec![]);
        }

        if self.status != ResultStatus::Pending {
            return Err(AttemptError::InvalidResultTransition {
                current: self.status,
                action: "abandon",
            });
        }

        Ok(vec![QuizResultEvent::submission_abandoned(
            self.republish_count,
        )])
    }
}
