//! The UserQuiz aggregate: one per (user, quiz) pair.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use common::{AggregateId, CourseId, QuizId, UserId};
use event_store::Version;
use uuid::Uuid;

use crate::aggregate::Aggregate;

use super::{
    AttemptError, UserQuizEvent, UserQuizStatus,
    events::{GradeRecordedData, UserQuizCreatedData},
};

/// Namespace for deriving a user quiz id from its (user, quiz) key.
const USER_QUIZ_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a9e_4b7d_4c1a_9e3f_5d8b_1a2c_7e40);

/// A student's standing on one quiz across all attempts.
#[derive(Debug, Clone, Default)]
pub struct UserQuiz {
    id: Option<AggregateId>,
    version: Version,
    user_id: Option<UserId>,
    quiz_id: Option<QuizId>,
    course_id: Option<CourseId>,
    status: UserQuizStatus,
    attempt_count: u32,
    /// Result ids in the order they were started; index + 1 is the attempt number.
    started_results: Vec<AggregateId>,
    graded_results: HashSet<AggregateId>,
    best_score: f64,
    first_attempt_at: Option<DateTime<Utc>>,
    last_attempt_at: Option<DateTime<Utc>>,
    passed_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for UserQuiz {
    type Event = UserQuizEvent;
    type Error = AttemptError;

    fn aggregate_type() -> &'static str {
        "UserQuiz"
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
            UserQuizEvent::UserQuizCreated(data) => self.apply_created(data),
            UserQuizEvent::AttemptRetaken(data) => {
                self.attempt_count = data.attempt_count;
                self.last_attempt_at = Some(data.retaken_at);
                self.updated_at = Some(data.retaken_at);
            }
            UserQuizEvent::ResultStarted(data) => {
                self.started_results.push(data.result_id);
                self.updated_at = Some(data.started_at);
            }
            UserQuizEvent::GradeRecorded(data) => self.apply_grade_recorded(data),
        }
    }
}

impl UserQuiz {
    fn apply_created(&mut self, data: UserQuizCreatedData) {
        self.id = Some(data.user_quiz_id);
        self.user_id = Some(data.user_id);
        self.quiz_id = Some(data.quiz_id);
        self.course_id = Some(data.course_id);
        self.status = UserQuizStatus::InProgress;
        self.attempt_count = 1;
        self.first_attempt_at = Some(data.created_at);
        self.last_attempt_at = Some(data.created_at);
        self.updated_at = Some(data.created_at);
    }

    fn apply_grade_recorded(&mut self, data: GradeRecordedData) {
        self.graded_results.insert(data.result_id);
        self.best_score = data.best_score;
        self.status = data.status;
        if data.first_pass {
            self.passed_at = Some(data.recorded_at);
        }
        self.updated_at = Some(data.recorded_at);
    }
}

// Query methods
impl UserQuiz {
    /// Deterministic id for a (user, quiz) pair.
    pub fn id_for(user_id: UserId, quiz_id: QuizId) -> AggregateId {
        AggregateId::derive(USER_QUIZ_NAMESPACE, &[user_id.as_uuid(), quiz_id.as_uuid()])
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

    pub fn status(&self) -> UserQuizStatus {
        self.status
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn results_started(&self) -> u32 {
        self.started_results.len() as u32
    }

    /// Attempt number of a result started on this user quiz.
    pub fn attempt_number_of(&self, result_id: AggregateId) -> Option<u32> {
        self.started_results
            .iter()
            .position(|id| *id == result_id)
            .map(|index| index as u32 + 1)
    }

    pub fn has_graded(&self, result_id: AggregateId) -> bool {
        self.graded_results.contains(&result_id)
    }

    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    pub fn first_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.first_attempt_at
    }

    pub fn last_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.last_attempt_at
    }

    pub fn passed_at(&self) -> Option<DateTime<Utc>> {
        self.passed_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn require_existing(&self) -> Result<AggregateId, AttemptError> {
        self.id.ok_or(AttemptError::UserQuizNotFound)
    }
}

// Command methods (return events)
impl UserQuiz {
    /// Creates the user quiz, which also counts as the first attempt.
    pub fn create(
        &self,
        user_quiz_id: AggregateId,
        user_id: UserId,
        quiz_id: QuizId,
        course_id: CourseId,
    ) -> Result<Vec<UserQuizEvent>, AttemptError> {
        if self.id.is_some() {
            return Err(AttemptError::AlreadyExists { user_id, quiz_id });
        }

        Ok(vec![UserQuizEvent::user_quiz_created(
            user_quiz_id,
            user_id,
            quiz_id,
            course_id,
        )])
    }

    /// Grants another attempt. Status is left as it is.
    pub fn retake(&self) -> Result<Vec<UserQuizEvent>, AttemptError> {
        self.require_existing()?;
        Ok(vec![UserQuizEvent::attempt_retaken(self.attempt_count + 1)])
    }

    /// Hands the next attempt number to `result_id`.
    ///
    /// Starting the same result twice is a no-op, so a caller that failed
    /// half-way can retry with the same id.
    pub fn start_result(&self, result_id: AggregateId) -> Result<Vec<UserQuizEvent>, AttemptError> {
        self.require_existing()?;

        if self.attempt_number_of(result_id).is_some() {
            return Ok(vec![]);
        }

        if self.results_started() >= self.attempt_count {
            return Err(AttemptError::NoAttemptAvailable {
                attempt_count: self.attempt_count,
            });
        }

        Ok(vec![UserQuizEvent::result_started(
            result_id,
            self.results_started() + 1,
        )])
    }

    /// Folds the grade of one result into the user quiz.
    ///
    /// A result that was already applied produces no events.
    pub fn record_grade(
        &self,
        result_id: AggregateId,
        points_earned: f64,
        is_passed: bool,
    ) -> Result<Vec<UserQuizEvent>, AttemptError> {
        let user_quiz_id = self.require_existing()?;

        if self.attempt_number_of(result_id).is_none() {
            return Err(AttemptError::ResultNotStarted {
                user_quiz_id,
                result_id,
            });
        }

        if self.has_graded(result_id) {
            return Ok(vec![]);
        }

        let status = self.status.after_grade(is_passed);
        let first_pass = status.is_passed() && !self.status.is_passed();

        Ok(vec![UserQuizEvent::grade_recorded(
            result_id,
            points_earned,
            is_passed,
            self.best_score.max(points_earned),
            status,
            first_pass,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created() -> (UserQuiz, AggregateId) {
        let user_id = UserId::new();
        let quiz_id = QuizId::new();
        let id = UserQuiz::id_for(user_id, quiz_id);
        let mut uq = UserQuiz::default();
        let events = uq.create(id, user_id, quiz_id, CourseId::new()).unwrap();
        uq.apply_events(events);
        (uq, id)
    }

    fn start(uq: &mut UserQuiz) -> AggregateId {
        let result_id = AggregateId::new();
        let events = uq.start_result(result_id).unwrap();
        uq.apply_events(events);
        result_id
    }

    fn retake(uq: &mut UserQuiz) {
        let events = uq.retake().unwrap();
        uq.apply_events(events);
    }

    fn grade(uq: &mut UserQuiz, result_id: AggregateId, points: f64, passed: bool) -> Vec<UserQuizEvent> {
        let events = uq.record_grade(result_id, points, passed).unwrap();
        uq.apply_events(events.clone());
        events
    }

    #[test]
    fn create_starts_first_attempt() {
        let (uq, id) = created();
        assert_eq!(uq.id(), Some(id));
        assert_eq!(uq.status(), UserQuizStatus::InProgress);
        assert_eq!(uq.attempt_count(), 1);
        assert_eq!(uq.first_attempt_at(), uq.last_attempt_at());
        assert!(uq.first_attempt_at().is_some());
    }

    #[test]
    fn create_twice_is_rejected() {
        let (uq, id) = created();
        let err = uq
            .create(id, UserId::new(), QuizId::new(), CourseId::new())
            .unwrap_err();
        assert!(matches!(err, AttemptError::AlreadyExists { .. }));
    }

    #[test]
    fn id_is_derived_from_user_and_quiz() {
        let user_id = UserId::new();
        let quiz_id = QuizId::new();
        assert_eq!(UserQuiz::id_for(user_id, quiz_id), UserQuiz::id_for(user_id, quiz_id));
        assert_ne!(UserQuiz::id_for(user_id, quiz_id), UserQuiz::id_for(user_id, QuizId::new()));
    }

    #[test]
    fn retake_on_missing_user_quiz_fails() {
        let err = UserQuiz::default().retake().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn attempt_numbers_follow_start_order() {
        let (mut uq, _) = created();
        let first = start(&mut uq);
        retake(&mut uq);
        let second = start(&mut uq);
        retake(&mut uq);
        let third = start(&mut uq);

        assert_eq!(uq.attempt_number_of(first), Some(1));
        assert_eq!(uq.attempt_number_of(second), Some(2));
        assert_eq!(uq.attempt_number_of(third), Some(3));
        assert_eq!(uq.attempt_count(), 3);
    }

    #[test]
    fn starting_beyond_attempt_count_needs_retake() {
        let (mut uq, _) = created();
        start(&mut uq);

        let err = uq.start_result(AggregateId::new()).unwrap_err();
        assert!(matches!(
            err,
            AttemptError::NoAttemptAvailable { attempt_count: 1 }
        ));
    }

    #[test]
    fn restarting_same_result_is_noop() {
        let (mut uq, _) = created();
        let result_id = start(&mut uq);
        assert!(uq.start_result(result_id).unwrap().is_empty());
    }

    #[test]
    fn best_score_is_max_of_all_grades() {
        let (mut uq, _) = created();
        let scores = [4.0, 9.0, 6.0];
        for (i, score) in scores.iter().enumerate() {
            if i > 0 {
                retake(&mut uq);
            }
            let result_id = start(&mut uq);
            grade(&mut uq, result_id, *score, false);
        }

        assert_eq!(uq.best_score(), 9.0);
        assert_eq!(uq.status(), UserQuizStatus::Failed);
    }

    #[test]
    fn passed_is_kept_after_failing_retake() {
        let (mut uq, _) = created();
        let first = start(&mut uq);
        let events = grade(&mut uq, first, 8.0, true);
        let passed_at = uq.passed_at();

        assert!(matches!(
            &events[0],
            UserQuizEvent::GradeRecorded(data) if data.first_pass
        ));
        assert_eq!(uq.status(), UserQuizStatus::Passed);

        retake(&mut uq);
        let second = start(&mut uq);
        let events = grade(&mut uq, second, 2.0, false);

        assert!(matches!(
            &events[0],
            UserQuizEvent::GradeRecorded(data) if !data.first_pass
        ));
        assert_eq!(uq.status(), UserQuizStatus::Passed);
        assert_eq!(uq.best_score(), 8.0);
        assert_eq!(uq.passed_at(), passed_at);
    }

    #[test]
    fn retake_does_not_reset_passed() {
        let (mut uq, _) = created();
        let result_id = start(&mut uq);
        grade(&mut uq, result_id, 10.0, true);
        retake(&mut uq);
        assert_eq!(uq.status(), UserQuizStatus::Passed);
        assert_eq!(uq.attempt_count(), 2);
    }

    #[test]
    fn same_grade_twice_is_noop() {
        let (mut uq, _) = created();
        let result_id = start(&mut uq);
        grade(&mut uq, result_id, 5.0, true);

        assert!(uq.record_grade(result_id, 5.0, true).unwrap().is_empty());
        assert!(uq.has_graded(result_id));
    }

    #[test]
    fn grade_for_foreign_result_is_rejected() {
        let (uq, _) = created();
        let err = uq.record_grade(AggregateId::new(), 1.0, true).unwrap_err();
        assert!(matches!(err, AttemptError::ResultNotStarted { .. }));
    }
}
