//! Attempt-owner side of the saga: applies grades.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{AttemptService, RecordResultGrade, RecordUserQuizGrade, UserQuizEvent};
use event_store::EventStore;
use messaging::{DeliveryContext, MessageHandler, QuizGraded};
use uuid::Uuid;

use crate::error::{Result, SagaError};
use crate::progress::{ProgressDirty, ProgressQueue};

/// What finalizing one grade changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FinalizationOutcome {
    /// The result moved to Completed.
    pub result_completed: bool,
    /// The grade was folded into the user quiz.
    pub user_quiz_updated: bool,
    /// This grade passed the quiz for the first time.
    pub first_pass: bool,
}

impl FinalizationOutcome {
    /// True when the grade had already been applied in full.
    pub fn is_duplicate(&self) -> bool {
        !self.result_completed && !self.user_quiz_updated
    }
}

/// Consumes `QuizGraded` and finalizes the result and its user quiz.
pub struct ResultFinalizationConsumer<S: EventStore> {
    attempts: Arc<AttemptService<S>>,
    progress: ProgressQueue,
}

impl<S: EventStore + Clone> ResultFinalizationConsumer<S> {
    pub fn new(attempts: Arc<AttemptService<S>>, progress: ProgressQueue) -> Self {
        Self { attempts, progress }
    }

    /// Applies a grade. Both writes are no-ops when repeated, so a
    /// redelivery after a partial failure completes whatever is missing.
    #[tracing::instrument(
        skip(self, graded),
        fields(
            result_id = %graded.result_id,
            user_quiz_id = %graded.user_quiz_id,
            quiz_id = %graded.quiz_id,
        )
    )]
    pub async fn finalize(
        &self,
        graded: &QuizGraded,
        causation_id: Option<Uuid>,
    ) -> Result<FinalizationOutcome> {
        let result = self
            .attempts
            .record_result_grade(
                RecordResultGrade {
                    graded: graded.clone(),
                },
                causation_id,
            )
            .await?;

        let user_quiz = self
            .attempts
            .record_user_quiz_grade(RecordUserQuizGrade::from(graded), causation_id)
            .await?;

        let first_pass = user_quiz.events.iter().any(|event| {
            matches!(event, UserQuizEvent::GradeRecorded(data) if data.first_pass)
        });

        let outcome = FinalizationOutcome {
            result_completed: !result.is_noop(),
            user_quiz_updated: !user_quiz.is_noop(),
            first_pass,
        };

        if outcome.is_duplicate() {
            tracing::debug!("Grade already applied");
            return Ok(outcome);
        }

        if first_pass {
            let marker = ProgressDirty::new(graded.course_id, graded.user_id, graded.user_quiz_id);
            if let Err(e) = self.progress.enqueue(marker) {
                tracing::error!(error = %e, "Could not queue course progress recalculation");
            }
        }

        metrics::counter!("quiz_results_finalized_total").increment(1);
        tracing::info!(
            score = graded.total_points_earned,
            passed = graded.is_passed,
            best_score = user_quiz.aggregate.best_score(),
            status = %user_quiz.aggregate.status(),
            "Result finalized"
        );

        Ok(outcome)
    }
}

#[async_trait]
impl<S: EventStore + Clone> MessageHandler for ResultFinalizationConsumer<S> {
    type Message = QuizGraded;
    type Error = SagaError;

    async fn handle(&self, message: QuizGraded, context: &DeliveryContext) -> Result<()> {
        self.finalize(&message, Some(context.message_id))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{AggregateId, CourseId, QuizId, UserId};
    use domain::{Aggregate, CreateAttempt, ResultStatus, StartResult, SubmitAnswers, UserQuizStatus};
    use event_store::InMemoryEventStore;
    use messaging::Answer;
    use tokio::sync::mpsc;

    struct Fixture {
        attempts: Arc<AttemptService<InMemoryEventStore>>,
        consumer: ResultFinalizationConsumer<InMemoryEventStore>,
        progress: mpsc::UnboundedReceiver<ProgressDirty>,
        user_quiz_id: AggregateId,
        user_id: UserId,
        quiz_id: QuizId,
        course_id: CourseId,
    }

    async fn fixture() -> Fixture {
        let attempts = Arc::new(AttemptService::new(InMemoryEventStore::new()));
        let (queue, progress) = ProgressQueue::channel();
        let (user_id, quiz_id, course_id) = (UserId::new(), QuizId::new(), CourseId::new());
        let user_quiz = attempts
            .create_attempt(CreateAttempt::new(user_id, quiz_id, course_id))
            .await
            .unwrap();

        Fixture {
            consumer: ResultFinalizationConsumer::new(attempts.clone(), queue),
            attempts,
            progress,
            user_quiz_id: user_quiz.id().unwrap(),
            user_id,
            quiz_id,
            course_id,
        }
    }

    async fn pending_result(f: &Fixture) -> AggregateId {
        let result = f
            .attempts
            .start_result(StartResult::for_user_quiz(f.user_quiz_id))
            .await
            .unwrap();
        let result_id = result.id().unwrap();
        f.attempts
            .submit_answers(SubmitAnswers::new(result_id, Vec::<Answer>::new()))
            .await
            .unwrap();
        result_id
    }

    fn graded(f: &Fixture, result_id: AggregateId, points: f64, passed: bool) -> QuizGraded {
        QuizGraded {
            quiz_id: f.quiz_id,
            result_id,
            user_quiz_id: f.user_quiz_id,
            user_id: f.user_id,
            course_id: f.course_id,
            total_points_earned: points,
            total_marks: 10.0,
            percentage_score: points * 10.0,
            is_passed: passed,
            graded_questions: vec![],
            graded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn first_pass_completes_result_and_queues_progress() {
        let mut f = fixture().await;
        let result_id = pending_result(&f).await;

        let outcome = f
            .consumer
            .finalize(&graded(&f, result_id, 8.0, true), None)
            .await
            .unwrap();

        assert!(outcome.result_completed && outcome.user_quiz_updated && outcome.first_pass);
        let result = f.attempts.get_result(result_id).await.unwrap().unwrap();
        assert_eq!(result.status(), ResultStatus::Completed);
        assert_eq!(result.score(), Some(8.0));

        let user_quiz = f.attempts.get_user_quiz(f.user_quiz_id).await.unwrap().unwrap();
        assert_eq!(user_quiz.status(), UserQuizStatus::Passed);
        assert_eq!(user_quiz.best_score(), 8.0);

        let marker = f.progress.try_recv().unwrap();
        assert_eq!((marker.course_id, marker.user_id), (f.course_id, f.user_id));
    }

    #[tokio::test]
    async fn duplicate_grade_is_a_noop() {
        let mut f = fixture().await;
        let result_id = pending_result(&f).await;
        let msg = graded(&f, result_id, 8.0, true);

        f.consumer.finalize(&msg, None).await.unwrap();
        let version = f.attempts.get_user_quiz(f.user_quiz_id).await.unwrap().unwrap().version();
        let again = f.consumer.finalize(&msg, None).await.unwrap();

        assert!(again.is_duplicate());
        let user_quiz = f.attempts.get_user_quiz(f.user_quiz_id).await.unwrap().unwrap();
        assert_eq!(user_quiz.version(), version);
        assert_eq!(user_quiz.best_score(), 8.0);
        assert!(f.progress.try_recv().is_ok());
        assert!(f.progress.try_recv().is_err());
    }

    #[tokio::test]
    async fn failing_grade_does_not_queue_progress() {
        let mut f = fixture().await;
        let result_id = pending_result(&f).await;

        let outcome = f
            .consumer
            .finalize(&graded(&f, result_id, 2.0, false), None)
            .await
            .unwrap();

        assert!(!outcome.first_pass);
        let user_quiz = f.attempts.get_user_quiz(f.user_quiz_id).await.unwrap().unwrap();
        assert_eq!(user_quiz.status(), UserQuizStatus::Failed);
        assert!(f.progress.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_progress_queue_does_not_fail_finalization() {
        let f = fixture().await;
        let result_id = pending_result(&f).await;
        let msg = graded(&f, result_id, 10.0, true);
        let Fixture {
            consumer, progress, ..
        } = f;
        drop(progress);

        let outcome = consumer.finalize(&msg, None).await.unwrap();

        assert!(outcome.first_pass);
    }

    #[tokio::test]
    async fn grade_for_unknown_result_propagates() {
        let f = fixture().await;

        let err = f
            .consumer
            .finalize(&graded(&f, AggregateId::new(), 5.0, true), None)
            .await
            .unwrap_err();

        assert!(matches!(err, SagaError::Domain(_)));
    }
}
