//! Question-bank side of the saga: grades submissions.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use messaging::{
    DeliveryContext, MessageHandler, Publisher, PublisherExt, QuizGraded, QuizSubmitted,
};
use question_bank::{GradingEngine, GradingReport, QuestionBank};
use uuid::Uuid;

use crate::error::{Result, SagaError};

/// What grading a submission led to.
#[derive(Debug, Clone)]
pub enum GradingOutcome {
    /// `QuizGraded` was published with this message id.
    Published { message_id: Uuid, report: GradingReport },
    /// The quiz does not exist; nothing was published.
    QuizNotFound,
}

/// Consumes `QuizSubmitted`, grades it, and publishes `QuizGraded`.
///
/// Holds no per-message state. Grading the same submission twice publishes
/// two identical grades, which the finalization side applies once.
pub struct SubmissionConsumer<B, P> {
    bank: B,
    publisher: P,
    engine: GradingEngine,
}

impl<B: QuestionBank, P: Publisher> SubmissionConsumer<B, P> {
    pub fn new(bank: B, publisher: P, engine: GradingEngine) -> Self {
        Self {
            bank,
            publisher,
            engine,
        }
    }

    #[tracing::instrument(
        skip(self, submission),
        fields(
            result_id = %submission.result_id,
            quiz_id = %submission.quiz_id,
            user_quiz_id = %submission.user_quiz_id,
        )
    )]
    pub async fn grade(&self, submission: &QuizSubmitted) -> Result<GradingOutcome> {
        let start = Instant::now();

        let Some(key) = self.bank.answer_key(submission.quiz_id).await? else {
            // The attempt stays Pending; reconciliation gives up on it eventually.
            tracing::warn!("Quiz not found, submission left ungraded");
            metrics::counter!("quiz_grading_quiz_not_found_total").increment(1);
            return Ok(GradingOutcome::QuizNotFound);
        };

        let report = self.engine.grade(&key, &submission.answers);
        if !report.unknown_questions.is_empty() {
            tracing::warn!(
                unknown = ?report.unknown_questions,
                "Submission answers questions outside the quiz"
            );
        }

        let graded = QuizGraded {
            quiz_id: submission.quiz_id,
            result_id: submission.result_id,
            user_quiz_id: submission.user_quiz_id,
            user_id: submission.user_id,
            course_id: submission.course_id,
            total_points_earned: report.total_points_earned,
            total_marks: report.total_marks,
            percentage_score: report.percentage_score,
            is_passed: report.is_passed,
            graded_questions: report.graded_questions.clone(),
            graded_at: Utc::now(),
        };
        let message_id = self.publisher.publish(&graded).await?;

        metrics::histogram!("quiz_grading_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        metrics::counter!("quiz_graded_total", "passed" => report.is_passed.to_string())
            .increment(1);
        tracing::info!(
            score = report.total_points_earned,
            total_marks = report.total_marks,
            passed = report.is_passed,
            "Submission graded"
        );

        Ok(GradingOutcome::Published { message_id, report })
    }
}

#[async_trait]
impl<B: QuestionBank, P: Publisher> MessageHandler for SubmissionConsumer<B, P> {
    type Message = QuizSubmitted;
    type Error = SagaError;

    async fn handle(&self, message: QuizSubmitted, context: &DeliveryContext) -> Result<()> {
        if context.is_redelivery() {
            tracing::debug!(
                message_id = %context.message_id,
                delivery = context.delivery_count,
                "Grading redelivered submission"
            );
        }
        self.grade(&message).await.map(|_| ())
    }
}
