//! Attempt service: the attempt owner's write API.

use common::{AggregateId, QuizId, UserId};
use event_store::EventStore;
use uuid::Uuid;

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{
    AbandonSubmission, AttemptError, CreateAttempt, MarkRepublished, QuizResult,
    RecordResultGrade, RecordUserQuizGrade, RetakeAttempt, StartResult, SubmitAnswers, UserQuiz,
};

/// Runs attempt commands against the event store.
///
/// Both aggregates share one store. Every write is a single-aggregate
/// append guarded by the version that was loaded, so two writers racing on
/// the same user quiz or result cannot both succeed.
pub struct AttemptService<S: EventStore> {
    user_quizzes: CommandHandler<S, UserQuiz>,
    results: CommandHandler<S, QuizResult>,
}

impl<S: EventStore + Clone> AttemptService<S> {
    pub fn new(store: S) -> Self {
        Self {
            user_quizzes: CommandHandler::new(store.clone()),
            results: CommandHandler::new(store),
        }
    }

    pub fn store(&self) -> &S {
        self.results.store()
    }

    /// Creates the user quiz for (user, quiz).
    #[tracing::instrument(skip(self))]
    pub async fn create_attempt(&self, cmd: CreateAttempt) -> Result<UserQuiz, DomainError> {
        let user_quiz_id = cmd.aggregate_id();
        let CreateAttempt {
            user_id,
            quiz_id,
            course_id,
        } = cmd;

        let result = self
            .user_quizzes
            .execute(user_quiz_id, |uq| {
                uq.create(user_quiz_id, user_id, quiz_id, course_id)
            })
            .await
            .map_err(|e| {
                // Lost the race against a concurrent create of the same pair.
                if e.is_conflict() {
                    AttemptError::AlreadyExists { user_id, quiz_id }.into()
                } else {
                    e
                }
            })?;

        metrics::counter!("quiz_attempts_created_total").increment(1);
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn retake(&self, cmd: RetakeAttempt) -> Result<UserQuiz, DomainError> {
        let result = self
            .user_quizzes
            .execute(cmd.user_quiz_id, |uq| uq.retake())
            .await?;

        metrics::counter!("quiz_retakes_total").increment(1);
        Ok(result.aggregate)
    }

    /// Allocates the next attempt number and opens a result for it.
    ///
    /// Safe to call again with the same result id after a partial failure.
    #[tracing::instrument(skip(self))]
    pub async fn start_result(&self, cmd: StartResult) -> Result<QuizResult, DomainError> {
        let result_id = cmd.result_id;
        let user_quiz = self
            .user_quizzes
            .execute(cmd.user_quiz_id, |uq| uq.start_result(result_id))
            .await?
            .aggregate;

        let attempt_number = user_quiz
            .attempt_number_of(result_id)
            .ok_or(AttemptError::ResultNotFound)?;
        let (Some(user_id), Some(quiz_id), Some(course_id)) =
            (user_quiz.user_id(), user_quiz.quiz_id(), user_quiz.course_id())
        else {
            return Err(AttemptError::UserQuizNotFound.into());
        };

        let result = self
            .results
            .execute(result_id, |r| {
                r.open(
                    result_id,
                    cmd.user_quiz_id,
                    user_id,
                    quiz_id,
                    course_id,
                    attempt_number,
                )
            })
            .await?;

        tracing::debug!(%result_id, attempt_number, "Result opened");
        Ok(result.aggregate)
    }

    /// Records answers; the result becomes Pending.
    #[tracing::instrument(skip(self, cmd), fields(result_id = %cmd.result_id, answers = cmd.answers.len()))]
    pub async fn submit_answers(&self, cmd: SubmitAnswers) -> Result<QuizResult, DomainError> {
        let SubmitAnswers {
            result_id,
            answers,
            metadata,
        } = cmd;

        let result = self
            .results
            .execute(result_id, move |r| r.submit(answers, metadata))
            .await?;

        Ok(result.aggregate)
    }

    /// Applies a grade to its result. A no-op if the result is already
    /// Completed.
    #[tracing::instrument(skip(self, cmd), fields(result_id = %cmd.graded.result_id))]
    pub async fn record_result_grade(
        &self,
        cmd: RecordResultGrade,
        causation_id: Option<Uuid>,
    ) -> Result<CommandResult<QuizResult>, DomainError> {
        self.results
            .execute_caused_by(cmd.graded.result_id, causation_id, |r| {
                r.grade(&cmd.graded)
            })
            .await
    }

    /// Folds a grade into the user quiz. A no-op if that result was already
    /// applied.
    #[tracing::instrument(skip(self))]
    pub async fn record_user_quiz_grade(
        &self,
        cmd: RecordUserQuizGrade,
        causation_id: Option<Uuid>,
    ) -> Result<CommandResult<UserQuiz>, DomainError> {
        self.user_quizzes
            .execute_caused_by(cmd.user_quiz_id, causation_id, |uq| {
                uq.record_grade(cmd.result_id, cmd.points_earned, cmd.is_passed)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_republished(&self, cmd: MarkRepublished) -> Result<QuizResult, DomainError> {
        let result = self
            .results
            .execute(cmd.result_id, |r| r.mark_republished())
            .await?;
        Ok(result.aggregate)
    }

    /// Marks a Pending submission as abandoned. `events` is empty when it
    /// already was.
    #[tracing::instrument(skip(self))]
    pub async fn abandon_submission(
        &self,
        cmd: AbandonSubmission,
    ) -> Result<CommandResult<QuizResult>, DomainError> {
        self.results.execute(cmd.result_id, |r| r.abandon()).await
    }

    pub async fn get_user_quiz(
        &self,
        user_quiz_id: AggregateId,
    ) -> Result<Option<UserQuiz>, DomainError> {
        self.user_quizzes.load_existing(user_quiz_id).await
    }

    pub async fn get_result(&self, result_id: AggregateId) -> Result<Option<QuizResult>, DomainError> {
        self.results.load_existing(result_id).await
    }

    pub async fn find_user_quiz(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<Option<UserQuiz>, DomainError> {
        self.get_user_quiz(UserQuiz::id_for(user_id, quiz_id)).await
    }
}
