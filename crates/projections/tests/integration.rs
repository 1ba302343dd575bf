//! Integration tests: AttemptService commands → ProjectionProcessor → AttemptHistoryView.

use chrono::{Duration, Utc};
use common::{CourseId, QuizId, UserId};
use domain::{
    Aggregate, AttemptService, CreateAttempt, RecordResultGrade, ResultStatus, RetakeAttempt,
    StartResult, SubmitAnswers,
};
use event_store::InMemoryEventStore;
use messaging::QuizGraded;
use projections::{AttemptHistoryView, ProjectionProcessor};

fn setup() -> (
    AttemptService<InMemoryEventStore>,
    ProjectionProcessor<InMemoryEventStore>,
    AttemptHistoryView,
) {
    let store = InMemoryEventStore::new();
    let service = AttemptService::new(store.clone());

    let history = AttemptHistoryView::new();
    let mut processor = ProjectionProcessor::new(store);
    processor.register(Box::new(history.clone()));

    (service, processor, history)
}

fn graded_for(result: &domain::QuizResult, points: f64) -> QuizGraded {
    QuizGraded {
        quiz_id: result.quiz_id().unwrap(),
        result_id: result.id().unwrap(),
        user_quiz_id: result.user_quiz_id().unwrap(),
        user_id: result.user_id().unwrap(),
        course_id: result.course_id().unwrap(),
        total_points_earned: points,
        total_marks: 10.0,
        percentage_score: points * 10.0,
        is_passed: points >= 5.0,
        graded_questions: vec![],
        graded_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_attempt_history_follows_the_result_lifecycle() {
    let (service, processor, history) = setup();
    let user_quiz = service
        .create_attempt(CreateAttempt::new(
            UserId::new(),
            QuizId::new(),
            CourseId::new(),
        ))
        .await
        .unwrap();
    let user_quiz_id = user_quiz.id().unwrap();

    let result = service
        .start_result(StartResult::for_user_quiz(user_quiz_id))
        .await
        .unwrap();
    let result_id = result.id().unwrap();
    processor.run_catch_up().await.unwrap();
    assert_eq!(
        history.get(result_id).await.unwrap().status,
        ResultStatus::InProgress
    );

    let submitted = service
        .submit_answers(SubmitAnswers::new(result_id, vec![]))
        .await
        .unwrap();
    processor.run_catch_up().await.unwrap();
    assert_eq!(
        history.pending_submitted_before(Utc::now() + Duration::seconds(1)).await,
        vec![result_id]
    );

    service
        .record_result_grade(
            RecordResultGrade {
                graded: graded_for(&submitted, 6.0),
            },
            None,
        )
        .await
        .unwrap();
    processor.run_catch_up().await.unwrap();

    let summary = history.get(result_id).await.unwrap();
    assert_eq!(summary.status, ResultStatus::Completed);
    assert_eq!(summary.score, Some(6.0));
    assert!(summary.completed_at.is_some());
    assert!(
        history
            .pending_submitted_before(Utc::now() + Duration::seconds(1))
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn test_history_lists_every_attempt_of_a_user_quiz() {
    let (service, processor, history) = setup();
    let user_quiz = service
        .create_attempt(CreateAttempt::new(
            UserId::new(),
            QuizId::new(),
            CourseId::new(),
        ))
        .await
        .unwrap();
    let user_quiz_id = user_quiz.id().unwrap();

    service
        .start_result(StartResult::for_user_quiz(user_quiz_id))
        .await
        .unwrap();
    service
        .retake(RetakeAttempt { user_quiz_id })
        .await
        .unwrap();
    service
        .start_result(StartResult::for_user_quiz(user_quiz_id))
        .await
        .unwrap();

    processor.run_catch_up().await.unwrap();

    let attempts = history.attempts_for_user_quiz(user_quiz_id).await;
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].attempt_number, 1);
    assert_eq!(attempts[1].attempt_number, 2);
}

#[tokio::test]
async fn test_rebuild_matches_incremental_catch_up() {
    let (service, processor, history) = setup();
    let user_quiz = service
        .create_attempt(CreateAttempt::new(
            UserId::new(),
            QuizId::new(),
            CourseId::new(),
        ))
        .await
        .unwrap();
    let result = service
        .start_result(StartResult::for_user_quiz(user_quiz.id().unwrap()))
        .await
        .unwrap();
    let result_id = result.id().unwrap();
    service
        .submit_answers(SubmitAnswers::new(result_id, vec![]))
        .await
        .unwrap();

    processor.run_catch_up().await.unwrap();
    let before = history.get(result_id).await.unwrap();

    processor.rebuild_all().await.unwrap();

    assert_eq!(history.get(result_id).await.unwrap(), before);
}
