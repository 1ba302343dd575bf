//! Integration tests for the attempt aggregates.
//!
//! These run the attempt service against the in-memory event store and
//! check the properties the saga relies on: attempt numbering, monotonic
//! best score, sticky Passed, and idempotent grading under races.

use std::sync::Arc;

use chrono::Utc;
use common::{AggregateId, CourseId, QuestionId, QuizId, UserId};
use domain::{
    Aggregate, AttemptError, AttemptService, CreateAttempt, DomainError, QuizResult,
    RecordResultGrade, RecordUserQuizGrade, ResultStatus, RetakeAttempt, StartResult,
    SubmitAnswers, UserQuiz, UserQuizStatus,
};
use event_store::{EventStore, InMemoryEventStore};
use messaging::{Answer, QuizGraded};

type Service = AttemptService<InMemoryEventStore>;

fn create_service() -> Service {
    AttemptService::new(InMemoryEventStore::new())
}

async fn create_user_quiz(service: &Service) -> UserQuiz {
    service
        .create_attempt(CreateAttempt::new(UserId::new(), QuizId::new(), CourseId::new()))
        .await
        .unwrap()
}

async fn submit_new_result(service: &Service, user_quiz_id: AggregateId) -> QuizResult {
    let result = service
        .start_result(StartResult::for_user_quiz(user_quiz_id))
        .await
        .unwrap();
    service
        .submit_answers(SubmitAnswers::new(
            result.id().unwrap(),
            vec![Answer::short_answer(QuestionId::new(), "answer")],
        ))
        .await
        .unwrap()
}

fn graded(result: &QuizResult, points: f64, is_passed: bool) -> QuizGraded {
    QuizGraded {
        quiz_id: result.quiz_id().unwrap(),
        result_id: result.id().unwrap(),
        user_quiz_id: result.user_quiz_id().unwrap(),
        user_id: result.user_id().unwrap(),
        course_id: result.course_id().unwrap(),
        total_points_earned: points,
        total_marks: 10.0,
        percentage_score: points * 10.0,
        is_passed,
        graded_questions: vec![],
        graded_at: Utc::now(),
    }
}

async fn finalize(service: &Service, message: &QuizGraded) -> bool {
    service
        .record_result_grade(
            RecordResultGrade {
                graded: message.clone(),
            },
            None,
        )
        .await
        .unwrap();
    let outcome = service
        .record_user_quiz_grade(RecordUserQuizGrade::from(message), None)
        .await
        .unwrap();
    outcome.events.iter().any(|e| {
        matches!(e, domain::UserQuizEvent::GradeRecorded(data) if data.first_pass)
    })
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn kth_result_gets_attempt_number_k() {
        let service = create_service();
        let uq = create_user_quiz(&service).await;
        let uq_id = uq.id().unwrap();

        for k in 1..=4u32 {
            if k > 1 {
                service
                    .retake(RetakeAttempt {
                        user_quiz_id: uq_id,
                    })
                    .await
                    .unwrap();
            }
            let result = submit_new_result(&service, uq_id).await;
            assert_eq!(result.attempt_number(), k);
        }
    }

    #[tokio::test]
    async fn starting_without_retake_is_rejected() {
        let service = create_service();
        let uq = create_user_quiz(&service).await;
        submit_new_result(&service, uq.id().unwrap()).await;

        let err = service
            .start_result(StartResult::for_user_quiz(uq.id().unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Attempt(AttemptError::NoAttemptAvailable { .. })
        ));
    }

    #[tokio::test]
    async fn start_on_unknown_user_quiz_is_not_found() {
        let service = create_service();
        let err = service
            .start_result(StartResult::for_user_quiz(AggregateId::new()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn submit_on_unknown_result_is_not_found() {
        let service = create_service();
        let err = service
            .submit_answers(SubmitAnswers::new(AggregateId::new(), vec![]))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}

mod scoring {
    use super::*;

    #[tokio::test]
    async fn best_score_is_max_over_all_attempts() {
        let service = create_service();
        let uq = create_user_quiz(&service).await;
        let uq_id = uq.id().unwrap();
        let scores = [3.0, 7.5, 2.0, 7.0];

        for (i, points) in scores.iter().enumerate() {
            if i > 0 {
                service
                    .retake(RetakeAttempt {
                        user_quiz_id: uq_id,
                    })
                    .await
                    .unwrap();
            }
            let result = submit_new_result(&service, uq_id).await;
            finalize(&service, &graded(&result, *points, false)).await;
        }

        let uq = service.get_user_quiz(uq_id).await.unwrap().unwrap();
        assert_eq!(uq.best_score(), 7.5);
        assert_eq!(uq.status(), UserQuizStatus::Failed);
    }

    #[tokio::test]
    async fn first_pass_is_reported_once() {
        let service = create_service();
        let uq = create_user_quiz(&service).await;
        let uq_id = uq.id().unwrap();

        let first = submit_new_result(&service, uq_id).await;
        assert!(!finalize(&service, &graded(&first, 4.0, false)).await);

        service
            .retake(RetakeAttempt {
                user_quiz_id: uq_id,
            })
            .await
            .unwrap();
        let second = submit_new_result(&service, uq_id).await;
        assert!(finalize(&service, &graded(&second, 9.0, true)).await);

        service
            .retake(RetakeAttempt {
                user_quiz_id: uq_id,
            })
            .await
            .unwrap();
        let third = submit_new_result(&service, uq_id).await;
        assert!(!finalize(&service, &graded(&third, 10.0, true)).await);

        let uq = service.get_user_quiz(uq_id).await.unwrap().unwrap();
        assert_eq!(uq.status(), UserQuizStatus::Passed);
        assert_eq!(uq.best_score(), 10.0);
    }

    #[tokio::test]
    async fn retake_after_pass_keeps_passed() {
        let service = create_service();
        let uq = create_user_quiz(&service).await;
        let uq_id = uq.id().unwrap();

        let result = submit_new_result(&service, uq_id).await;
        finalize(&service, &graded(&result, 9.0, true)).await;

        let uq = service
            .retake(RetakeAttempt {
                user_quiz_id: uq_id,
            })
            .await
            .unwrap();
        assert_eq!(uq.status(), UserQuizStatus::Passed);
        assert_eq!(uq.attempt_count(), 2);

        let result = submit_new_result(&service, uq_id).await;
        finalize(&service, &graded(&result, 1.0, false)).await;

        let uq = service.get_user_quiz(uq_id).await.unwrap().unwrap();
        assert_eq!(uq.status(), UserQuizStatus::Passed);
        assert_eq!(uq.best_score(), 9.0);
    }
}

mod idempotency {
    use super::*;

    #[tokio::test]
    async fn duplicate_finalization_matches_single() {
        let once = create_service();
        let twice = create_service();

        let mut outcomes = Vec::new();
        for (service, times) in [(&once, 1), (&twice, 2)] {
            let uq = create_user_quiz(service).await;
            let result = submit_new_result(service, uq.id().unwrap()).await;
            let message = graded(&result, 6.0, true);
            for _ in 0..times {
                finalize(service, &message).await;
            }
            let result = service.get_result(result.id().unwrap()).await.unwrap().unwrap();
            let uq = service.get_user_quiz(uq.id().unwrap()).await.unwrap().unwrap();
            outcomes.push((
                result.score(),
                result.status(),
                result.version(),
                uq.best_score(),
                uq.status(),
                uq.version(),
            ));
        }

        assert_eq!(outcomes[0], outcomes[1]);
        assert_eq!(outcomes[0].1, ResultStatus::Completed);
    }

    #[tokio::test]
    async fn concurrent_grades_for_same_result_apply_once() {
        let store = InMemoryEventStore::new();
        let service = Arc::new(AttemptService::new(store.clone()));
        let uq = create_user_quiz(&service).await;
        let result = submit_new_result(&service, uq.id().unwrap()).await;
        let message = graded(&result, 5.0, true);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            let message = message.clone();
            handles.push(tokio::spawn(async move {
                service
                    .record_result_grade(RecordResultGrade { graded: message }, None)
                    .await
            }));
        }

        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => {}
                Err(e) => assert!(e.is_conflict(), "unexpected error: {e}"),
            }
        }

        let events = store
            .get_events_for_aggregate(result.id().unwrap())
            .await
            .unwrap();
        let graded_events = events
            .iter()
            .filter(|e| e.event_type == "ResultGraded")
            .count();
        assert_eq!(graded_events, 1);
    }
}
