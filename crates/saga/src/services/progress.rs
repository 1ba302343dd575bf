//! Course progress recalculator trait and implementations.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{CourseId, UserId};

use crate::error::SagaError;

/// Recomputes a user's progress through a course.
///
/// The recalculation itself belongs to the course service; the saga only
/// tells it that something changed.
#[async_trait]
pub trait CourseProgressRecalculator: Send + Sync {
    async fn recalculate(&self, course_id: CourseId, user_id: UserId) -> Result<(), SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryProgressState {
    calls: Vec<(CourseId, UserId)>,
    failures_remaining: u32,
    fail_always: bool,
}

/// In-memory recalculator for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProgressRecalculator {
    state: Arc<RwLock<InMemoryProgressState>>,
}

impl InMemoryProgressRecalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every call to fail.
    pub fn set_fail_on_recalculate(&self, fail: bool) {
        self.state.write().unwrap().fail_always = fail;
    }

    /// Configures the next `count` calls to fail.
    pub fn fail_next(&self, count: u32) {
        self.state.write().unwrap().failures_remaining = count;
    }

    /// Successful calls, in order.
    pub fn calls(&self) -> Vec<(CourseId, UserId)> {
        self.state.read().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.read().unwrap().calls.len()
    }
}

#[async_trait]
impl CourseProgressRecalculator for InMemoryProgressRecalculator {
    async fn recalculate(&self, course_id: CourseId, user_id: UserId) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();

        if state.fail_always {
            return Err(SagaError::ProgressService(
                "Progress service unavailable".to_string(),
            ));
        }
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(SagaError::ProgressService(
                "Progress service unavailable".to_string(),
            ));
        }

        state.calls.push((course_id, user_id));
        Ok(())
    }
}

/// Stands in for the course service when none is configured: every
/// recalculation succeeds and is only logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingProgressRecalculator;

#[async_trait]
impl CourseProgressRecalculator for LoggingProgressRecalculator {
    async fn recalculate(&self, course_id: CourseId, user_id: UserId) -> Result<(), SagaError> {
        tracing::info!(%course_id, %user_id, "Course progress recalculation requested");
        Ok(())
    }
}

/// Calls the course service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpProgressRecalculator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProgressRecalculator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, course_id: CourseId, user_id: UserId) -> String {
        format!(
            "{}/courses/{}/users/{}/progress/recalculate",
            self.base_url, course_id, user_id
        )
    }
}

#[async_trait]
impl CourseProgressRecalculator for HttpProgressRecalculator {
    #[tracing::instrument(skip(self), fields(%course_id, %user_id))]
    async fn recalculate(&self, course_id: CourseId, user_id: UserId) -> Result<(), SagaError> {
        self.client
            .post(self.url(course_id, user_id))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| SagaError::ProgressService(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_records_calls_and_injects_failures() {
        let recalculator = InMemoryProgressRecalculator::new();
        let course = CourseId::new();
        let user = UserId::new();

        recalculator.fail_next(1);
        assert!(recalculator.recalculate(course, user).await.is_err());
        recalculator.recalculate(course, user).await.unwrap();

        assert_eq!(recalculator.calls(), vec![(course, user)]);
    }

    #[tokio::test]
    async fn logging_recalculator_always_succeeds() {
        let recalculator = LoggingProgressRecalculator;
        for _ in 0..3 {
            recalculator
                .recalculate(CourseId::new(), UserId::new())
                .await
                .unwrap();
        }
    }

    #[test]
    fn url_joins_base_without_double_slash() {
        let recalculator = HttpProgressRecalculator::new("http://courses.local/api/");
        let course = CourseId::new();
        let user = UserId::new();

        assert_eq!(
            recalculator.url(course, user),
            format!("http://courses.local/api/courses/{course}/users/{user}/progress/recalculate")
        );
    }
}
