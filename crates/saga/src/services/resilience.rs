//! Retry and circuit-breaker policies for outbound calls.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Result, SagaError};

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    /// Delay before the given retry (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }

    /// Runs `op` until it succeeds, the attempts run out, or it fails with
    /// an error that is not retryable.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_attempts || !e.is_retryable() => return Err(e),
                Err(e) => {
                    let delay = self.backoff(attempt);
                    tracing::debug!(attempt, ?delay, error = %e, "Retrying after failure");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerState {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Stops calling a failing collaborator for a while.
///
/// Opens after `failure_threshold` consecutive failures. Once
/// `reset_timeout` has passed, one trial call is let through; success
/// closes the breaker and failure opens it again.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    state: Arc<Mutex<BreakerState>>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(30))
    }
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            state: Arc::new(Mutex::new(BreakerState {
                consecutive_failures: 0,
                opened_at: None,
            })),
        }
    }

    pub fn state(&self) -> CircuitState {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.opened_at {
            None => CircuitState::Closed,
            Some(opened_at) if opened_at.elapsed() >= self.reset_timeout => {
                CircuitState::HalfOpen
            }
            Some(_) => CircuitState::Open,
        }
    }

    /// Runs `op` unless the breaker is open.
    pub async fn call<T, Fut>(&self, op: impl FnOnce() -> Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        if self.state() == CircuitState::Open {
            metrics::counter!("circuit_breaker_rejections_total").increment(1);
            return Err(SagaError::CircuitOpen);
        }

        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }

    fn record_success(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.consecutive_failures = 0;
        state.opened_at = None;
    }

    fn record_failure(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.consecutive_failures += 1;

        // A failed half-open trial restarts the timer.
        if state.opened_at.is_some() || state.consecutive_failures >= self.failure_threshold {
            if state.opened_at.is_none() {
                tracing::warn!(
                    failures = state.consecutive_failures,
                    "Circuit breaker opened"
                );
            }
            state.opened_at = Some(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn failure() -> SagaError {
        SagaError::ProgressService("boom".to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn retry_stops_after_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let value = policy
            .run(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(failure())
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<()> = RetryPolicy::default()
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(failure())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms + 200ms of backoff between the three attempts.
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_does_not_repeat_open_circuit() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = RetryPolicy::default()
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SagaError::CircuitOpen)
            })
            .await;

        assert!(matches!(result, Err(SagaError::CircuitOpen)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn breaker_opens_after_threshold_and_half_opens_later() {
        let breaker = CircuitBreaker::default();

        for _ in 0..5 {
            let _ = breaker.call(|| async { Err::<(), _>(failure()) }).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let rejected = breaker.call(|| async { Ok(()) }).await;
        assert!(matches!(rejected, Err(SagaError::CircuitOpen)));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.call(|| async { Ok(()) }).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_trial_reopens_breaker() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
        let _ = breaker.call(|| async { Err::<(), _>(failure()) }).await;
        tokio::time::advance(Duration::from_secs(30)).await;

        let _ = breaker.call(|| async { Err::<(), _>(failure()) }).await;

        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(30));
        let _ = breaker.call(|| async { Err::<(), _>(failure()) }).await;
        breaker.call(|| async { Ok(()) }).await.unwrap();
        let _ = breaker.call(|| async { Err::<(), _>(failure()) }).await;

        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
