//! Circuit breaker for upstream provider calls.
//!
//! Each client owns one breaker. After `failure_threshold` consecutive
//! transient failures the breaker opens and calls fail fast with
//! [`UpstreamError::Unavailable`] (which the cache can still answer with a
//! stale entry). After `recovery_timeout` it lets trial calls through
//! (half-open) and closes again after `success_threshold` successes.

use crate::error::UpstreamError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiCircuitState {
    /// Requests flow normally
    Closed,
    /// Requests fail fast until the recovery timeout passes
    Open,
    /// Trial requests check whether the provider is back
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct ApiCircuitBreakerConfig {
    /// Consecutive transient failures that open the circuit
    pub failure_threshold: u32,
    /// How long an open circuit waits before a trial call
    pub recovery_timeout: Duration,
    /// Trial successes needed to close again
    pub success_threshold: u32,
}

impl Default for ApiCircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// Point-in-time view for `/api/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerStatus {
    pub name: String,
    pub state: ApiCircuitState,
    pub consecutive_failures: u32,
}

#[derive(Debug)]
struct Tally {
    state: ApiCircuitState,
    consecutive_failures: u32,
    trial_successes: u32,
    opened_at: Option<Instant>,
}

impl Tally {
    fn closed() -> Self {
        Self {
            state: ApiCircuitState::Closed,
            consecutive_failures: 0,
            trial_successes: 0,
            opened_at: None,
        }
    }
}

pub struct ApiCircuitBreaker {
    name: &'static str,
    config: ApiCircuitBreakerConfig,
    tally: Mutex<Tally>,
}

impl ApiCircuitBreaker {
    pub fn new(name: &'static str, config: ApiCircuitBreakerConfig) -> Self {
        Self {
            name,
            config,
            tally: Mutex::new(Tally::closed()),
        }
    }

    /// Whether a request may be sent now. An open circuit whose recovery
    /// timeout has passed moves to half-open and admits the caller.
    pub fn is_available(&self) -> bool {
        let mut tally = self.tally.lock();
        if tally.state != ApiCircuitState::Open {
            return true;
        }

        let cooled_down = tally
            .opened_at
            .map_or(true, |at| at.elapsed() >= self.config.recovery_timeout);
        if cooled_down {
            tally.state = ApiCircuitState::HalfOpen;
            tally.trial_successes = 0;
            info!("{} circuit half-open, sending trial request", self.name);
        }
        cooled_down
    }

    pub fn record_success(&self) {
        let mut tally = self.tally.lock();
        tally.consecutive_failures = 0;

        if tally.state == ApiCircuitState::HalfOpen {
            tally.trial_successes += 1;
            if tally.trial_successes < self.config.success_threshold {
                return;
            }
            info!(
                "{} circuit closed after {} trial successes",
                self.name, tally.trial_successes
            );
        }
        *tally = Tally::closed();
    }

    pub fn record_failure(&self) {
        let mut tally = self.tally.lock();
        tally.consecutive_failures += 1;

        let trip = match tally.state {
            ApiCircuitState::Closed => tally.consecutive_failures >= self.config.failure_threshold,
            ApiCircuitState::HalfOpen => true,
            ApiCircuitState::Open => false,
        };
        if trip {
            warn!(
                "{} circuit OPEN after {} consecutive failures, retrying in {:?}",
                self.name, tally.consecutive_failures, self.config.recovery_timeout
            );
            tally.state = ApiCircuitState::Open;
            tally.opened_at = Some(Instant::now());
        }
    }

    /// Run one upstream call through the breaker.
    ///
    /// Only retryable failures count against the breaker: a 404 or a
    /// rejected query still proves the provider is up.
    pub async fn call<F, T>(&self, fut: F) -> Result<T, UpstreamError>
    where
        F: Future<Output = Result<T, UpstreamError>>,
    {
        if !self.is_available() {
            return Err(UpstreamError::Unavailable {
                provider: self.name,
                message: "circuit breaker open".to_string(),
            });
        }

        let result = fut.await;
        match &result {
            Err(e) if e.is_retryable() => self.record_failure(),
            _ => self.record_success(),
        }
        result
    }

    pub fn state(&self) -> ApiCircuitState {
        self.tally.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.tally.lock().consecutive_failures
    }

    pub fn status(&self) -> BreakerStatus {
        let tally = self.tally.lock();
        BreakerStatus {
            name: self.name.to_string(),
            state: tally.state,
            consecutive_failures: tally.consecutive_failures,
        }
    }

    pub fn reset(&self) {
        *self.tally.lock() = Tally::closed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, success_threshold: u32) -> ApiCircuitBreaker {
        ApiCircuitBreaker::new(
            "pokemontcg",
            ApiCircuitBreakerConfig {
                failure_threshold,
                recovery_timeout: Duration::from_secs(30),
                success_threshold,
            },
        )
    }

    fn outage() -> UpstreamError {
        UpstreamError::Unavailable {
            provider: "pokemontcg",
            message: "HTTP 503".into(),
        }
    }

    async fn fail(cb: &ApiCircuitBreaker) -> Result<(), UpstreamError> {
        cb.call(async { Err(outage()) }).await
    }

    async fn succeed(cb: &ApiCircuitBreaker) -> Result<u32, UpstreamError> {
        cb.call(async { Ok(7) }).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_outage_opens_circuit_and_fails_fast() {
        let cb = breaker(3, 1);

        for _ in 0..2 {
            assert!(fail(&cb).await.is_err());
        }
        assert_eq!(cb.state(), ApiCircuitState::Closed);
        assert_eq!(cb.failure_count(), 2);

        assert!(fail(&cb).await.is_err());
        assert_eq!(cb.state(), ApiCircuitState::Open);

        match succeed(&cb).await {
            Err(UpstreamError::Unavailable { provider, message }) => {
                assert_eq!(provider, "pokemontcg");
                assert_eq!(message, "circuit breaker open");
            }
            other => panic!("expected fail-fast, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_through_trial_calls() {
        let cb = breaker(1, 2);
        assert!(fail(&cb).await.is_err());
        assert!(!cb.is_available());

        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(succeed(&cb).await, Ok(7));
        assert_eq!(cb.state(), ApiCircuitState::HalfOpen);
        assert_eq!(succeed(&cb).await, Ok(7));
        assert_eq!(cb.state(), ApiCircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_trial_reopens() {
        let cb = breaker(1, 1);
        assert!(fail(&cb).await.is_err());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(fail(&cb).await.is_err());
        assert_eq!(cb.state(), ApiCircuitState::Open);

        // The recovery window restarts from the failed trial
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!cb.is_available());
    }

    #[tokio::test]
    async fn test_lookup_misses_do_not_trip() {
        let cb = breaker(1, 1);
        let missing: Result<(), _> = cb.call(async { Err(UpstreamError::not_found("card")) }).await;
        let rejected: Result<(), _> = cb
            .call(async { Err(UpstreamError::MalformedQuery("bad q".into())) })
            .await;

        assert!(missing.is_err() && rejected.is_err());
        assert_eq!(cb.state(), ApiCircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_success_clears_failure_streak() {
        let cb = breaker(3, 1);
        assert!(fail(&cb).await.is_err());
        assert!(fail(&cb).await.is_err());
        assert!(succeed(&cb).await.is_ok());
        assert!(fail(&cb).await.is_err());
        assert_eq!(cb.state(), ApiCircuitState::Closed);
        assert_eq!(cb.failure_count(), 1);
    }

    #[tokio::test]
    async fn test_status_and_reset() {
        let cb = breaker(1, 1);
        assert!(fail(&cb).await.is_err());

        let status = cb.status();
        assert_eq!(status.name, "pokemontcg");
        assert_eq!(status.state, ApiCircuitState::Open);
        assert_eq!(status.consecutive_failures, 1);

        cb.reset();
        assert_eq!(cb.status().state, ApiCircuitState::Closed);
        assert_eq!(cb.status().consecutive_failures, 0);
        assert!(cb.is_available());
    }
}
