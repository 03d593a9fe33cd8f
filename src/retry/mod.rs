//! Bounded retry for the submission and probe boundary.
//!
//! Job submission and status-probe network calls are wrapped by callers
//! with a small bounded retry for transport-class failures. Failures
//! classified as policy or quota violations are surfaced immediately; the
//! default retry condition consults `GenError::is_retryable()`.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::GenError;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// 1.0 keeps the delay fixed between attempts.
    pub backoff_multiplier: f64,
    pub use_jitter: bool,
    pub jitter_factor: f64,
    /// Custom retry condition; defaults to `GenError::is_retryable`.
    pub retry_condition: Option<fn(&GenError) -> bool>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 1.0,
            use_jitter: false,
            jitter_factor: 0.1,
            retry_condition: None,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub const fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub const fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    pub fn with_retry_condition(mut self, condition: fn(&GenError) -> bool) -> Self {
        self.retry_condition = Some(condition);
        self
    }

    pub fn should_retry(&self, error: &GenError) -> bool {
        match self.retry_condition {
            Some(condition) => condition(error),
            None => error.is_retryable(),
        }
    }

    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(base as u64).min(self.max_delay);
        if self.use_jitter {
            self.add_jitter(delay)
        } else {
            delay
        }
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();
        let range = delay.as_millis() as f64 * self.jitter_factor;
        let jitter = rng.gen_range(-range..=range);
        Duration::from_millis((delay.as_millis() as f64 + jitter).max(0.0) as u64)
    }
}

/// Executes an operation under a retry policy.
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, GenError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, GenError>>,
    {
        let mut last_error = None;

        for attempt in 0..self.policy.max_attempts {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !self.policy.should_retry(&error) {
                        return Err(error);
                    }
                    last_error = Some(error);
                    if attempt == self.policy.max_attempts - 1 {
                        break;
                    }
                    sleep(self.policy.calculate_delay(attempt)).await;
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| GenError::Internal("retry executor failed without error".into())))
    }
}
