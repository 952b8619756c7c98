//! Retry logic for hop fetches

use crate::error::ResolveError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::warn;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt, transient errors only
    pub max_retries: u32,
    /// Delay before the first retry
    #[serde(with = "crate::utils::duration")]
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    #[serde(with = "crate::utils::duration")]
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Transient hop failures get exactly one retry
    pub fn validate(&self) -> Result<(), ResolveError> {
        if self.max_retries != 1 {
            return Err(ResolveError::Config(format!(
                "retry.max_retries must be 1, got {}",
                self.max_retries
            )));
        }
        Ok(())
    }
}

pub type RetryFuture<T> = Pin<Box<dyn Future<Output = Result<T, ResolveError>> + Send>>;

/// Re-runs an operation while it fails with a retryable error
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn with_config(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// `delay` stretched by up to `jitter_factor` (clamped to 0.0..=1.0)
    fn jittered(&self, delay: Duration) -> Duration {
        let factor = self.config.jitter_factor.clamp(0.0, 1.0);
        if factor == 0.0 {
            return delay;
        }
        let range = delay.as_millis() as f64 * factor;
        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * range;
        delay + Duration::from_millis(jitter.abs() as u64)
    }

    /// Execute `func`, retrying on [`ResolveError::is_retryable`] errors
    pub async fn execute<F, T>(&self, mut func: F) -> Result<T, ResolveError>
    where
        F: FnMut() -> RetryFuture<T>,
    {
        let mut delay = self.config.initial_delay;
        let mut attempt = 0;

        loop {
            let error = match func().await {
                Ok(result) => return Ok(result),
                Err(error) => error,
            };

            if !error.is_retryable() || attempt >= self.config.max_retries {
                return Err(error);
            }
            attempt += 1;

            let wait = self.jittered(delay);
            warn!(
                "{}; retrying in {} ({}/{})",
                error,
                humantime::format_duration(wait),
                attempt,
                self.config.max_retries
            );
            tokio::time::sleep(wait).await;

            delay = Duration::from_millis(
                (delay.as_millis() as f64 * self.config.backoff_multiplier) as u64,
            )
            .min(self.config.max_delay);
        }
    }
}
