//! Retry wrapper for outbound backend calls.
//!
//! Every call to the telemetry backend goes through [`retry_with_config`]:
//! transient failures (rate limits, 5xx, timeouts) are retried with
//! exponential backoff, permanent failures surface after a single attempt.
//! Backoff sleeps are async suspensions, so unrelated tool resolutions
//! keep making progress while a call waits.

use crate::core::{LensError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts (first call included)
    pub max_attempts: u32,
    /// Initial backoff duration
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    /// Backoff multiplier (2.0 doubles the delay each attempt)
    pub multiplier: f64,
    /// Add jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Validate the retry settings
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(LensError::config("retry max_attempts must be at least 1"));
        }
        if self.multiplier < 1.0 {
            return Err(LensError::config(format!(
                "retry multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }
}

/// Execute an operation with retry and exponential backoff.
///
/// Attempts of the same call are strictly sequential; the classification
/// lives on [`LensError::is_transient`]. The last error is returned after
/// the attempt budget is exhausted.
pub async fn retry_with_config<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut backoff = config.initial_backoff;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if !error.is_transient() {
                    return Err(error);
                }
                if attempt >= config.max_attempts {
                    tracing::error!(
                        attempts = attempt,
                        category = error.category(),
                        "backend call failed after exhausting retries: {}",
                        error
                    );
                    return Err(error);
                }

                if attempt > 1 {
                    backoff = Duration::from_secs_f64(backoff.as_secs_f64() * config.multiplier);
                    if backoff > config.max_backoff {
                        backoff = config.max_backoff;
                    }
                }

                let actual_backoff = if config.jitter {
                    let jitter_ms = rand::random::<f64>() * backoff.as_millis() as f64 * 0.1;
                    backoff + Duration::from_millis(jitter_ms as u64)
                } else {
                    backoff
                };

                tracing::warn!(
                    attempt,
                    category = error.category(),
                    "attempt failed: {}. Retrying in {:?}...",
                    error,
                    actual_backoff
                );

                sleep(actual_backoff).await;
            },
        }
    }
}

/// Simple retry with default configuration
pub async fn retry<F, Fut, T>(operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_with_config(&RetryConfig::default(), operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(500),
            multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_failures() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = retry_with_config(&fast_config(), move || {
            let attempts = attempts_clone.clone();
            async move {
                let count = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                if count < 3 {
                    Err(LensError::transient("503 from backend"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_attempts_with_doubling_backoff() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let started = Instant::now();
        let result: Result<i32> = retry_with_config(&fast_config(), move || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::Relaxed);
                Err(LensError::RateLimited("429".to_string()))
            }
        })
        .await;
        let elapsed = started.elapsed();

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::Relaxed), 3);
        // Two backoff sleeps: 10ms + 20ms.
        assert!(elapsed >= Duration::from_millis(30), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(500), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_permanent_error_gets_single_attempt() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<i32> = retry_with_config(&fast_config(), move || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::Relaxed);
                Err(LensError::permanent(400, "invalid query"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_retry_config_validation() {
        assert!(RetryConfig::default().validate().is_ok());

        let mut config = RetryConfig::default();
        config.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = RetryConfig::default();
        config.multiplier = 0.5;
        assert!(config.validate().is_err());
    }
}
