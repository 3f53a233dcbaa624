use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::RpcConfig;
use crate::error::RpcError;
use crate::logging::LogContext;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Additional attempts after the first failure; 0 disables retrying
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Spread delays by up to +/-25%
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl From<&RpcConfig> for RetryConfig {
    fn from(config: &RpcConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_secs(config.retry_delay_seconds),
            max_delay: Duration::from_secs(config.max_retry_delay_seconds),
            ..Self::default()
        }
    }
}

/// Retries RPC operations that fail with a transport error.
/// Protocol errors are returned immediately.
#[derive(Debug, Clone)]
pub struct RetryManager {
    config: RetryConfig,
}

impl RetryManager {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub async fn execute<T, F, Fut>(&self, operation_name: &str, operation: F) -> Result<T, RpcError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        let mut retries = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if retries > 0 {
                        LogContext::new("retry", operation_name)
                            .with_retry_count(retries)
                            .info(&format!("Recovered after {} retries", retries));
                    }
                    return Ok(value);
                }
                Err(error) if error.is_transient() && retries < self.config.max_retries => {
                    retries += 1;
                    let delay = self.calculate_delay(retries);

                    LogContext::new("retry", operation_name)
                        .with_retry_count(retries)
                        .with_metadata("delay_ms", serde_json::json!(delay.as_millis() as u64))
                        .with_metadata("max_retries", serde_json::json!(self.config.max_retries))
                        .warn(&format!(
                            "Transient failure, retrying in {}ms ({} of {}): {}",
                            delay.as_millis(),
                            retries,
                            self.config.max_retries,
                            error
                        ));

                    sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Exponential backoff for the given retry number (1-based), capped at `max_delay`
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let base = self.config.initial_delay.as_secs_f64() * self.config.backoff_multiplier.powi(exponent);
        let capped = base.min(self.config.max_delay.as_secs_f64());

        let delay = if self.config.jitter {
            let jitter = capped * 0.5 * (rand::random::<f64>() - 0.5);
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::try_from_secs_f64(delay).unwrap_or(self.config.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn test_delay_calculation() {
        let manager = RetryManager::new(RetryConfig {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: false,
        });

        assert_eq!(manager.calculate_delay(1), Duration::from_secs(1));
        assert_eq!(manager.calculate_delay(2), Duration::from_secs(2));
        assert_eq!(manager.calculate_delay(3), Duration::from_secs(4));
        assert_eq!(manager.calculate_delay(5), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let manager = RetryManager::new(RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(4),
            backoff_multiplier: 2.0,
            jitter: true,
        });

        for _ in 0..50 {
            let delay = manager.calculate_delay(1).as_secs_f64();
            assert!((3.0..=5.0).contains(&delay), "delay out of range: {}", delay);
        }
    }

    #[test]
    fn test_huge_delays_do_not_overflow() {
        let manager = RetryManager::new(RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_secs(u64::MAX),
            max_delay: Duration::from_secs(u64::MAX),
            backoff_multiplier: 2.0,
            jitter: true,
        });

        for retry in 1..=3 {
            assert!(manager.calculate_delay(retry) <= Duration::from_secs(u64::MAX));
        }
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let manager = RetryManager::new(fast_config(3));
        let counter = AtomicU32::new(0);
        let attempts = &counter;

        let result = manager
            .execute("head", || async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(RpcError::Status { status: 503 })
                } else {
                    Ok(100u64)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 100);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let manager = RetryManager::new(fast_config(2));
        let counter = AtomicU32::new(0);
        let attempts = &counter;

        let result: Result<u64, RpcError> = manager
            .execute("head", || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(RpcError::Timeout { seconds: 1 })
            })
            .await;

        assert!(matches!(result, Err(RpcError::Timeout { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_protocol_errors_fail_immediately() {
        let manager = RetryManager::new(fast_config(5));
        let counter = AtomicU32::new(0);
        let attempts = &counter;

        let result: Result<u64, RpcError> = manager
            .execute("head", || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(RpcError::InvalidResponse("missing result".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_is_single_attempt() {
        let manager = RetryManager::new(fast_config(0));
        let counter = AtomicU32::new(0);
        let attempts = &counter;

        let result: Result<u64, RpcError> = manager
            .execute("block", || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(RpcError::Status { status: 502 })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
