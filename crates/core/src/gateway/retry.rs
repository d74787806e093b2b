use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::warn;

use crate::config::BulkConfig;
use crate::gateway::{GatewayError, GatewayOperation};

const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Rate-limit retry schedule. Only [`GatewayError::RateLimited`] is retried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&BulkConfig::default())
    }
}

impl From<&BulkConfig> for RetryPolicy {
    fn from(config: &BulkConfig) -> Self {
        Self {
            max_retries: config.retry_attempts,
            base_delay: config.retry_base_delay(),
            max_jitter: config.retry_max_jitter(),
        }
    }
}

impl RetryPolicy {
    /// Base delay doubled per attempt, without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let multiplier = 1_u32 << attempt.min(MAX_BACKOFF_EXPONENT);
        self.base_delay.saturating_mul(multiplier)
    }

    /// Delay before retry number `attempt` (0-based), honouring a provider hint.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        let scheduled = self.backoff(attempt) + jitter;
        retry_after.map_or(scheduled, |hint| hint.max(scheduled))
    }
}

/// Runs one gateway call under a time budget, retrying on rate limits only.
///
/// `budget` bounds the whole call, retries and backoff included. An attempt
/// still running at the deadline surfaces as [`GatewayError::Timeout`]; a
/// backoff that would end past the deadline returns the rate limit instead.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: GatewayOperation,
    budget: Duration,
    mut call: F,
) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let deadline = Instant::now() + budget;
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout_at(deadline, call()).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout { operation, after: budget }),
        };

        match result {
            Err(GatewayError::RateLimited { operation: limited, retry_after, message })
                if attempt < policy.max_retries =>
            {
                let delay = policy.delay_for(attempt, retry_after);
                if Instant::now() + delay >= deadline {
                    warn!(
                        event_name = "gateway.retry.budget_exhausted",
                        operation = operation.as_str(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        budget_ms = budget.as_millis() as u64,
                        "backoff would outlast the call budget; giving up"
                    );
                    return Err(GatewayError::RateLimited { operation: limited, retry_after, message });
                }
                warn!(
                    event_name = "gateway.retry.rate_limited",
                    operation = operation.as_str(),
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    message = %message,
                    "provider rate limited; backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::Instant;

    use super::{call_with_retry, RetryPolicy};
    use crate::gateway::{GatewayError, GatewayOperation};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_jitter: Duration::ZERO,
        }
    }

    fn rate_limited() -> GatewayError {
        GatewayError::RateLimited {
            operation: GatewayOperation::CreateShipment,
            message: "429".to_string(),
            retry_after: None,
        }
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_jitter: Duration::ZERO,
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(3), Duration::from_millis(4_000));
        assert_eq!(
            policy.delay_for(0, Some(Duration::from_secs(2))),
            Duration::from_secs(2),
            "provider retry-after wins when longer"
        );
    }

    #[test]
    fn jitter_stays_within_bound() {
        let policy = RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(10),
            max_jitter: Duration::from_millis(1_000),
        };
        for _ in 0..50 {
            let delay = policy.delay_for(0, None);
            assert!(delay >= Duration::from_millis(10));
            assert!(delay <= Duration::from_millis(1_010));
        }
    }

    #[tokio::test]
    async fn rate_limits_retry_until_attempts_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), GatewayError> = call_with_retry(
            &fast_policy(3),
            GatewayOperation::CreateShipment,
            Duration::from_secs(1),
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(rate_limited()) }
            },
        )
        .await;

        assert!(matches!(result, Err(GatewayError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn recovers_after_transient_rate_limit() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = call_with_retry(
            &fast_policy(3),
            GatewayOperation::RetrieveShipment,
            Duration::from_secs(1),
            || {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(rate_limited())
                    } else {
                        Ok("shp_1")
                    }
                }
            },
        )
        .await;

        assert_eq!(result, Ok("shp_1"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), GatewayError> = call_with_retry(
            &fast_policy(3),
            GatewayOperation::BuyShipment,
            Duration::from_secs(1),
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(GatewayError::Rejected {
                        operation: GatewayOperation::BuyShipment,
                        status: 422,
                        message: "rate expired".to_string(),
                    })
                }
            },
        )
        .await;

        assert!(matches!(result, Err(GatewayError::Rejected { status: 422, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_calls_become_timeouts() {
        let result: Result<(), GatewayError> = call_with_retry(
            &fast_policy(3),
            GatewayOperation::CreateShipment,
            Duration::from_millis(50),
            || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
        )
        .await;

        assert_eq!(
            result,
            Err(GatewayError::Timeout {
                operation: GatewayOperation::CreateShipment,
                after: Duration::from_millis(50),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_that_would_outlast_the_budget_is_not_slept() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(400),
            max_jitter: Duration::ZERO,
        };
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let started = Instant::now();

        let result: Result<(), GatewayError> = call_with_retry(
            &policy,
            GatewayOperation::CreateShipment,
            Duration::from_secs(1),
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(rate_limited()) }
            },
        )
        .await;

        assert!(matches!(result, Err(GatewayError::RateLimited { .. })));
        // 400ms backoff fits, the following 800ms does not.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_share_one_deadline() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let budget = Duration::from_millis(200);
        let started = Instant::now();

        let result: Result<(), GatewayError> = call_with_retry(
            &fast_policy(3),
            GatewayOperation::CreateShipment,
            budget,
            || {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        tokio::time::sleep(Duration::from_millis(150)).await;
                        return Err(rate_limited());
                    }
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                }
            },
        )
        .await;

        assert_eq!(
            result,
            Err(GatewayError::Timeout { operation: GatewayOperation::CreateShipment, after: budget })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() <= budget + Duration::from_millis(1));
    }
}
