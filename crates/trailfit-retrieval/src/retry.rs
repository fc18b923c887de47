//! Timeout plus retry with exponential back-off and jitter for oracle calls.
//!
//! Only idempotent reads go through here. Non-retriable errors are returned
//! immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::OracleError;

/// Upper bound on a single back-off sleep.
const MAX_DELAY_MS: u64 = 10_000;

/// Sleep before retry number `attempt` (1-based): `base × 2^(attempt-1)`,
/// capped, then scaled by a random factor in `[0.75, 1.25)`.
fn jittered_delay(attempt: u32, backoff_base_ms: u64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10);
    let ceiling = backoff_base_ms
        .saturating_mul(1u64 << exponent)
        .min(MAX_DELAY_MS);
    let factor = 0.75 + rand::random::<f64>() * 0.5;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let millis = (ceiling as f64 * factor) as u64;
    Duration::from_millis(millis)
}

/// Runs `operation` under `timeout`, with up to `max_retries` additional
/// attempts on transient errors.
///
/// A timed-out attempt becomes [`OracleError::Timeout`], which is retriable.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    operation_name: &'static str,
    timeout: Duration,
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, OracleError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OracleError>>,
{
    let mut retries = 0u32;
    loop {
        let err = match tokio::time::timeout(timeout, operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => err,
            Err(_elapsed) => OracleError::Timeout(timeout),
        };
        if retries == max_retries || !err.is_retriable() {
            return Err(err);
        }
        retries += 1;
        let delay = jittered_delay(retries, backoff_base_ms);
        tracing::warn!(
            operation = operation_name,
            retry = retries,
            max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "oracle call failed, backing off"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn delay_doubles_and_caps() {
        for _ in 0..20 {
            let first = jittered_delay(1, 100).as_millis();
            assert!((75..125).contains(&first), "first delay {first}");
            let third = jittered_delay(3, 100).as_millis();
            assert!((300..500).contains(&third), "third delay {third}");
            let huge = jittered_delay(30, 5_000).as_millis();
            assert!(huge < 12_500, "capped delay {huge}");
        }
    }

    #[tokio::test]
    async fn retries_once_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff("test", Duration::from_secs(1), 1, 1, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(OracleError::Unavailable("flaky".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retriable_error_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff("test", Duration::from_secs(1), 3, 1, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(OracleError::Decode {
                    service: "qdrant",
                    reason: "bad".into(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(OracleError::Decode { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_is_retried_then_surfaced() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> =
            retry_with_backoff("test", Duration::from_millis(5), 1, 1, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                }
            })
            .await;
        assert!(matches!(result, Err(OracleError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
