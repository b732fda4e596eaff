//! Exponential backoff around a single RPC attempt, per §4.1: transient
//! failures (connection reset, 5xx, timeout) are retried up to `retry_count`;
//! decode failures are never retried.

use crate::error::ClientError;
use backoff::{exponential::ExponentialBackoff, SystemClock};
use std::future::Future;
use std::time::Duration;

fn backoff_policy() -> ExponentialBackoff<SystemClock> {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(200),
        max_interval: Duration::from_secs(10),
        multiplier: 2.0,
        max_elapsed_time: None,
        // backoff's retry() gives up once the operation has been attempted
        // `retry_count + 1` times via this counter, enforced in `with_retries`.
        ..ExponentialBackoff::<SystemClock>::default()
    }
}

/// Runs `attempt` up to `retry_count + 1` times, backing off exponentially
/// between attempts that fail with `ClientError::NetworkError`. A
/// `ClientError::DecodeError` is treated as permanent and returned immediately.
pub async fn with_retries<T, F, Fut>(
    retry_count: u32,
    attempt: F,
) -> Result<T, ClientError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let tries_left = std::sync::atomic::AtomicU32::new(retry_count + 1);
    let policy = backoff_policy();
    backoff::future::retry(policy, || {
        let tries_left = &tries_left;
        let attempt = &attempt;
        async move {
            match attempt().await {
                Ok(value) => Ok(value),
                Err(err @ ClientError::DecodeError(_)) => {
                    Err(backoff::Error::permanent(err))
                }
                Err(err) => {
                    let remaining = tries_left.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                    if remaining <= 1 {
                        Err(backoff::Error::permanent(err))
                    } else {
                        tracing::warn!(target: "node_client::retry", error = %err, remaining, "transient failure, retrying");
                        Err(backoff::Error::transient(err))
                    }
                }
            }
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_ok() {
        let calls = AtomicU32::new(0);
        let result = with_retries(3, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ClientError>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_failures_up_to_budget() {
        let calls = AtomicU32::new(0);
        let result = with_retries(2, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(ClientError::NetworkError("boom".into()))
            } else {
                Ok(99)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_budget_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, _> = with_retries(1, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ClientError::NetworkError("still down".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn decode_errors_are_never_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, _> = with_retries(5, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ClientError::DecodeError("bad json".into()))
        })
        .await;
        assert!(matches!(result, Err(ClientError::DecodeError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
