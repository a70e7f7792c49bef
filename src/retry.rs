//! Retry loop with exponential backoff, per spec section 4.5 / 8.
//!
//! Grounded on the teacher's straight-line retry-free call in
//! `zeph1rus-rust-azure-table-queue`'s `queuemsg` send path, generalized with the
//! classic decorrelated-jitter backoff shape from
//! `examples/other_examples/*backoff*` patterns in the retrieval pack: attempt,
//! classify, sleep `min(maxDelay, delayFactor * 2^k)` randomized by
//! `randomization_factor`, repeat.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

use crate::error::{is_transient_network_code, Error};

/// One retry policy evaluation, per spec section 4.5.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_factor: Duration,
    pub randomization_factor: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// `delay = min(maxDelay, delayFactor * 2^attempt) * random_in[1-rf, 1+rf]`,
    /// per spec section 4.5 invariant and the worked example in section 8.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = 2u64.saturating_pow(attempt);
        let base = self.delay_factor.saturating_mul(exp.min(u32::MAX as u64) as u32);
        let capped = base.min(self.max_delay);

        let rf = self.randomization_factor.clamp(0.0, 1.0);
        let jitter = rand::thread_rng().gen_range((1.0 - rf)..=(1.0 + rf));
        Duration::from_secs_f64(capped.as_secs_f64() * jitter)
    }
}

/// Whether a failed attempt should be retried. [`Error::Service`] is transient iff
/// its code was matched against `transient_error_codes` in [`crate::classify`];
/// [`Error::Timeout`] is always transient (the client-side deadline, not a server
/// code); [`Error::Network`] is transient only if its classified transport code is
/// one of [`crate::error::TRANSIENT_NETWORK_CODES`] — an unclassified or permanent
/// transport failure (TLS validation, DNS `ENOTFOUND`) is not retried just because
/// it arrived as `Network`. `Cancelled`/`Config`/`Malformed` never retry.
fn is_transient(err: &Error) -> bool {
    match err {
        Error::Service(service_err) => service_err.is_transient(),
        Error::Timeout { .. } => true,
        Error::Network { code, .. } => code.as_deref().is_some_and(is_transient_network_code),
        Error::Cancelled | Error::Config(_) | Error::Malformed(_) => false,
    }
}

fn with_retries(err: Error, retries: u32) -> Error {
    match err {
        Error::Service(mut service_err) => {
            service_err = service_err.with_retries(retries);
            Error::Service(service_err)
        }
        Error::Timeout { .. } => Error::Timeout { retries },
        Error::Network { message, code, .. } => Error::Network { message, code, retries },
        other => other,
    }
}

/// Runs `attempt` up to `policy.max_attempts` times, sleeping a randomized
/// exponential backoff between transient failures. `attempt` receives the
/// zero-based attempt index, so it can be used for logging.
pub async fn run_with_retry<T, F, Fut>(policy: RetryPolicy, mut attempt: F) -> Result<T, Error>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut last_err: Option<Error> = None;
    for attempt_index in 0..policy.max_attempts.max(1) {
        match attempt(attempt_index).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = is_transient(&err);
                let is_last = attempt_index + 1 == policy.max_attempts;
                if !retryable || is_last {
                    error!(attempt = attempt_index, kind = ?err.kind(), status = ?err.status_code(), "request failed, not retrying");
                    return Err(with_retries(err, attempt_index));
                }
                let delay = policy.backoff_for(attempt_index);
                warn!(
                    attempt = attempt_index,
                    kind = ?err.kind(),
                    status = ?err.status_code(),
                    delay_ms = delay.as_millis() as u64,
                    "transient error, retrying after backoff"
                );
                last_err = Some(err);
                tokio::time::sleep(delay).await;
            }
        }
    }
    // Unreachable when max_attempts >= 1, kept only so the function has a value
    // to return if max_attempts were ever 0.
    Err(last_err.unwrap_or_else(|| Error::Network {
        message: "no attempts were made".to_string(),
        code: None,
        retries: 0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ServiceError};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            delay_factor: Duration::from_millis(1),
            randomization_factor: 0.0,
            max_delay: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_succeeds() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, Error> = run_with_retry(policy(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, Error> = run_with_retry(policy(), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::Timeout { retries: 0 })
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_after_max_attempts_and_reports_retry_count() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, Error> = run_with_retry(policy(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::Timeout { retries: 0 }) }
        })
        .await;
        match result {
            Err(Error::Timeout { retries }) => assert_eq!(retries, 3),
            other => panic!("expected Timeout, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn non_transient_errors_never_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, Error> = run_with_retry(policy(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::Service(
                    ServiceError::new(ErrorKind::NotFound, "BlobNotFound", "not found")
                        .with_status(404),
                ))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn network_error_with_transient_code_is_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, Error> = run_with_retry(policy(), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::Network {
                        message: "connection reset by peer".to_string(),
                        code: Some("ECONNRESET".to_string()),
                        retries: 0,
                    })
                } else {
                    Ok(9)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 9);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    /// A transport failure with no classified code (or one outside the fixed
    /// transient set, e.g. TLS validation / DNS `ENOTFOUND`) must not be retried
    /// just because it surfaced as `Error::Network`.
    #[tokio::test]
    async fn network_error_with_unclassified_code_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, Error> = run_with_retry(policy(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::Network {
                    message: "certificate verify failed".to_string(),
                    code: None,
                    retries: 0,
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_is_capped_by_max_delay() {
        let p = RetryPolicy {
            max_attempts: 10,
            delay_factor: Duration::from_secs(1),
            randomization_factor: 0.0,
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(p.backoff_for(10), Duration::from_millis(500));
    }
}
