//! Bounded retry with exponential backoff.
//!
//! Retryable storage operations (initially only vector search) run through
//! [`with_retries`]: exactly [`MAX_RETRIES`] attempts, exponential backoff
//! between them, transient-only classification by error text, and abort at
//! the next backoff boundary when the ambient token is cancelled.

use crate::{CancellationToken, Error, Result};
use std::time::Duration;

/// Total attempts for a retryable operation.
pub const MAX_RETRIES: u32 = 3;

/// Backoff base; the delay after attempt `i` is `BASE_DELAY * 2^i`.
pub const BASE_DELAY: Duration = Duration::from_millis(100);

/// Error-text markers that classify a failure as transient.
const TRANSIENT_MARKERS: [&str; 17] = [
    "connection",
    "timeout",
    "deadline exceeded",
    "context deadline exceeded",
    "unavailable",
    "temporary",
    "retry",
    "rate limit",
    "too many requests",
    "server error",
    "internal error",
    "service unavailable",
    "network",
    "broken pipe",
    "connection reset",
    "no connection",
    "connection refused",
];

/// Returns whether an error is transient and worth retrying.
///
/// Only [`Error::OperationFailed`] qualifies; validation errors, missing
/// memories and cancellations never do. Classification is case-insensitive
/// matching over the error's textual form.
#[must_use]
pub fn is_transient_error(err: &Error) -> bool {
    match err {
        Error::OperationFailed { .. } => {
            let text = err.to_string().to_lowercase();
            TRANSIENT_MARKERS.iter().any(|marker| text.contains(marker))
        },
        Error::InvalidUserId
        | Error::InvalidInput(_)
        | Error::NotFound(_)
        | Error::Cancelled => false,
    }
}

/// Delay applied after a failed attempt (zero-indexed).
#[must_use]
pub const fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BASE_DELAY.as_millis() as u64 * (1 << attempt))
}

/// Runs `call` with the crate retry policy.
///
/// Non-transient errors return immediately. Transient errors back off and
/// retry until [`MAX_RETRIES`] attempts have been made; the last error is
/// returned. Cancellation is observed at each backoff boundary and surfaces
/// as [`Error::Cancelled`]; no partial results are returned.
///
/// # Errors
///
/// Returns the last error of the failing call, or [`Error::Cancelled`].
pub fn with_retries<T, F>(
    operation: &'static str,
    cancel: &CancellationToken,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut last_error = None;

    for attempt in 0..MAX_RETRIES {
        cancel.check()?;

        match call() {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(
                        operation = operation,
                        attempt = attempt + 1,
                        "Operation succeeded after retries"
                    );
                }
                return Ok(value);
            },
            Err(err) => {
                if !is_transient_error(&err) {
                    return Err(err);
                }

                let delay = backoff_delay(attempt);
                tracing::debug!(
                    operation = operation,
                    attempt = attempt + 1,
                    max_attempts = MAX_RETRIES,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, backing off"
                );
                metrics::counter!(
                    "memory_store_retries_total",
                    "operation" => operation
                )
                .increment(1);

                std::thread::sleep(delay);
                last_error = Some(err);
            },
        }
    }

    cancel.check()?;

    let err = last_error.unwrap_or_else(|| Error::operation(operation, "exhausted retries"));
    tracing::warn!(
        operation = operation,
        max_attempts = MAX_RETRIES,
        error = %err,
        "Operation failed after exhausting all retries"
    );
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient_error() -> Error {
        Error::operation("vector_search", "connection refused by backend")
    }

    #[test]
    fn test_transient_classification() {
        for cause in [
            "connection refused",
            "request TIMEOUT after 5s",
            "context deadline exceeded",
            "service unavailable",
            "rate limit hit",
            "too many requests",
            "broken pipe",
            "Network is unreachable",
        ] {
            assert!(
                is_transient_error(&Error::operation("op", cause)),
                "expected transient: {cause}"
            );
        }
    }

    #[test]
    fn test_non_transient_classification() {
        assert!(!is_transient_error(&Error::operation(
            "op",
            "schema mismatch for field embedding"
        )));
        assert!(!is_transient_error(&Error::InvalidUserId));
        assert!(!is_transient_error(&Error::NotFound("mem_1".to_string())));
        assert!(!is_transient_error(&Error::Cancelled));
    }

    #[test]
    fn test_backoff_delays_double() {
        assert_eq!(backoff_delay(0), Duration::from_millis(100));
        assert_eq!(backoff_delay(1), Duration::from_millis(200));
        assert_eq!(backoff_delay(2), Duration::from_millis(400));
    }

    #[test]
    fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = with_retries("test", &CancellationToken::new(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_persistent_transient_failure_calls_exactly_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries("test", &CancellationToken::new(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(transient_error())
        });
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_RETRIES);
    }

    #[test]
    fn test_last_error_is_returned() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries("test", &CancellationToken::new(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::operation("op", format!("timeout on attempt {n}")))
        });
        let err = result.unwrap_err();
        assert!(err.to_string().contains("attempt 2"));
    }

    #[test]
    fn test_non_transient_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries("test", &CancellationToken::new(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::operation("op", "dimension mismatch"))
        });
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retries("test", &CancellationToken::new(), || {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(transient_error())
            } else {
                Ok("recovered")
            }
        });
        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_pre_cancelled_token_aborts_before_first_call() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries("test", &cancel, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(transient_error())
        });
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancellation_aborts_at_backoff_boundary() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let cancel_inner = cancel.clone();
        let result: Result<()> = with_retries("test", &cancel, move || {
            calls.fetch_add(1, Ordering::SeqCst);
            // Cancel while "in flight"; the loop notices at the next boundary
            cancel_inner.cancel();
            Err(transient_error())
        });
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
