//! Cancellation tokens.
//!
//! Every suspending call in the crate (LLM requests, vector-store RPCs, the
//! retrieval retry loop) accepts a [`CancellationToken`] and checks it at its
//! suspension boundaries. Cancellation surfaces as [`crate::Error::Cancelled`]
//! and never returns partial results.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag threaded through suspending operations.
///
/// Cloning is cheap; all clones observe the same flag. A token is one-shot:
/// once cancelled it stays cancelled.
///
/// # Example
///
/// ```rust
/// use mnemo::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a new, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Requests cancellation. All clones of this token observe the change.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(Error::Cancelled)` if cancellation has been requested.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Cancelled`] when the token is cancelled.
    pub fn check(&self) -> crate::Result<()> {
        if self.is_cancelled() {
            Err(crate::Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
