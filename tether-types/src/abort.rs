//! Cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A clonable, one-shot cancellation flag.
///
/// Callers hand a signal into a long-running operation and call [`abort`]
/// when the outcome no longer matters. The operation polls [`is_aborted`] at
/// its suspension points; once set, it suppresses all further side effects
/// (no store writes, no rollbacks, no state transitions). The flag is never
/// reset.
///
/// [`abort`]: AbortSignal::abort
/// [`is_aborted`]: AbortSignal::is_aborted
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    aborted: Arc<AtomicBool>,
}

impl AbortSignal {
    /// Creates a fresh, un-aborted signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the signal as aborted. Idempotent.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    /// Whether the signal has been aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}
