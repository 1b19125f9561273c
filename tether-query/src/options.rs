//! Per-call options.

use tether_types::AbortSignal;

/// Options for a retrieve or list fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Cooperative cancellation; an aborted fetch applies no store write and
    /// no state transition once the abort is observed.
    pub signal: AbortSignal,
    /// Skip the cache-read fast path and hit the transport.
    pub refresh: bool,
}

/// Options for a mutation.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Cooperative cancellation; once aborted, the pipeline suppresses every
    /// further side effect — no rollbacks, no state transition.
    pub signal: AbortSignal,
}
