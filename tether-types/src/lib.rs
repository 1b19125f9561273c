//! Core type definitions for Tether.
//!
//! This crate defines the fundamental, domain-agnostic types used throughout
//! the sync layer:
//! - The `Keyed` trait that entities implement to be cacheable
//! - Request lifecycle state (`Variant`, `QueryState`)
//! - The `Verbs` vocabulary that drives status messages
//! - Cooperative cancellation (`AbortSignal`)
//!
//! All domain-specific types (tasks, channels, groups, etc.) belong to the
//! application that configures the query primitives, not here.

mod abort;
mod keyed;
mod state;
mod verbs;

pub use abort::AbortSignal;
pub use keyed::Keyed;
pub use state::{QueryState, Variant};
pub use verbs::Verbs;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in cache and sync operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No client connection exists and the operation does not tolerate that.
    #[error("no client connected")]
    Disconnected,

    /// The operation was cancelled via its abort signal.
    #[error("operation aborted")]
    Aborted,

    /// The transport reported a failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A value failed validation before persistence.
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Whether this error is the transport's "entity does not exist" kind.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
