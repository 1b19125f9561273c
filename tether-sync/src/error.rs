//! Error types for the push plumbing.

use thiserror::Error;

/// Result type for push-stream operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while streaming server pushes.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport error (stream open failed, connection dropped mid-read).
    #[error("transport error: {0}")]
    Transport(String),

    /// A payload could not be decoded into the listener's type.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A channel handler rejected the payload.
    #[error("handler error: {0}")]
    Handler(String),

    /// No client is connected.
    #[error("not connected")]
    NotConnected,

    /// Channel closed.
    #[error("channel closed")]
    ChannelClosed,
}
