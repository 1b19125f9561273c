//! The wire unit of a push stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One batch of pushed payloads, grouped by channel name.
///
/// A single frame may carry payloads for several channels at once; the bridge
/// fans each channel's payloads out to the listeners registered for it, in
/// order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    entries: HashMap<String, Vec<Value>>,
}

impl Frame {
    /// Creates an empty frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a frame carrying one payload on one channel.
    #[must_use]
    pub fn single(channel: impl Into<String>, payload: Value) -> Self {
        let mut frame = Self::new();
        frame.push(channel, payload);
        frame
    }

    /// Appends a payload to `channel`, preserving arrival order.
    pub fn push(&mut self, channel: impl Into<String>, payload: Value) {
        self.entries.entry(channel.into()).or_default().push(payload);
    }

    /// The payloads pushed on `channel`, oldest first. Empty for a channel
    /// the frame does not carry.
    #[must_use]
    pub fn get(&self, channel: &str) -> &[Value] {
        self.entries.get(channel).map(Vec::as_slice).unwrap_or_default()
    }

    /// The channels this frame carries payloads for.
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Whether the frame carries no payloads at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }
}
