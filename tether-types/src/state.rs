//! Request lifecycle state.
//!
//! Every query and mutation primitive exposes its progress as a
//! `QueryState<T>`: a discrete variant plus the latest data and a pair of
//! human-readable messages. Consumers observe it through a watch channel and
//! render it directly; the layer never surfaces raw errors to them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The discrete status of a query or mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// The operation is in flight.
    Loading,
    /// The operation completed; `data` holds the latest value.
    Success,
    /// The operation ran and failed.
    Error,
    /// The operation could not run — no live connection exists and the
    /// operation does not tolerate that. Distinct from `Error`.
    Disabled,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
            Self::Disabled => "disabled",
        };
        write!(f, "{s}")
    }
}

/// The externally observable state of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryState<T> {
    /// Current lifecycle variant.
    pub variant: Variant,

    /// Latest data, if any. Preserved across a re-entered `loading` so
    /// consumers keep rendering the previous value while a refresh runs.
    #[serde(default = "Option::default")]
    pub data: Option<T>,

    /// Headline status message ("Failed to update task").
    pub message: String,

    /// Underlying detail, typically the transport's error text verbatim.
    #[serde(default)]
    pub description: Option<String>,
}

impl<T> QueryState<T> {
    /// An in-flight state with no data yet.
    #[must_use]
    pub fn loading(message: impl Into<String>) -> Self {
        Self {
            variant: Variant::Loading,
            data: None,
            message: message.into(),
            description: None,
        }
    }

    /// A settled success state carrying data.
    #[must_use]
    pub fn success(data: T) -> Self {
        Self::success_opt(Some(data))
    }

    /// A settled success state with optional data (`None` for "nothing
    /// persisted yet" or "entity gone").
    #[must_use]
    pub fn success_opt(data: Option<T>) -> Self {
        Self {
            variant: Variant::Success,
            data,
            message: String::new(),
            description: None,
        }
    }

    /// A failure state. `message` is the headline, `description` the
    /// underlying error text.
    #[must_use]
    pub fn error(message: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            variant: Variant::Error,
            data: None,
            message: message.into(),
            description: Some(description.into()),
        }
    }

    /// A disabled state — the operation never ran.
    #[must_use]
    pub fn disabled(message: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            variant: Variant::Disabled,
            data: None,
            message: message.into(),
            description: Some(description.into()),
        }
    }

    /// Whether the operation is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.variant == Variant::Loading
    }

    /// Whether the operation settled successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.variant == Variant::Success
    }

    /// Whether the operation ran and failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.variant == Variant::Error
    }

    /// Whether the operation could not run at all.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.variant == Variant::Disabled
    }
}
