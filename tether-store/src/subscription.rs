//! Subscription handles and the per-query disposer list.

use std::fmt;

/// A handle to one registered listener.
///
/// Dropping the handle unsubscribes. Use [`detach`] to keep the listener
/// registered for the life of the store instead.
///
/// [`detach`]: Subscription::detach
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wraps a cancellation closure.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Unsubscribes now. Equivalent to dropping the handle.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keeps the listener registered after the handle is dropped.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// All subscriptions belonging to one query instance, released together.
///
/// Query primitives collect every handle they mount here and call [`clear`]
/// on re-query or teardown, so listener lifecycles stay deterministic.
///
/// [`clear`]: Disposers::clear
#[derive(Debug, Default)]
pub struct Disposers {
    handles: Vec<Subscription>,
}

impl Disposers {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handle to the list.
    pub fn push(&mut self, handle: Subscription) {
        self.handles.push(handle);
    }

    /// Number of held handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the list holds no handles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancels and releases every held subscription.
    pub fn clear(&mut self) {
        self.handles.clear();
    }
}
