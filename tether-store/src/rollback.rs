//! Inverse actions and the per-mutation rollback stack.
//!
//! Optimistic mutations accumulate the inverse actions the store hands back
//! into a [`RollbackStack`]. On failure the stack unwinds in reverse push
//! order (LIFO) — later actions frequently depend on earlier ones still
//! being intact, and reverse order is the only ordering that is always safe
//! without dependency tracking. On success the stack is discarded untouched.

use std::fmt;
use std::sync::{Arc, Mutex};
use tether_types::Result;
use tracing::warn;

type RollbackFn = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// A single zero-argument compensating action.
///
/// Store mutations return these; mutation bodies may also construct their
/// own for side effects outside the store. Running a rollback consumes it.
pub struct Rollback {
    run: Option<RollbackFn>,
}

impl Rollback {
    /// Wraps a compensating closure.
    pub fn new(run: impl FnOnce() -> Result<()> + Send + 'static) -> Self {
        Self {
            run: Some(Box::new(run)),
        }
    }

    /// An action that does nothing — returned by store mutations that did
    /// not change anything (e.g. deleting an absent key).
    #[must_use]
    pub fn noop() -> Self {
        Self { run: None }
    }

    /// Whether this action does nothing when run.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.run.is_none()
    }

    /// Executes the compensating action.
    pub fn run(mut self) -> Result<()> {
        match self.run.take() {
            Some(f) => f(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Rollback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rollback")
            .field("noop", &self.is_noop())
            .finish()
    }
}

/// An ordered list of compensating actions for one mutation attempt.
///
/// Clonable — clones share the same entries, so a mutation body and its
/// pre-hook push onto the same stack. Not persisted; scoped to a single
/// mutation invocation.
#[derive(Clone, Default)]
pub struct RollbackStack {
    entries: Arc<Mutex<Vec<Rollback>>>,
}

impl RollbackStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a compensating action.
    pub fn push(&self, rollback: Rollback) {
        self.entries.lock().unwrap().push(rollback);
    }

    /// Number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the stack holds no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Discards all actions without running them — the success path.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// Runs every action in reverse push order (LIFO) and empties the
    /// stack. A failing action is logged and skipped; the remainder still
    /// run. Returns the number of actions that completed.
    pub fn unwind(&self) -> usize {
        let drained: Vec<Rollback> = {
            let mut entries = self.entries.lock().unwrap();
            entries.drain(..).collect()
        };

        let mut completed = 0;
        for rollback in drained.into_iter().rev() {
            match rollback.run() {
                Ok(()) => completed += 1,
                Err(error) => warn!("rollback failed: {error}"),
            }
        }
        completed
    }
}

impl fmt::Debug for RollbackStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollbackStack")
            .field("len", &self.len())
            .finish()
    }
}
