//! Cache-first query primitives over a shared entity store.
//!
//! Four primitives cover the read and write paths of a connected
//! application. All of them resolve against the same
//! [`Store`](tether_store::Store), so a write applied anywhere — another
//! surface's optimistic mutation, a pushed change fanned out by
//! `tether-sync` — reaches every mounted primitive through the store's
//! subscriptions rather than through refetching.
//!
//! # Architecture
//!
//! - [`Retrieve`] resolves one entity by key: answered from cache when the
//!   entity is present, from the transport otherwise, and kept live through
//!   store subscriptions thereafter.
//! - [`List`] materializes a collection and keeps its membership live. A
//!   [`CachePlan`] decides per query whether a local predicate scan can
//!   answer it; the predicate then governs admission and eviction as
//!   entities change.
//! - [`Update`] runs a mutation pipeline: optimistic store writes pushed
//!   onto a rollback stack, unwound in reverse order if persistence fails.
//! - [`Form`] binds an editable value object to an entity, validating
//!   before it persists through an internal [`Update`].
//!
//! Every primitive publishes a [`QueryState`](tether_types::QueryState)
//! through a watch channel; UI layers render the snapshot and re-render on
//! change.
//!
//! ```
//! use tether_query::Retrieve;
//! use tether_store::Store;
//! use tether_sync::ClientHandle;
//! use tether_types::{Error, Keyed};
//!
//! #[derive(Clone)]
//! struct Task {
//!     id: u64,
//! }
//!
//! impl Keyed for Task {
//!     type Key = u64;
//!     fn key(&self) -> u64 {
//!         self.id
//!     }
//! }
//!
//! struct Api;
//!
//! let store: Store<Task> = Store::new();
//! let client: ClientHandle<Api> = ClientHandle::new();
//!
//! let task = Retrieve::new(
//!     client,
//!     &store,
//!     |key: &u64| *key,
//!     |_ctx, key: u64| async move { Err::<Task, Error>(Error::NotFound(key.to_string())) },
//! )
//! .with_name("task");
//!
//! assert!(task.state().is_loading());
//! ```

mod form;
mod list;
mod options;
mod retrieve;
mod update;

pub use form::{Form, FormValues};
pub use list::{CachePlan, List};
pub use options::{FetchOptions, UpdateOptions};
pub use retrieve::{FetchCtx, Retrieve};
pub use update::{BeforeCtx, BeforeOutcome, Update, UpdateCtx, UpdateOutcome};
