//! Keyed, subscribable in-memory entity cache for Tether.
//!
//! One [`Store`] holds the application's view of one entity kind. Query
//! primitives read it, mutation primitives write it optimistically, and the
//! channel bridge keeps it eventually consistent with the server. Every
//! mutating operation returns an inverse action ([`Rollback`]) that restores
//! the store to its pre-call state — the primitive the mutation layer's
//! [`RollbackStack`] is built from.
//!
//! # Architecture
//!
//! - **Entries**: a keyed map guarded by a read/write lock. Individual
//!   operations are atomic; no cross-call ordering is guaranteed or needed.
//! - **Listeners**: set/delete subscribers, optionally scoped to one key.
//!   Callbacks run synchronously within the mutating call but outside the
//!   store's locks, so a callback may read the store or register further
//!   subscriptions.
//! - **Scopes**: [`Store::scoped`] returns a handle whose writes are not
//!   delivered to listeners registered through the same scope, so a query
//!   primitive never re-processes its own writes.
//! - **Equality suppression**: a store built with [`Store::with_equal`]
//!   skips set notifications when the incoming value is semantically equal
//!   to the current one. The value is still replaced.
//!
//! # Example
//!
//! ```
//! use tether_store::Store;
//! use tether_types::Keyed;
//!
//! #[derive(Debug, Clone)]
//! struct Task {
//!     id: u32,
//!     name: String,
//! }
//!
//! impl Keyed for Task {
//!     type Key = u32;
//!     fn key(&self) -> u32 {
//!         self.id
//!     }
//! }
//!
//! let store: Store<Task> = Store::new();
//! let undo = store.set(Task { id: 1, name: "write docs".into() });
//! assert!(store.get(&1).is_some());
//!
//! // The returned inverse action restores the pre-call state.
//! undo.run().unwrap();
//! assert!(store.get(&1).is_none());
//! ```

mod rollback;
mod store;
mod subscription;

pub use rollback::{Rollback, RollbackStack};
pub use store::Store;
pub use subscription::{Disposers, Subscription};
