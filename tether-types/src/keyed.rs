//! The `Keyed` trait — the only constraint entities must satisfy.

use std::fmt::Debug;
use std::hash::Hash;

/// An entity with a stable, unique key.
///
/// Implemented by every record type the store caches. The key must be stable
/// for the lifetime of the entity — a server-assigned identifier, not a
/// derived or mutable field.
pub trait Keyed {
    /// The key type (string, integer, UUID newtype, ...).
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Returns this entity's key.
    fn key(&self) -> Self::Key;
}
