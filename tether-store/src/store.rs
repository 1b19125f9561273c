//! The keyed entity store.

use crate::rollback::Rollback;
use crate::subscription::Subscription;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tether_types::Keyed;

type EqualFn<E> = Arc<dyn Fn(&E, &E) -> bool + Send + Sync>;
type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// One registered set or delete listener.
struct Registered<E: Keyed> {
    id: u64,
    /// `None` — fire for writes to any key.
    key: Option<E::Key>,
    /// Scope the listener was registered through; listeners are skipped for
    /// writes made through a handle with the same scope.
    scope: Option<Arc<str>>,
    callback: Callback<E>,
}

impl<E: Keyed> Clone for Registered<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            key: self.key.clone(),
            scope: self.scope.clone(),
            callback: Arc::clone(&self.callback),
        }
    }
}

struct Listeners<E: Keyed> {
    set: Vec<Registered<E>>,
    delete: Vec<Registered<E>>,
}

struct Inner<E: Keyed> {
    entries: RwLock<HashMap<E::Key, E>>,
    listeners: Mutex<Listeners<E>>,
    equal: Option<EqualFn<E>>,
    next_listener_id: AtomicU64,
}

/// A keyed, subscribable in-memory cache of one entity kind.
///
/// Cheap to clone — clones share contents and listeners. A key is present
/// iff it has been set and not subsequently deleted. Every mutating method
/// returns a [`Rollback`] that restores the store to its pre-call state and
/// fires the matching notifications when run.
pub struct Store<E: Keyed> {
    inner: Arc<Inner<E>>,
    scope: Option<Arc<str>>,
}

impl<E: Keyed> Clone for Store<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            scope: self.scope.clone(),
        }
    }
}

impl<E> Store<E>
where
    E: Keyed + Clone + Send + Sync + 'static,
{
    /// Creates an empty store without an equality function.
    #[must_use]
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates an empty store with an equality function used to suppress
    /// set notifications for semantically unchanged writes. The stored
    /// value is still replaced on a suppressed write.
    pub fn with_equal(equal: impl Fn(&E, &E) -> bool + Send + Sync + 'static) -> Self {
        Self::build(Some(Arc::new(equal)))
    }

    fn build(equal: Option<EqualFn<E>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                listeners: Mutex::new(Listeners {
                    set: Vec::new(),
                    delete: Vec::new(),
                }),
                equal,
                next_listener_id: AtomicU64::new(0),
            }),
            scope: None,
        }
    }

    /// Returns a handle sharing this store's contents whose writes are not
    /// delivered to listeners registered through the same scope. Query
    /// primitives write through their own scope so they never re-process
    /// their own writes; external writes still reach them.
    #[must_use]
    pub fn scoped(&self, name: impl Into<String>) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            scope: Some(Arc::from(name.into())),
        }
    }

    /// Returns a handle sharing this store's contents with no scope, whose
    /// writes reach every listener.
    #[must_use]
    pub fn unscoped(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            scope: None,
        }
    }

    /// The scope this handle writes under, if any.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Returns a clone of the entity at `key`.
    #[must_use]
    pub fn get(&self, key: &E::Key) -> Option<E> {
        self.inner.entries.read().unwrap().get(key).cloned()
    }

    /// Multi-get. Missing keys are skipped silently; found entries keep the
    /// order of the requested keys. Callers needing positional
    /// correspondence must check membership themselves.
    #[must_use]
    pub fn get_many(&self, keys: &[E::Key]) -> Vec<E> {
        let entries = self.inner.entries.read().unwrap();
        let mut found = Vec::new();
        for key in keys {
            if let Some(entity) = entries.get(key) {
                found.push(entity.clone());
            }
        }
        found
    }

    /// Full-scan filter — the List primitive's cache-read path.
    #[must_use]
    pub fn get_where(&self, predicate: impl Fn(&E) -> bool) -> Vec<E> {
        let entries = self.inner.entries.read().unwrap();
        let mut found = Vec::new();
        for entity in entries.values() {
            if predicate(entity) {
                found.push(entity.clone());
            }
        }
        found
    }

    /// All entities, in no particular order.
    #[must_use]
    pub fn list(&self) -> Vec<E> {
        self.inner.entries.read().unwrap().values().cloned().collect()
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &E::Key) -> bool {
        self.inner.entries.read().unwrap().contains_key(key)
    }

    /// Number of cached entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.read().unwrap().len()
    }

    /// Whether the store holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().unwrap().is_empty()
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Inserts or replaces the entity under its own key. Returns the
    /// inverse action (delete for an insert, restore for an overwrite).
    pub fn set(&self, value: E) -> Rollback {
        let key = value.key();
        let (previous, suppressed) = {
            let mut entries = self.inner.entries.write().unwrap();
            let previous = entries.get(&key).cloned();
            let suppressed = self.is_unchanged(previous.as_ref(), &value);
            entries.insert(key.clone(), value.clone());
            (previous, suppressed)
        };

        if !suppressed {
            self.notify_set(std::slice::from_ref(&value));
        }
        self.inverse_of_set(key, previous)
    }

    /// Conditional update. The updater receives the current entity (if any)
    /// and returns the replacement; returning `None` makes the whole call a
    /// no-op — no mutation, no notification, a no-op rollback. The updater
    /// runs under the store's write lock and must not call back into this
    /// store.
    pub fn set_with(
        &self,
        key: &E::Key,
        updater: impl FnOnce(Option<&E>) -> Option<E>,
    ) -> Rollback {
        let (previous, value, suppressed) = {
            let mut entries = self.inner.entries.write().unwrap();
            let previous = entries.get(key).cloned();
            let Some(value) = updater(previous.as_ref()) else {
                return Rollback::noop();
            };
            let suppressed = self.is_unchanged(previous.as_ref(), &value);
            entries.insert(key.clone(), value.clone());
            (previous, value, suppressed)
        };

        if !suppressed {
            self.notify_set(std::slice::from_ref(&value));
        }
        self.inverse_of_set(key.clone(), previous)
    }

    /// Bulk insert/replace. Later duplicates of a key within one call win;
    /// each distinct changed key is notified at most once. Returns a single
    /// inverse action restoring every touched key.
    pub fn set_many(&self, values: impl IntoIterator<Item = E>) -> Rollback {
        // Deduplicate by key up front, preserving first-seen order.
        let mut incoming: Vec<(E::Key, E)> = Vec::new();
        let mut positions: HashMap<E::Key, usize> = HashMap::new();
        for value in values {
            let key = value.key();
            match positions.get(&key) {
                Some(&at) => incoming[at].1 = value,
                None => {
                    positions.insert(key.clone(), incoming.len());
                    incoming.push((key, value));
                }
            }
        }
        if incoming.is_empty() {
            return Rollback::noop();
        }

        let mut changed: Vec<E> = Vec::new();
        let mut previous: Vec<(E::Key, Option<E>)> = Vec::new();
        {
            let mut entries = self.inner.entries.write().unwrap();
            for (key, value) in incoming {
                let prior = entries.get(&key).cloned();
                let suppressed = self.is_unchanged(prior.as_ref(), &value);
                entries.insert(key.clone(), value.clone());
                previous.push((key, prior));
                if !suppressed {
                    changed.push(value);
                }
            }
        }
        self.notify_set(&changed);

        let store = self.clone();
        Rollback::new(move || {
            for (key, prior) in previous.into_iter().rev() {
                match prior {
                    Some(entity) => {
                        let _ = store.set(entity);
                    }
                    None => {
                        let _ = store.delete(&key);
                    }
                }
            }
            Ok(())
        })
    }

    /// Removes the entity at `key`. Removing an absent key is a silent
    /// no-op. Delete listeners receive the removed entity.
    pub fn delete(&self, key: &E::Key) -> Rollback {
        let removed = self.inner.entries.write().unwrap().remove(key);
        match removed {
            Some(entity) => {
                self.notify_delete(std::slice::from_ref(&entity));
                let store = self.clone();
                Rollback::new(move || {
                    let _ = store.set(entity);
                    Ok(())
                })
            }
            None => Rollback::noop(),
        }
    }

    /// Removes every entity whose key is in `keys`.
    pub fn delete_many(&self, keys: &[E::Key]) -> Rollback {
        let mut removed = Vec::new();
        {
            let mut entries = self.inner.entries.write().unwrap();
            for key in keys {
                if let Some(entity) = entries.remove(key) {
                    removed.push(entity);
                }
            }
        }
        self.finish_delete(removed)
    }

    /// Removes every entity matching the predicate.
    pub fn delete_where(&self, predicate: impl Fn(&E) -> bool) -> Rollback {
        let mut removed = Vec::new();
        {
            let mut entries = self.inner.entries.write().unwrap();
            let mut doomed = Vec::new();
            for (key, entity) in entries.iter() {
                if predicate(entity) {
                    doomed.push(key.clone());
                }
            }
            for key in &doomed {
                if let Some(entity) = entries.remove(key) {
                    removed.push(entity);
                }
            }
        }
        self.finish_delete(removed)
    }

    fn finish_delete(&self, removed: Vec<E>) -> Rollback {
        if removed.is_empty() {
            return Rollback::noop();
        }
        self.notify_delete(&removed);

        let store = self.clone();
        Rollback::new(move || {
            for entity in removed.into_iter().rev() {
                let _ = store.set(entity);
            }
            Ok(())
        })
    }

    // ── Subscriptions ────────────────────────────────────────────

    /// Subscribes to set notifications on every key.
    pub fn on_set(&self, callback: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        self.register(Kind::Set, None, Arc::new(callback))
    }

    /// Subscribes to set notifications on one key only.
    pub fn on_set_key(
        &self,
        key: &E::Key,
        callback: impl Fn(&E) + Send + Sync + 'static,
    ) -> Subscription {
        self.register(Kind::Set, Some(key.clone()), Arc::new(callback))
    }

    /// Subscribes to delete notifications on every key. The callback
    /// receives the removed entity.
    pub fn on_delete(&self, callback: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        self.register(Kind::Delete, None, Arc::new(callback))
    }

    /// Subscribes to delete notifications on one key only.
    pub fn on_delete_key(
        &self,
        key: &E::Key,
        callback: impl Fn(&E) + Send + Sync + 'static,
    ) -> Subscription {
        self.register(Kind::Delete, Some(key.clone()), Arc::new(callback))
    }

    fn register(&self, kind: Kind, key: Option<E::Key>, callback: Callback<E>) -> Subscription {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let registered = Registered {
            id,
            key,
            scope: self.scope.clone(),
            callback,
        };

        {
            let mut listeners = self.inner.listeners.lock().unwrap();
            match kind {
                Kind::Set => listeners.set.push(registered),
                Kind::Delete => listeners.delete.push(registered),
            }
        }

        let inner = Arc::clone(&self.inner);
        Subscription::new(move || {
            let mut listeners = inner.listeners.lock().unwrap();
            match kind {
                Kind::Set => listeners.set.retain(|l| l.id != id),
                Kind::Delete => listeners.delete.retain(|l| l.id != id),
            }
        })
    }

    // ── Internals ────────────────────────────────────────────────

    fn is_unchanged(&self, previous: Option<&E>, value: &E) -> bool {
        match (previous, &self.inner.equal) {
            (Some(prior), Some(equal)) => equal(prior, value),
            _ => false,
        }
    }

    /// Listeners are snapshotted and invoked after the lock is released, so
    /// a callback may safely re-enter the store.
    fn notify_set(&self, changed: &[E]) {
        if changed.is_empty() {
            return;
        }
        let listeners = self.inner.listeners.lock().unwrap().set.clone();
        self.dispatch(&listeners, changed);
    }

    fn notify_delete(&self, removed: &[E]) {
        if removed.is_empty() {
            return;
        }
        let listeners = self.inner.listeners.lock().unwrap().delete.clone();
        self.dispatch(&listeners, removed);
    }

    fn dispatch(&self, listeners: &[Registered<E>], entities: &[E]) {
        for entity in entities {
            let key = entity.key();
            for listener in listeners {
                if listener.scope.is_some() && listener.scope == self.scope {
                    continue;
                }
                if let Some(wanted) = &listener.key {
                    if *wanted != key {
                        continue;
                    }
                }
                (listener.callback)(entity);
            }
        }
    }

    fn inverse_of_set(&self, key: E::Key, previous: Option<E>) -> Rollback {
        let store = self.clone();
        match previous {
            Some(entity) => Rollback::new(move || {
                let _ = store.set(entity);
                Ok(())
            }),
            None => Rollback::new(move || {
                let _ = store.delete(&key);
                Ok(())
            }),
        }
    }
}

impl<E> Default for Store<E>
where
    E: Keyed + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
enum Kind {
    Set,
    Delete,
}
