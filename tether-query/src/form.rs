//! Form-bound retrieval and persistence.
//!
//! A [`Form`] binds an editable value object to an entity: it populates the
//! values from a key (or caller-supplied defaults for a new entity), tracks
//! local edits, validates before persisting through an internal [`Update`],
//! and re-synchronizes when the entity changes remotely. Saving a new entity
//! captures the server-assigned key so subsequent edits target the right
//! identity.

use crate::options::{FetchOptions, UpdateOptions};
use crate::retrieve::FetchCtx;
use crate::update::{Update, UpdateCtx, UpdateOutcome};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tether_store::{Disposers, Store};
use tether_sync::ClientHandle;
use tether_types::{Keyed, QueryState, Result, Variant, Verbs};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

/// An editable value object bound to a form.
pub trait FormValues: Clone + Send + Sync + 'static {
    /// Validates the values before persistence. The default accepts
    /// everything.
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

type ToValuesFn<E, V> = Arc<dyn Fn(&E) -> V + Send + Sync>;
type LoadFn<C, E> =
    Arc<dyn Fn(FetchCtx<C>, <E as Keyed>::Key) -> BoxFuture<'static, Result<E>> + Send + Sync>;

/// Identity, staged values, and liveness, shared with mounted listeners.
struct FormShared<E: Keyed, V> {
    key: Option<E::Key>,
    values: Option<V>,
    dirty: bool,
    /// Set while the internal update pipeline runs. The save body's own
    /// store writes (optimistic, confirmed, or unwound) arrive at the
    /// mounted listeners like any external change would; this flag keeps
    /// them from resetting the staged values mid-save.
    saving: bool,
    live: Disposers,
}

/// An editable, validated view over one entity.
pub struct Form<C, E: Keyed, V> {
    name: &'static str,
    verbs: Verbs,
    client: ClientHandle<C>,
    store: Store<E>,
    to_values: ToValuesFn<E, V>,
    load_fn: LoadFn<C, E>,
    update: Update<C, (Option<E::Key>, V), E>,
    state: watch::Sender<QueryState<V>>,
    shared: Arc<Mutex<FormShared<E, V>>>,
}

impl<C, E: Keyed, V> Clone for Form<C, E, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            verbs: self.verbs,
            client: self.client.clone(),
            store: self.store.clone(),
            to_values: Arc::clone(&self.to_values),
            load_fn: Arc::clone(&self.load_fn),
            update: self.update.clone(),
            state: self.state.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C, E, V> Form<C, E, V>
where
    C: Send + Sync + 'static,
    E: Keyed + Clone + Send + Sync + 'static,
    V: FormValues,
{
    /// Creates a form over `store`. `to_values` projects an entity into the
    /// editable value object; `load_fn` resolves a key through the
    /// transport; `save_fn` is the persistence body, run under the full
    /// optimistic-rollback discipline of [`Update`]. Its input pairs the
    /// bound key (`None` for a new entity) with the staged values.
    pub fn new<TV, LF, LFut, SF, SFut>(
        client: ClientHandle<C>,
        store: &Store<E>,
        to_values: TV,
        load_fn: LF,
        save_fn: SF,
    ) -> Self
    where
        TV: Fn(&E) -> V + Send + Sync + 'static,
        LF: Fn(FetchCtx<C>, E::Key) -> LFut + Send + Sync + 'static,
        LFut: Future<Output = Result<E>> + Send + 'static,
        SF: Fn(UpdateCtx<C, (Option<E::Key>, V)>) -> SFut + Send + Sync + 'static,
        SFut: Future<Output = Result<UpdateOutcome<E>>> + Send + 'static,
    {
        let name = "resource";
        let verbs = Verbs::SAVE;
        let update = Update::new(client.clone(), save_fn)
            .with_name(name)
            .with_verbs(verbs);
        let (state, _) = watch::channel(QueryState::loading(
            Verbs::RETRIEVE.working_message(name),
        ));
        Self {
            name,
            verbs,
            client,
            store: store.scoped(format!("form:{}", Uuid::new_v4())),
            to_values: Arc::new(to_values),
            load_fn: Arc::new(
                move |ctx, key| -> BoxFuture<'static, Result<E>> { Box::pin(load_fn(ctx, key)) },
            ),
            update,
            state,
            shared: Arc::new(Mutex::new(FormShared {
                key: None,
                values: None,
                dirty: false,
                saving: false,
                live: Disposers::new(),
            })),
        }
    }

    /// Names the resource in status messages ("Failed to save task").
    #[must_use]
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self.update = self.update.with_name(name);
        self
    }

    /// Overrides the verb set used in status messages.
    #[must_use]
    pub fn with_verbs(mut self, verbs: Verbs) -> Self {
        self.verbs = verbs;
        self.update = self.update.with_verbs(verbs);
        self
    }

    /// The current observable state.
    #[must_use]
    pub fn state(&self) -> QueryState<V> {
        self.state.borrow().clone()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<QueryState<V>> {
        self.state.subscribe()
    }

    /// The staged values, if any are loaded.
    #[must_use]
    pub fn values(&self) -> Option<V> {
        self.shared.lock().unwrap().values.clone()
    }

    /// The key the form is bound to. `None` until an entity is loaded or
    /// the first save assigns one.
    #[must_use]
    pub fn key(&self) -> Option<E::Key> {
        self.shared.lock().unwrap().key.clone()
    }

    /// Whether the staged values carry local edits not yet persisted.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.shared.lock().unwrap().dirty
    }

    /// Populates the form from an existing entity: cache first, transport
    /// on a miss. The form then tracks the entity — a remote change resets
    /// the values to the latest entity, discarding local edits (callers can
    /// consult [`Form::is_dirty`] before that matters).
    pub async fn load(&self, key: E::Key, options: FetchOptions) {
        self.remount(Some(key.clone()));

        if !options.refresh {
            if let Some(entity) = self.store.get(&key) {
                debug!(name = self.name, "cache hit");
                self.adopt(&entity);
                return;
            }
        }

        let Some(client) = self.client.current() else {
            self.state.send_replace(QueryState::disabled(
                format!("Cannot retrieve {}", self.name),
                "no client connected",
            ));
            return;
        };

        self.state.send_modify(|state| {
            state.variant = Variant::Loading;
            state.message = Verbs::RETRIEVE.working_message(self.name);
            state.description = None;
        });

        let ctx = FetchCtx {
            client,
            signal: options.signal.clone(),
        };
        let result = (self.load_fn)(ctx, key).await;

        if options.signal.is_aborted() {
            debug!(name = self.name, "load aborted; discarding result");
            return;
        }

        match result {
            Ok(entity) => {
                let _ = self.store.set(entity.clone());
                self.adopt(&entity);
            }
            Err(error) => {
                self.state.send_replace(QueryState::error(
                    format!("Failed to retrieve {}", self.name),
                    error.to_string(),
                ));
            }
        }
    }

    /// Stages caller-supplied values for a new entity. The form has no key
    /// yet; the first successful save captures the server-assigned one.
    pub fn load_defaults(&self, values: V) {
        self.remount(None);
        {
            let mut shared = self.shared.lock().unwrap();
            shared.values = Some(values.clone());
            shared.dirty = false;
        }
        self.state.send_replace(QueryState::success(values));
    }

    /// Edits the staged values in place and marks the form dirty.
    pub fn set_values(&self, edit: impl FnOnce(&mut V)) {
        let snapshot = {
            let mut guard = self.shared.lock().unwrap();
            let shared = &mut *guard;
            let Some(values) = shared.values.as_mut() else {
                debug!(name = self.name, "set_values with nothing staged");
                return;
            };
            edit(values);
            shared.dirty = true;
            values.clone()
        };
        self.state.send_modify(|state| {
            state.data = Some(snapshot);
        });
    }

    /// Validates and persists the staged values. Resolves `true` on
    /// success, after capturing the persisted entity's key and refreshing
    /// the staged values from it.
    ///
    /// A validation failure surfaces as an error state without touching the
    /// transport. Everything else follows the [`Update`] pipeline, whose
    /// terminal state is mirrored here on failure.
    pub async fn save(&self, options: UpdateOptions) -> bool {
        if options.signal.is_aborted() {
            return false;
        }

        let Some(values) = self.values() else {
            self.state.send_replace(QueryState::error(
                self.verbs.failure_message(self.name),
                "nothing staged to save",
            ));
            return false;
        };

        if let Err(message) = values.validate() {
            self.state.send_modify(|state| {
                state.variant = Variant::Error;
                state.message = self.verbs.failure_message(self.name);
                state.description = Some(message);
            });
            return false;
        }

        self.state.send_modify(|state| {
            state.variant = Variant::Loading;
            state.message = self.verbs.working_message(self.name);
            state.description = None;
        });

        self.shared.lock().unwrap().saving = true;
        let saved = self
            .update
            .update_async((self.key(), values), options.clone())
            .await;
        self.shared.lock().unwrap().saving = false;

        if options.signal.is_aborted() {
            return false;
        }

        if saved {
            if let Some(entity) = self.update.state().data {
                self.remount(Some(entity.key()));
                self.adopt(&entity);
            }
            return true;
        }

        // Mirror the update's terminal state, keeping the staged values
        // visible.
        let settled = self.update.state();
        self.state.send_modify(|state| {
            state.variant = settled.variant;
            state.message = settled.message;
            state.description = settled.description;
        });
        false
    }

    /// Adopts an entity as the form's identity and content: values are
    /// re-projected, edits discarded.
    fn adopt(&self, entity: &E) {
        let values = (self.to_values)(entity);
        {
            let mut shared = self.shared.lock().unwrap();
            shared.key = Some(entity.key());
            shared.values = Some(values.clone());
            shared.dirty = false;
        }
        self.state.send_replace(QueryState::success(values));
    }

    /// Replaces the live subscriptions with ones scoped to `key`.
    fn remount(&self, key: Option<E::Key>) {
        let mut shared = self.shared.lock().unwrap();
        shared.key = key.clone();
        shared.live.clear();
        let Some(key) = key else {
            return;
        };

        // Remote change: full reset to the latest entity.
        let on_set = {
            let shared = Arc::clone(&self.shared);
            let state = self.state.clone();
            let to_values = Arc::clone(&self.to_values);
            self.store.on_set_key(&key, move |entity| {
                let values = to_values(entity);
                {
                    let mut shared = shared.lock().unwrap();
                    if shared.saving {
                        return;
                    }
                    shared.values = Some(values.clone());
                    shared.dirty = false;
                }
                state.send_replace(QueryState::success(values));
            })
        };
        shared.live.push(on_set);

        // Remote delete: the identity is gone. Staged values survive so the
        // caller can re-save, which creates a fresh entity.
        let on_delete = {
            let shared = Arc::clone(&self.shared);
            self.store.on_delete_key(&key, move |_| {
                let mut shared = shared.lock().unwrap();
                if shared.saving {
                    return;
                }
                shared.key = None;
                shared.dirty = true;
            })
        };
        shared.live.push(on_delete);
    }
}
