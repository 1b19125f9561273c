//! Single-entity retrieval.
//!
//! A [`Retrieve`] resolves one entity by key: cache first, transport on a
//! miss, and thereafter live — key-scoped store subscriptions push external
//! writes (other primitives, the channel bridge) straight into the observable
//! state with no further network traffic.

use crate::options::FetchOptions;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tether_store::{Disposers, Store};
use tether_sync::ClientHandle;
use tether_types::{AbortSignal, Keyed, QueryState, Result, Variant, Verbs};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

/// What a fetch closure gets to work with.
pub struct FetchCtx<C> {
    /// The client connected at the time the fetch started.
    pub client: Arc<C>,
    /// The calling site's cancellation signal.
    pub signal: AbortSignal,
}

impl<C> Clone for FetchCtx<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            signal: self.signal.clone(),
        }
    }
}

type KeyFn<E, Q> = Arc<dyn Fn(&Q) -> <E as Keyed>::Key + Send + Sync>;
type FetchFn<C, E, Q> = Arc<dyn Fn(FetchCtx<C>, Q) -> BoxFuture<'static, Result<E>> + Send + Sync>;

/// Cache-first single-entity query, kept live by store subscriptions.
pub struct Retrieve<C, E: Keyed, Q> {
    name: &'static str,
    verbs: Verbs,
    client: ClientHandle<C>,
    store: Store<E>,
    key_fn: KeyFn<E, Q>,
    fetch_fn: FetchFn<C, E, Q>,
    state: watch::Sender<QueryState<E>>,
    live: Arc<Mutex<Disposers>>,
}

impl<C, E: Keyed, Q> Clone for Retrieve<C, E, Q> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            verbs: self.verbs,
            client: self.client.clone(),
            store: self.store.clone(),
            key_fn: Arc::clone(&self.key_fn),
            fetch_fn: Arc::clone(&self.fetch_fn),
            state: self.state.clone(),
            live: Arc::clone(&self.live),
        }
    }
}

impl<C, E, Q> Retrieve<C, E, Q>
where
    C: Send + Sync + 'static,
    E: Keyed + Clone + Send + Sync + 'static,
    Q: Send + 'static,
{
    /// Creates a retrieve over `store`. `key_fn` derives the cache key from
    /// a query; `fetch_fn` resolves a miss through the transport.
    ///
    /// Writes go through a scope unique to this instance, so the
    /// subscriptions it mounts never re-process its own writes.
    pub fn new<KF, FF, Fut>(
        client: ClientHandle<C>,
        store: &Store<E>,
        key_fn: KF,
        fetch_fn: FF,
    ) -> Self
    where
        KF: Fn(&Q) -> E::Key + Send + Sync + 'static,
        FF: Fn(FetchCtx<C>, Q) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<E>> + Send + 'static,
    {
        let name = "resource";
        let verbs = Verbs::RETRIEVE;
        let (state, _) = watch::channel(QueryState::loading(verbs.working_message(name)));
        Self {
            name,
            verbs,
            client,
            store: store.scoped(format!("retrieve:{}", Uuid::new_v4())),
            key_fn: Arc::new(key_fn),
            fetch_fn: Arc::new(
                move |ctx, query| -> BoxFuture<'static, Result<E>> {
                    Box::pin(fetch_fn(ctx, query))
                },
            ),
            state,
            live: Arc::new(Mutex::new(Disposers::new())),
        }
    }

    /// Names the resource in status messages ("Failed to retrieve task").
    #[must_use]
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Overrides the verb set used in status messages.
    #[must_use]
    pub fn with_verbs(mut self, verbs: Verbs) -> Self {
        self.verbs = verbs;
        self
    }

    /// The current observable state.
    #[must_use]
    pub fn state(&self) -> QueryState<E> {
        self.state.borrow().clone()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<QueryState<E>> {
        self.state.subscribe()
    }

    /// Resolves the query.
    ///
    /// A cache hit serves synchronously with zero network traffic unless
    /// `options.refresh` is set. A miss transitions to loading, calls the
    /// transport, writes the result into the store, and settles on success
    /// or error (transport message preserved verbatim in the description).
    /// With no client connected the state becomes disabled without touching
    /// the transport. Either way the query stays live: later external writes
    /// or deletes of the key update the state directly.
    pub async fn fetch(&self, query: Q, options: FetchOptions) {
        let key = (self.key_fn)(&query);
        self.mount(&key);

        if !options.refresh {
            if let Some(entity) = self.store.get(&key) {
                debug!(name = self.name, "cache hit");
                self.state.send_replace(QueryState::success(entity));
                return;
            }
        }

        let Some(client) = self.client.current() else {
            self.state.send_replace(QueryState::disabled(
                format!("Cannot {} {}", self.verbs.present, self.name),
                "no client connected",
            ));
            return;
        };

        self.state.send_modify(|state| {
            state.variant = Variant::Loading;
            state.message = self.verbs.working_message(self.name);
            state.description = None;
        });

        let ctx = FetchCtx {
            client,
            signal: options.signal.clone(),
        };
        let result = (self.fetch_fn)(ctx, query).await;

        if options.signal.is_aborted() {
            debug!(name = self.name, "fetch aborted; discarding result");
            return;
        }

        match result {
            Ok(entity) => {
                let _ = self.store.set(entity.clone());
                self.state.send_replace(QueryState::success(entity));
            }
            Err(error) => {
                self.state.send_replace(QueryState::error(
                    self.verbs.failure_message(self.name),
                    error.to_string(),
                ));
            }
        }
    }

    /// Replaces the live subscriptions with ones scoped to `key`. A later
    /// external write settles the state on success with the new value; an
    /// external delete settles on success with no data.
    fn mount(&self, key: &E::Key) {
        let mut live = self.live.lock().unwrap();
        live.clear();

        let state = self.state.clone();
        live.push(self.store.on_set_key(key, move |entity| {
            state.send_replace(QueryState::success(entity.clone()));
        }));

        let state = self.state.clone();
        live.push(self.store.on_delete_key(key, move |_| {
            state.send_replace(QueryState::success_opt(None));
        }));
    }
}
