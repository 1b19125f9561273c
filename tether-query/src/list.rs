//! Collection retrieval with live membership.
//!
//! A [`List`] resolves a filtered collection and then keeps it alive:
//! membership is a derived, continuously re-evaluated view over the store,
//! not a snapshot. An entity that starts matching the active query is
//! admitted, one that stops matching is evicted, and a deleted one
//! disappears, all without another fetch.

use crate::options::FetchOptions;
use crate::retrieve::FetchCtx;
use futures::future::BoxFuture;
use std::cmp::Ordering;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tether_store::{Disposers, Store};
use tether_sync::ClientHandle;
use tether_types::{AbortSignal, Keyed, QueryState, Result, Variant, Verbs};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// How a query is to be answered, decided per resource kind by a pure
/// function over the query.
pub enum CachePlan<E> {
    /// The query is fully expressible as a local predicate: serve it by
    /// scanning the store, and keep membership live through it.
    Cached(Predicate<E>),
    /// The query cannot be evaluated locally (free-text search, server-side
    /// ranking); the transport must be hit. Live updates then apply only to
    /// keys already in the result set.
    Network,
}

impl<E> CachePlan<E> {
    /// Convenience constructor for the cached variant.
    pub fn cached(predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        Self::Cached(Arc::new(predicate))
    }
}

impl<E> Clone for CachePlan<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Cached(predicate) => Self::Cached(Arc::clone(predicate)),
            Self::Network => Self::Network,
        }
    }
}

type PlanFn<E, Q> = Arc<dyn Fn(&Q) -> CachePlan<E> + Send + Sync>;
type FetchFn<C, E, Q> =
    Arc<dyn Fn(FetchCtx<C>, Q) -> BoxFuture<'static, Result<Vec<E>>> + Send + Sync>;
type ItemFn<C, E> = Arc<
    dyn Fn(FetchCtx<C>, <E as Keyed>::Key) -> BoxFuture<'static, Result<E>> + Send + Sync,
>;
type SortFn<E> = Arc<dyn Fn(&E, &E) -> Ordering + Send + Sync>;

/// Membership and liveness, shared with the mounted listeners.
struct ListShared<E: Keyed> {
    order: Vec<E::Key>,
    predicate: Option<Predicate<E>>,
    has_more: bool,
    live: Disposers,
}

/// Cache-first collection query with live, predicate-driven membership.
pub struct List<C, E: Keyed, Q> {
    name: &'static str,
    verbs: Verbs,
    client: ClientHandle<C>,
    store: Store<E>,
    plan_fn: PlanFn<E, Q>,
    fetch_fn: FetchFn<C, E, Q>,
    item_fn: Option<ItemFn<C, E>>,
    sort_fn: Option<SortFn<E>>,
    page_size: Option<usize>,
    state: watch::Sender<QueryState<Vec<E>>>,
    shared: Arc<Mutex<ListShared<E>>>,
}

impl<C, E: Keyed, Q> Clone for List<C, E, Q> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            verbs: self.verbs,
            client: self.client.clone(),
            store: self.store.clone(),
            plan_fn: Arc::clone(&self.plan_fn),
            fetch_fn: Arc::clone(&self.fetch_fn),
            item_fn: self.item_fn.clone(),
            sort_fn: self.sort_fn.clone(),
            page_size: self.page_size,
            state: self.state.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C, E, Q> List<C, E, Q>
where
    C: Send + Sync + 'static,
    E: Keyed + Clone + Send + Sync + 'static,
    Q: Send + 'static,
{
    /// Creates a list over `store`. `plan_fn` decides cache versus network
    /// for a given query; `fetch_fn` resolves the query through the
    /// transport.
    pub fn new<PF, FF, Fut>(
        client: ClientHandle<C>,
        store: &Store<E>,
        plan_fn: PF,
        fetch_fn: FF,
    ) -> Self
    where
        PF: Fn(&Q) -> CachePlan<E> + Send + Sync + 'static,
        FF: Fn(FetchCtx<C>, Q) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<E>>> + Send + 'static,
    {
        let name = "resources";
        let verbs = Verbs::RETRIEVE;
        let (state, _) = watch::channel(QueryState::loading(verbs.working_message(name)));
        Self {
            name,
            verbs,
            client,
            store: store.scoped(format!("list:{}", Uuid::new_v4())),
            plan_fn: Arc::new(plan_fn),
            fetch_fn: Arc::new(
                move |ctx, query| -> BoxFuture<'static, Result<Vec<E>>> {
                    Box::pin(fetch_fn(ctx, query))
                },
            ),
            item_fn: None,
            sort_fn: None,
            page_size: None,
            state,
            shared: Arc::new(Mutex::new(ListShared {
                order: Vec::new(),
                predicate: None,
                has_more: false,
                live: Disposers::new(),
            })),
        }
    }

    /// Names the resource in status messages.
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

    /// Installs a comparator applied to the emitted data on every change.
    #[must_use]
    pub fn with_sort(mut self, sort: impl Fn(&E, &E) -> Ordering + Send + Sync + 'static) -> Self {
        self.sort_fn = Some(Arc::new(sort));
        self
    }

    /// Declares the transport's page size so `has_more` can be derived from
    /// a full page.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Installs a single-item resolver used by [`List::get_item`] to fetch
    /// unknown keys in the background.
    #[must_use]
    pub fn with_item_fetch<F, Fut>(mut self, item_fn: F) -> Self
    where
        F: Fn(FetchCtx<C>, E::Key) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<E>> + Send + 'static,
    {
        self.item_fn = Some(Arc::new(
            move |ctx, key| -> BoxFuture<'static, Result<E>> { Box::pin(item_fn(ctx, key)) },
        ));
        self
    }

    /// The current observable state.
    #[must_use]
    pub fn state(&self) -> QueryState<Vec<E>> {
        self.state.borrow().clone()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<QueryState<Vec<E>>> {
        self.state.subscribe()
    }

    /// Whether the transport reported a full page on the latest fetch,
    /// suggesting another page exists.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.shared.lock().unwrap().has_more
    }

    /// Resolves the query, replacing the current result set.
    ///
    /// Under a cached plan with a non-empty scan, the result is served
    /// synchronously from the store with zero network traffic (unless
    /// `options.refresh` is set). Otherwise the transport is called and its
    /// results installed. Either way membership stays live afterwards.
    pub async fn fetch(&self, query: Q, options: FetchOptions) {
        let plan = (self.plan_fn)(&query);
        self.mount(&plan);

        if !options.refresh {
            if let CachePlan::Cached(predicate) = &plan {
                let matches = self.store.get_where(|entity| predicate(entity));
                if !matches.is_empty() {
                    debug!(name = self.name, hits = matches.len(), "cache scan hit");
                    self.install(matches, false, false);
                    return;
                }
            }
        }

        self.fetch_page(query, options, false).await;
    }

    /// Fetches a further page through the transport and appends it,
    /// deduplicated by key. Pagination lives inside the query itself; pass
    /// the query advanced to the next window.
    pub async fn fetch_more(&self, query: Q, options: FetchOptions) {
        let plan = (self.plan_fn)(&query);
        self.mount(&plan);
        self.fetch_page(query, options, true).await;
    }

    async fn fetch_page(&self, query: Q, options: FetchOptions, append: bool) {
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
            Ok(fetched) => {
                let has_more = self
                    .page_size
                    .is_some_and(|page_size| fetched.len() >= page_size);
                let _ = self.store.set_many(fetched.clone());
                self.install(fetched, append, has_more);
            }
            Err(error) => {
                self.state.send_replace(QueryState::error(
                    self.verbs.failure_message(self.name),
                    error.to_string(),
                ));
            }
        }
    }

    /// The entity at `key` if the store holds it. Otherwise, when an item
    /// resolver is configured and a client is connected, a background fetch
    /// is started; the entity joins the result set on arrival if it matches
    /// the active predicate.
    pub fn get_item(&self, key: &E::Key) -> Option<E> {
        if let Some(entity) = self.store.get(key) {
            return Some(entity);
        }
        if let (Some(item_fn), Some(client)) = (&self.item_fn, self.client.current()) {
            let item_fn = Arc::clone(item_fn);
            // Written without a scope so the arrival is treated like any
            // other external write and flows through the admission listener.
            let store = self.store.unscoped();
            let key = key.clone();
            let name = self.name;
            tokio::spawn(async move {
                let ctx = FetchCtx {
                    client,
                    signal: AbortSignal::new(),
                };
                match item_fn(ctx, key).await {
                    Ok(entity) => {
                        let _ = store.set(entity);
                    }
                    Err(error) => debug!(name, "background item fetch failed: {error}"),
                }
            });
        }
        None
    }

    /// Installs fetched results as the membership, then emits.
    fn install(&self, fetched: Vec<E>, append: bool, has_more: bool) {
        let mut shared = self.shared.lock().unwrap();
        if !append {
            shared.order.clear();
        }
        for entity in &fetched {
            let key = entity.key();
            if !shared.order.contains(&key) {
                shared.order.push(key);
            }
        }
        shared.has_more = has_more;
        Self::emit(&self.store, self.sort_fn.as_ref(), &self.state, &shared);
    }

    /// Replaces the live subscriptions, re-deriving membership from every
    /// subsequent store write or delete.
    fn mount(&self, plan: &CachePlan<E>) {
        let mut shared = self.shared.lock().unwrap();
        shared.predicate = match plan {
            CachePlan::Cached(predicate) => Some(Arc::clone(predicate)),
            CachePlan::Network => None,
        };
        shared.live.clear();

        let on_set = {
            let store = self.store.clone();
            let state = self.state.clone();
            let sort = self.sort_fn.clone();
            let shared = Arc::clone(&self.shared);
            self.store.on_set(move |entity| {
                let mut shared = shared.lock().unwrap();
                let key = entity.key();
                let present = shared.order.contains(&key);
                let matches = match &shared.predicate {
                    Some(predicate) => predicate(entity),
                    // No local predicate: only known members update.
                    None => present,
                };
                if matches && !present {
                    shared.order.push(key);
                } else if !matches && present {
                    shared.order.retain(|k| *k != key);
                } else if !matches {
                    return;
                }
                Self::emit(&store, sort.as_ref(), &state, &shared);
            })
        };
        shared.live.push(on_set);

        let on_delete = {
            let store = self.store.clone();
            let state = self.state.clone();
            let sort = self.sort_fn.clone();
            let shared = Arc::clone(&self.shared);
            self.store.on_delete(move |entity| {
                let mut shared = shared.lock().unwrap();
                let key = entity.key();
                if !shared.order.contains(&key) {
                    return;
                }
                shared.order.retain(|k| *k != key);
                Self::emit(&store, sort.as_ref(), &state, &shared);
            })
        };
        shared.live.push(on_delete);
    }

    /// Reads the membership out of the store and publishes it.
    fn emit(
        store: &Store<E>,
        sort: Option<&SortFn<E>>,
        state: &watch::Sender<QueryState<Vec<E>>>,
        shared: &ListShared<E>,
    ) {
        let mut items = store.get_many(&shared.order);
        if let Some(sort) = sort {
            items.sort_by(|a, b| sort(a, b));
        }
        state.send_replace(QueryState::success(items));
    }
}
