//! Generic mutation with optimistic rollback.
//!
//! An [`Update`] runs application-supplied mutation bodies under a fixed
//! discipline: optimistic store writes are paired with the inverse actions
//! the store hands back, accumulated on a [`RollbackStack`]; a failure
//! unwinds them newest-first before the caller ever observes the error, so
//! no caller has to revert optimistic state by hand.

use crate::options::UpdateOptions;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tether_store::RollbackStack;
use tether_sync::ClientHandle;
use tether_types::{AbortSignal, QueryState, Result, Variant, Verbs};
use tokio::sync::watch;
use tracing::{debug, warn};

/// What a mutation body gets to work with.
pub struct UpdateCtx<C, D> {
    /// The connected client, or `None` when the primitive allows
    /// disconnected runs and no client exists.
    pub client: Option<Arc<C>>,
    /// The mutation input, possibly transformed by the before-hook.
    pub data: D,
    /// Push the inverse action of every optimistic store write here, in the
    /// order the writes are made.
    pub rollbacks: RollbackStack,
    /// The calling site's cancellation signal.
    pub signal: AbortSignal,
}

/// What a before-hook gets to work with. Identical to [`UpdateCtx`]; the
/// hook runs before the body and may stage its own optimistic writes.
pub type BeforeCtx<C, D> = UpdateCtx<C, D>;

/// A mutation body's verdict.
pub enum UpdateOutcome<R> {
    /// The mutation persisted; carries the confirmed value.
    Done(R),
    /// The body took care of everything itself — no rollbacks are run, no
    /// state transition is made, and the call reports failure to
    /// distinguish it from a persisted outcome.
    Handled,
}

/// A before-hook's verdict.
pub enum BeforeOutcome<D> {
    /// Proceed into the body with this (possibly transformed) input.
    Continue(D),
    /// Do not run the body. Rollbacks the hook pushed are unwound and the
    /// call reports failure.
    Veto,
}

type BodyFn<C, D, R> =
    Arc<dyn Fn(UpdateCtx<C, D>) -> BoxFuture<'static, Result<UpdateOutcome<R>>> + Send + Sync>;
type BeforeFn<C, D> =
    Arc<dyn Fn(BeforeCtx<C, D>) -> BoxFuture<'static, Result<BeforeOutcome<D>>> + Send + Sync>;

/// Mutation executor with optimistic-write/rollback discipline.
pub struct Update<C, D, R> {
    name: &'static str,
    verbs: Verbs,
    client: ClientHandle<C>,
    allow_disconnected: bool,
    before: Option<BeforeFn<C, D>>,
    body: BodyFn<C, D, R>,
    state: watch::Sender<QueryState<R>>,
}

impl<C, D, R> Clone for Update<C, D, R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            verbs: self.verbs,
            client: self.client.clone(),
            allow_disconnected: self.allow_disconnected,
            before: self.before.clone(),
            body: Arc::clone(&self.body),
            state: self.state.clone(),
        }
    }
}

impl<C, D, R> Update<C, D, R>
where
    C: Send + Sync + 'static,
    D: Send + 'static,
    R: Clone + Send + Sync + 'static,
{
    /// Creates a mutation primitive around `body`. The body stages its
    /// optimistic writes on the context's rollback stack, then calls the
    /// transport and returns the persisted value.
    pub fn new<F, Fut>(client: ClientHandle<C>, body: F) -> Self
    where
        F: Fn(UpdateCtx<C, D>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<UpdateOutcome<R>>> + Send + 'static,
    {
        let (state, _) = watch::channel(QueryState::success_opt(None));
        Self {
            name: "resource",
            verbs: Verbs::UPDATE,
            client,
            allow_disconnected: false,
            before: None,
            body: Arc::new(
                move |ctx| -> BoxFuture<'static, Result<UpdateOutcome<R>>> {
                    Box::pin(body(ctx))
                },
            ),
            state,
        }
    }

    /// Names the resource in status messages ("Failed to update task").
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

    /// Installs a hook that runs before the body. It may transform the
    /// input, stage rollbacks, or veto the mutation entirely.
    #[must_use]
    pub fn with_before<F, Fut>(mut self, before: F) -> Self
    where
        F: Fn(BeforeCtx<C, D>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<BeforeOutcome<D>>> + Send + 'static,
    {
        self.before = Some(Arc::new(
            move |ctx| -> BoxFuture<'static, Result<BeforeOutcome<D>>> {
                Box::pin(before(ctx))
            },
        ));
        self
    }

    /// Lets the pipeline run without a connected client; the body receives
    /// `None` for the client and decides what still makes sense.
    #[must_use]
    pub fn allow_disconnected(mut self) -> Self {
        self.allow_disconnected = true;
        self
    }

    /// The current observable state.
    #[must_use]
    pub fn state(&self) -> QueryState<R> {
        self.state.borrow().clone()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<QueryState<R>> {
        self.state.subscribe()
    }

    /// Fire-and-forget [`Update::update_async`].
    pub fn update(&self, data: D, options: UpdateOptions) {
        let this = self.clone();
        tokio::spawn(async move {
            this.update_async(data, options).await;
        });
    }

    /// Runs the mutation pipeline. Resolves `true` on persisted success and
    /// `false` on everything else: disabled, veto, body error, "handled",
    /// or abort.
    ///
    /// Once the signal aborts, every further side effect is suppressed — no
    /// rollback execution, no state transition — as if the call never
    /// happened. Side effects already committed stand.
    pub async fn update_async(&self, data: D, options: UpdateOptions) -> bool {
        let signal = options.signal;
        if signal.is_aborted() {
            return false;
        }
        let client = self.client.current();

        // 1. Disabled short-circuit: the body is never called.
        if client.is_none() && !self.allow_disconnected {
            self.state.send_replace(QueryState::disabled(
                format!("Cannot {} {}", self.verbs.present, self.name),
                "no client connected",
            ));
            return false;
        }

        // 2. In flight, previous data preserved.
        self.state.send_modify(|state| {
            state.variant = Variant::Loading;
            state.message = self.verbs.working_message(self.name);
            state.description = None;
        });

        let rollbacks = RollbackStack::new();

        // 3. Before-hook: transform, stage, or veto.
        let data = match &self.before {
            None => data,
            Some(before) => {
                let ctx = UpdateCtx {
                    client: client.clone(),
                    data,
                    rollbacks: rollbacks.clone(),
                    signal: signal.clone(),
                };
                match before(ctx).await {
                    Ok(BeforeOutcome::Continue(data)) => data,
                    Ok(BeforeOutcome::Veto) => {
                        if signal.is_aborted() {
                            return false;
                        }
                        let undone = rollbacks.unwind();
                        debug!(
                            name = self.name,
                            undone, "mutation vetoed before the body ran"
                        );
                        self.state.send_replace(QueryState::error(
                            self.verbs.failure_message(self.name),
                            format!("cancelled before {}", self.verbs.present),
                        ));
                        return false;
                    }
                    Err(error) => {
                        if signal.is_aborted() {
                            return false;
                        }
                        rollbacks.unwind();
                        self.state.send_replace(QueryState::error(
                            self.verbs.failure_message(self.name),
                            error.to_string(),
                        ));
                        return false;
                    }
                }
            }
        };

        if signal.is_aborted() {
            return false;
        }

        // 4. The body: optimistic writes, then the transport.
        let ctx = UpdateCtx {
            client,
            data,
            rollbacks: rollbacks.clone(),
            signal: signal.clone(),
        };
        let result = (self.body)(ctx).await;

        // 5. Abort wins over every outcome.
        if signal.is_aborted() {
            debug!(name = self.name, "mutation aborted; suppressing outcome");
            return false;
        }

        match result {
            // Success: rollbacks are discarded untouched.
            Ok(UpdateOutcome::Done(value)) => {
                rollbacks.clear();
                self.state.send_replace(QueryState::success(value));
                true
            }
            // The body reached a consistent state on its own; leave the
            // store and the observable state exactly as the body left them.
            Ok(UpdateOutcome::Handled) => {
                rollbacks.clear();
                debug!(name = self.name, "mutation handled by the body");
                false
            }
            // Failure: unwind newest-first, then report.
            Err(error) => {
                let undone = rollbacks.unwind();
                warn!(
                    name = self.name,
                    undone, "mutation failed, optimistic writes rolled back: {error}"
                );
                self.state.send_replace(QueryState::error(
                    self.verbs.failure_message(self.name),
                    error.to_string(),
                ));
                false
            }
        }
    }
}
