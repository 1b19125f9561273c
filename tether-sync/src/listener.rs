//! Channel listeners.
//!
//! A listener binds a channel name to an async handler that turns pushed
//! payloads into store writes. Decoding happens before the handler runs, so
//! a handler only ever sees well-formed payloads; malformed ones surface as
//! [`SyncError::Decode`] and are dropped by the bridge.

use crate::error::{SyncError, SyncResult};
use futures::future::{self, BoxFuture};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// What a handler gets to work with: the client the frame arrived over and
/// the application's store bundle.
pub struct ListenerCtx<C, S> {
    /// The connected client at the time the frame arrived.
    pub client: Arc<C>,
    /// The stores the handler writes into.
    pub store: Arc<S>,
}

impl<C, S> Clone for ListenerCtx<C, S> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            store: Arc::clone(&self.store),
        }
    }
}

type Handler<C, S> =
    Arc<dyn Fn(ListenerCtx<C, S>, Value) -> BoxFuture<'static, SyncResult<()>> + Send + Sync>;

/// One channel subscription: a channel name plus the handler run for every
/// payload pushed on it.
pub struct ChannelListener<C, S> {
    channel: String,
    handler: Handler<C, S>,
}

impl<C, S> Clone for ChannelListener<C, S> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<C, S> ChannelListener<C, S>
where
    C: Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    /// Creates a listener whose handler receives payloads decoded to `P`.
    pub fn new<P, F, Fut>(channel: impl Into<String>, handler: F) -> Self
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(ListenerCtx<C, S>, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SyncResult<()>> + Send + 'static,
    {
        Self {
            channel: channel.into(),
            handler: Arc::new(
                move |ctx, payload| -> BoxFuture<'static, SyncResult<()>> {
                    match serde_json::from_value::<P>(payload) {
                        Ok(decoded) => Box::pin(handler(ctx, decoded)),
                        Err(error) => Box::pin(future::ready(Err(SyncError::Decode(error)))),
                    }
                },
            ),
        }
    }

    /// Creates a listener whose handler receives the raw JSON payload.
    pub fn raw<F, Fut>(channel: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ListenerCtx<C, S>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SyncResult<()>> + Send + 'static,
    {
        Self {
            channel: channel.into(),
            handler: Arc::new(
                move |ctx, payload| -> BoxFuture<'static, SyncResult<()>> {
                    Box::pin(handler(ctx, payload))
                },
            ),
        }
    }

    /// The channel this listener subscribes to.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Runs the handler for one payload.
    pub fn handle(&self, ctx: ListenerCtx<C, S>, payload: Value) -> BoxFuture<'static, SyncResult<()>> {
        (self.handler)(ctx, payload)
    }
}
