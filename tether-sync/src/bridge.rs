//! The channel bridge.
//!
//! Owns the background task that keeps a push stream open whenever a client
//! is connected, and fans incoming frames out to the registered channel
//! listeners. On disconnect it waits for the next client and resubscribes;
//! frames pushed while no stream was open are not replayed.

use crate::client::ClientHandle;
use crate::frame::Frame;
use crate::listener::{ChannelListener, ListenerCtx};
use crate::transport::PushTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Retry behavior for stream opens.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Delay before the first retry after a failed open.
    pub retry_initial: Duration,
    /// Cap on the exponential retry delay.
    pub retry_max: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            retry_initial: Duration::from_millis(500),
            retry_max: Duration::from_secs(15),
        }
    }
}

/// Routes pushed frames to channel listeners for as long as it runs.
pub struct ChannelBridge<C, S> {
    client: ClientHandle<C>,
    store: Arc<S>,
    listeners: Vec<ChannelListener<C, S>>,
    config: BridgeConfig,
}

impl<C, S> ChannelBridge<C, S>
where
    C: PushTransport + Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    /// Creates a bridge with no listeners registered.
    #[must_use]
    pub fn new(client: ClientHandle<C>, store: Arc<S>) -> Self {
        Self {
            client,
            store,
            listeners: Vec::new(),
            config: BridgeConfig::default(),
        }
    }

    /// Registers a channel listener.
    #[must_use]
    pub fn with_listener(mut self, listener: ChannelListener<C, S>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Overrides the retry configuration.
    #[must_use]
    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// The channels the bridge will subscribe to, in registration order.
    #[must_use]
    pub fn channels(&self) -> Vec<String> {
        let mut channels = Vec::new();
        for listener in &self.listeners {
            let name = listener.channel().to_string();
            if !channels.contains(&name) {
                channels.push(name);
            }
        }
        channels
    }

    /// Starts the background task. The bridge keeps running across
    /// disconnects until the returned handle shuts it down.
    #[must_use]
    pub fn spawn(self) -> BridgeHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(self, shutdown_rx));
        BridgeHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    /// Fans one frame out to every listener registered for its channels.
    /// A failing payload is logged and skipped; the rest still run.
    async fn dispatch(&self, client: &Arc<C>, frame: Frame) {
        for listener in &self.listeners {
            for payload in frame.get(listener.channel()) {
                let ctx = ListenerCtx {
                    client: Arc::clone(client),
                    store: Arc::clone(&self.store),
                };
                if let Err(error) = listener.handle(ctx, payload.clone()).await {
                    warn!(
                        channel = listener.channel(),
                        "dropping payload: {error}"
                    );
                }
            }
        }
    }
}

/// Shuts the bridge down when asked, or when dropped.
pub struct BridgeHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl BridgeHandle {
    /// Signals the bridge to stop and waits for its task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }

    /// Whether the bridge task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn run_loop<C, S>(bridge: ChannelBridge<C, S>, mut shutdown: watch::Receiver<bool>)
where
    C: PushTransport + Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    let channels = bridge.channels();
    if channels.is_empty() {
        debug!("no channel listeners registered; bridge idle");
        let _ = shutdown.wait_for(|stop| *stop).await;
        return;
    }

    let mut clients = bridge.client.watch();
    let mut backoff = bridge.config.retry_initial;

    loop {
        // Wait for a connected client.
        let client = loop {
            if *shutdown.borrow() {
                return;
            }
            if let Some(client) = clients.borrow_and_update().clone() {
                break client;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
                changed = clients.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        };

        // Open the stream, backing off on failure.
        let mut stream = match client.open(&channels).await {
            Ok(stream) => {
                backoff = bridge.config.retry_initial;
                info!(channels = channels.len(), "push stream open");
                stream
            }
            Err(error) => {
                warn!("failed to open push stream: {error}; retrying in {backoff:?}");
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            return;
                        }
                    }
                    () = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(bridge.config.retry_max);
                continue;
            }
        };

        // Pump frames until the stream ends, the connection slot changes,
        // or we are told to stop.
        let stream_ended = loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
                changed = clients.changed() => {
                    // Disconnect or client swap; reopen against whatever
                    // the slot holds now.
                    if changed.is_err() {
                        return;
                    }
                    debug!("connection changed; reopening push stream");
                    break false;
                }
                item = stream.next() => {
                    match item {
                        Some(Ok(frame)) => bridge.dispatch(&client, frame).await,
                        Some(Err(error)) => {
                            warn!("push stream error: {error}");
                            break true;
                        }
                        None => {
                            debug!("push stream closed by server");
                            break true;
                        }
                    }
                }
            }
        };

        // A stream that died under a live client gets a short pause before
        // the reopen, so a flapping server cannot drive a tight loop.
        if stream_ended {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
                () = tokio::time::sleep(bridge.config.retry_initial) => {}
            }
        }
    }
}
