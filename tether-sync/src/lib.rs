//! Server push plumbing for Tether.
//!
//! Connects a push-capable client to the application's stores: the
//! [`ChannelBridge`] keeps a stream open over the channels its listeners
//! subscribe to, decodes each pushed payload, and hands it to the listener's
//! handler to apply as store writes.
//!
//! # Architecture
//!
//! - **Client handle**: a cloneable slot holding the connected client, which
//!   query primitives and the bridge both watch for connect and disconnect.
//! - **Frame**: one batch of pushed payloads, grouped by channel name.
//! - **Transport**: the trait pair a client implements to expose a push
//!   stream, with a mock implementation for tests.
//! - **Listener**: a channel name bound to a typed async handler.
//! - **Bridge**: the background task that opens streams, resubscribes after
//!   reconnects, and fans frames out to listeners.
//!
//! Delivery over a channel is in push order. A payload that fails to decode
//! or whose handler errors is logged and dropped; it never stops the stream
//! or the rest of the frame. Pushes that arrive while no client is connected
//! are not replayed.
//!
//! # Example
//!
//! ```
//! use serde::Deserialize;
//! use std::sync::Arc;
//! use tether_sync::{ChannelBridge, ChannelListener, ClientHandle};
//! use tether_sync::transport::mock::MockPush;
//!
//! #[derive(Deserialize)]
//! struct TaskChange {
//!     key: String,
//! }
//!
//! struct Stores;
//!
//! let client: ClientHandle<MockPush> = ClientHandle::new();
//! let bridge = ChannelBridge::new(client, Arc::new(Stores))
//!     .with_listener(ChannelListener::new("task_changes", |_ctx, _change: TaskChange| async {
//!         Ok(())
//!     }));
//! assert_eq!(bridge.channels(), ["task_changes"]);
//! ```

mod bridge;
mod client;
mod error;
mod frame;
mod listener;
pub mod transport;

pub use bridge::{BridgeConfig, BridgeHandle, ChannelBridge};
pub use client::ClientHandle;
pub use error::{SyncError, SyncResult};
pub use frame::Frame;
pub use listener::{ChannelListener, ListenerCtx};
pub use transport::{PushStream, PushTransport};
