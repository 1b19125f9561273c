//! Push transport abstraction.
//!
//! Defines the traits a client must implement for the bridge to receive
//! server pushes, allowing the bridge to work with any backend (websocket,
//! gRPC stream, long poll).

use crate::error::SyncResult;
use crate::frame::Frame;
use async_trait::async_trait;

/// A client that can open a server-push stream over a set of channels.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Opens a stream delivering every frame the server pushes on any of
    /// `channels`. Delivery starts from the moment the stream opens; frames
    /// pushed while no stream was open are gone.
    async fn open(&self, channels: &[String]) -> SyncResult<Box<dyn PushStream>>;
}

/// One open push stream.
#[async_trait]
pub trait PushStream: Send {
    /// The next pushed frame. `None` means the server closed the stream
    /// cleanly; an `Err` item means it broke. Either way the stream is done
    /// and must be reopened.
    async fn next(&mut self) -> Option<SyncResult<Frame>>;
}

/// A mock push transport for testing.
pub mod mock {
    use super::*;
    use crate::error::SyncError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// A transport whose streams are fed by the test.
    ///
    /// Every open stream receives every injected frame. Closing the streams
    /// simulates the server dropping the connection.
    #[derive(Default)]
    pub struct MockPush {
        streams: Mutex<Vec<mpsc::UnboundedSender<SyncResult<Frame>>>>,
        last_channels: Mutex<Vec<String>>,
        attempts: AtomicUsize,
        opened: AtomicUsize,
        fail_next_open: AtomicBool,
    }

    impl MockPush {
        /// Creates a transport with no open streams.
        pub fn new() -> Self {
            Self::default()
        }

        /// Delivers `frame` to every open stream.
        pub fn inject(&self, frame: Frame) {
            let mut streams = self.streams.lock().unwrap();
            streams.retain(|tx| tx.send(Ok(frame.clone())).is_ok());
        }

        /// Delivers a transport error to every open stream.
        pub fn inject_error(&self, message: impl Into<String>) {
            let message = message.into();
            let mut streams = self.streams.lock().unwrap();
            streams.retain(|tx| tx.send(Err(SyncError::Transport(message.clone()))).is_ok());
        }

        /// Ends every open stream cleanly, as a server disconnect would.
        pub fn close_streams(&self) {
            self.streams.lock().unwrap().clear();
        }

        /// Makes the next `open` call fail once.
        pub fn fail_next_open(&self) {
            self.fail_next_open.store(true, Ordering::SeqCst);
        }

        /// How many `open` calls have been made, failures included.
        pub fn attempt_count(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        /// How many streams have been opened over the transport's lifetime.
        pub fn open_count(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }

        /// How many streams are currently open.
        pub fn live_count(&self) -> usize {
            self.streams.lock().unwrap().len()
        }

        /// The channel set requested by the most recent `open` call.
        pub fn last_channels(&self) -> Vec<String> {
            self.last_channels.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PushTransport for MockPush {
        async fn open(&self, channels: &[String]) -> SyncResult<Box<dyn PushStream>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_next_open.swap(false, Ordering::SeqCst) {
                return Err(SyncError::Transport("mock open failure".into()));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            self.streams.lock().unwrap().push(tx);
            *self.last_channels.lock().unwrap() = channels.to_vec();
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockStream { rx }))
        }
    }

    struct MockStream {
        rx: mpsc::UnboundedReceiver<SyncResult<Frame>>,
    }

    #[async_trait]
    impl PushStream for MockStream {
        async fn next(&mut self) -> Option<SyncResult<Frame>> {
            self.rx.recv().await
        }
    }
}
