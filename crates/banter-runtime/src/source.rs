//! The transport seam.
//!
//! The transport layer decodes wire frames into typed [`Event`]s and hands
//! them to the runtime through [`EventSource`], in per-room delivery order.
//! Connection management, reconnects, and de-duplication all live behind
//! this trait.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use banter_core::Event;

/// Produces the stream of decoded events the runtime consumes.
#[async_trait]
pub trait EventSource: Send {
    /// Returns the next event, or `None` once the transport has shut down.
    async fn next_event(&mut self) -> Option<Arc<Event>>;
}

/// An [`EventSource`] fed through a tokio mpsc channel.
///
/// Useful for transports that run on their own tasks, and for tests.
pub struct ChannelEventSource {
    receiver: mpsc::Receiver<Arc<Event>>,
}

impl ChannelEventSource {
    /// Creates a bounded channel source, returning the sending half for
    /// the transport.
    pub fn new(capacity: usize) -> (mpsc::Sender<Arc<Event>>, ChannelEventSource) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, ChannelEventSource { receiver })
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn next_event(&mut self) -> Option<Arc<Event>> {
        self.receiver.recv().await
    }
}
