//! In-process event bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::broadcast;

use homesync_domain::error::HomesyncError;
use homesync_domain::event::StoreEvent;

use crate::ports::EventPublisher;

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Cloning yields another handle to the same channel, so the composition
/// root can keep one for subscribing after moving another into the sync
/// service. Publishing succeeds even when nobody listens.
#[derive(Clone)]
pub struct InProcessEventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events published *after* this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: StoreEvent) -> impl Future<Output = Result<(), HomesyncError>> + Send {
        // Fails only when there are no receivers.
        let _ = self.sender.send(event);
        async { Ok(()) }
    }
}
