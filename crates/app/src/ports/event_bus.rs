//! Event bus port: publish/subscribe for store change events.

use std::future::Future;

use homesync_domain::error::HomesyncError;
use homesync_domain::event::StoreEvent;

/// Publishes store change events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: StoreEvent) -> impl Future<Output = Result<(), HomesyncError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: StoreEvent) -> impl Future<Output = Result<(), HomesyncError>> + Send {
        (**self).publish(event)
    }
}
