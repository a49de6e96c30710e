//! Gateway port: the boundary to the external home-automation framework.
//!
//! The framework owns every accessory and all transport. homesync only asks
//! it for inventory, one-shot reads and writes, and receives push
//! notifications as [`GatewayEvent`] messages on a channel handed to the
//! adapter when it is constructed.

use std::future::Future;

use homesync_domain::accessory::Accessory;
use homesync_domain::characteristic::{CharacteristicKind, CharacteristicValue};
use homesync_domain::error::GatewayError;
use homesync_domain::home::Home;
use homesync_domain::id::{AccessoryId, HomeId};
use homesync_domain::time::Timestamp;

/// Request/response side of the accessory framework.
///
/// Implementations live in adapter crates (e.g. `homesync-adapter-virtual`). None of
/// the calls are retried by homesync, and their completions carry no
/// ordering guarantee relative to notifications for the same characteristic.
pub trait AccessoryGateway: Send + Sync {
    /// Current home inventory, in whatever order the framework keeps it.
    fn list_homes(&self) -> impl Future<Output = Result<Vec<Home>, GatewayError>> + Send;

    /// Accessories belonging to `home_id`.
    fn accessories_for(
        &self,
        home_id: HomeId,
    ) -> impl Future<Output = Result<Vec<Accessory>, GatewayError>> + Send;

    /// Ask the framework to push [`GatewayEvent::ValueChanged`] for this
    /// characteristic from now on.
    fn subscribe(
        &self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// One-shot read of the current value.
    fn read_once(
        &self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
    ) -> impl Future<Output = Result<CharacteristicValue, GatewayError>> + Send;

    /// Write a characteristic. Resolves once the accessory acknowledged it.
    fn write(
        &self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        value: CharacteristicValue,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

impl<T: AccessoryGateway> AccessoryGateway for std::sync::Arc<T> {
    fn list_homes(&self) -> impl Future<Output = Result<Vec<Home>, GatewayError>> + Send {
        (**self).list_homes()
    }

    fn accessories_for(
        &self,
        home_id: HomeId,
    ) -> impl Future<Output = Result<Vec<Accessory>, GatewayError>> + Send {
        (**self).accessories_for(home_id)
    }

    fn subscribe(
        &self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).subscribe(accessory_id, kind)
    }

    fn read_once(
        &self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
    ) -> impl Future<Output = Result<CharacteristicValue, GatewayError>> + Send {
        (**self).read_once(accessory_id, kind)
    }

    fn write(
        &self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        value: CharacteristicValue,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).write(accessory_id, kind, value)
    }
}

/// Push notifications from the framework.
///
/// They may be produced on any thread; the sync service consumes them from a
/// single channel so that only one task ever mutates the state store.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// The home inventory changed.
    HomesUpdated(Vec<Home>),
    /// The accessory list of one home changed.
    AccessoriesUpdated {
        home_id: HomeId,
        accessories: Vec<Accessory>,
    },
    /// A subscribed characteristic reported a new value.
    ValueChanged {
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        value: CharacteristicValue,
        timestamp: Timestamp,
    },
}
