//! Error types shared across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`HomesyncError`] via `#[from]`.

use crate::accessory::ServiceKind;
use crate::characteristic::CharacteristicKind;
use crate::id::AccessoryId;

/// Top-level error for homesync operations.
#[derive(Debug, thiserror::Error)]
pub enum HomesyncError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("gateway error")]
    Gateway(#[from] GatewayError),

    /// The sync service task is gone; commands can no longer be delivered.
    #[error("sync service stopped")]
    ServiceStopped,
}

/// A domain invariant was violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("position {0} is outside 0..=100")]
    PositionOutOfRange(i64),

    #[error("characteristic {0} is not writable")]
    NotWritable(CharacteristicKind),

    #[error("accessory {accessory} does not expose a {service} service")]
    MissingService {
        accessory: AccessoryId,
        service: ServiceKind,
    },
}

/// A looked-up item does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Failures reported by the accessory gateway.
///
/// All of them are terminal: nothing in homesync retries a gateway call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// No framework session could be established.
    #[error("accessory gateway unavailable")]
    Unavailable,

    #[error("failed to enable notifications for {kind} on {accessory_id}: {reason}")]
    SubscriptionFailed {
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        reason: String,
    },

    #[error("failed to read {kind} from {accessory_id}: {reason}")]
    ReadFailed {
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        reason: String,
    },

    #[error("failed to write {kind} on {accessory_id}: {reason}")]
    WriteFailed {
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        reason: String,
    },

    /// The gateway did not answer within the configured deadline.
    #[error("{operation} of {kind} on {accessory_id} timed out")]
    TimedOut {
        operation: &'static str,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
    },

    /// An inventory call (home list, accessory list) did not answer in time.
    #[error("{operation} timed out")]
    InventoryTimedOut { operation: &'static str },
}
