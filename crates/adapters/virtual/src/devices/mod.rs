//! Virtual accessories: thermometer and window covering.
//!
//! Each virtual accessory holds a fixed [`AccessoryId`](homesync_domain::id::AccessoryId)
//! so it stays stable for the lifetime of the gateway.

mod thermometer;
mod window;

pub use thermometer::{DEFAULT_TEMPERATURE, VirtualThermometer};
pub use window::VirtualWindow;

use homesync_domain::accessory::Accessory;
use homesync_domain::characteristic::{CharacteristicKind, CharacteristicValue};
use homesync_domain::error::HomesyncError;
use homesync_domain::id::HomeId;

/// Wrapper enum for the concrete virtual accessory types.
pub enum VirtualDevice {
    Thermometer(VirtualThermometer),
    Window(VirtualWindow),
}

impl VirtualDevice {
    /// Produce the [`Accessory`] descriptor for `home_id`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the builder fails.
    pub fn describe(&self, home_id: HomeId) -> Result<Accessory, HomesyncError> {
        match self {
            Self::Thermometer(d) => d.describe(home_id),
            Self::Window(d) => d.describe(home_id),
        }
    }

    pub fn read(&self, kind: CharacteristicKind) -> Option<CharacteristicValue> {
        match self {
            Self::Thermometer(d) => d.read(kind),
            Self::Window(d) => d.read(kind),
        }
    }
}
