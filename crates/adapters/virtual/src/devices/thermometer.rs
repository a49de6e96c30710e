//! Virtual thermometer: exposes a settable `current_temperature`.

use std::sync::Mutex;

use homesync_domain::accessory::{Accessory, ServiceKind};
use homesync_domain::characteristic::{CharacteristicKind, CharacteristicValue};
use homesync_domain::error::HomesyncError;
use homesync_domain::id::{AccessoryId, HomeId};

/// Temperature reported before anything calls [`VirtualThermometer::set_temperature`].
pub const DEFAULT_TEMPERATURE: f64 = 21.5;

/// A simulated temperature sensor.
pub struct VirtualThermometer {
    accessory_id: AccessoryId,
    temperature: Mutex<f64>,
}

impl Default for VirtualThermometer {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPERATURE)
    }
}

impl VirtualThermometer {
    #[must_use]
    pub fn new(temperature: f64) -> Self {
        Self {
            accessory_id: AccessoryId::new(),
            temperature: Mutex::new(temperature),
        }
    }

    #[must_use]
    pub fn accessory_id(&self) -> AccessoryId {
        self.accessory_id
    }

    /// Produce the [`Accessory`] descriptor for `home_id`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the builder fails.
    pub fn describe(&self, home_id: HomeId) -> Result<Accessory, HomesyncError> {
        Accessory::builder()
            .id(self.accessory_id)
            .name("Virtual Thermometer")
            .home_id(home_id)
            .service(ServiceKind::TemperatureSensor)
            .build()
    }

    /// Current value of `kind`, if the thermometer exposes it.
    pub fn read(&self, kind: CharacteristicKind) -> Option<CharacteristicValue> {
        match kind {
            CharacteristicKind::CurrentTemperature => {
                Some(CharacteristicValue::Float(*self.lock_temperature()))
            }
            CharacteristicKind::CurrentPosition | CharacteristicKind::TargetPosition => None,
        }
    }

    /// Store a new temperature and return it as a characteristic value.
    pub fn set_temperature(&self, celsius: f64) -> CharacteristicValue {
        *self.lock_temperature() = celsius;
        CharacteristicValue::Float(celsius)
    }

    fn lock_temperature(&self) -> std::sync::MutexGuard<'_, f64> {
        self.temperature
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
