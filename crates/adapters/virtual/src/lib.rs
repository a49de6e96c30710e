//! # homesync-adapter-virtual
//!
//! Virtual/demo accessory gateway that simulates a home-automation framework
//! for testing and demonstration purposes.
//!
//! ## Provided accessories
//!
//! | Accessory | Service | Behaviour |
//! |-----------|---------|-----------|
//! | Virtual Thermometer | `temperature_sensor` | Reports whatever [`VirtualGateway::set_temperature`] last stored |
//! | Virtual Window | `window_covering` | Moves instantly to any written target position |
//!
//! Both live in a single connected home named "Virtual Home". Value changes
//! are pushed as [`GatewayEvent::ValueChanged`] only for characteristics the
//! caller subscribed to, mirroring a real framework.
//!
//! ## Dependency rule
//!
//! Depends on `homesync-app` (port traits) and `homesync-domain` only.

mod devices;

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Mutex;

use tokio::sync::mpsc;

use homesync_app::ports::{AccessoryGateway, GatewayEvent};
use homesync_domain::accessory::Accessory;
use homesync_domain::characteristic::{CharacteristicKind, CharacteristicValue};
use homesync_domain::error::{GatewayError, HomesyncError, ValidationError};
use homesync_domain::home::{Home, HubState};
use homesync_domain::id::{AccessoryId, HomeId};
use homesync_domain::time::now;

pub use devices::DEFAULT_TEMPERATURE;
use devices::{VirtualDevice, VirtualThermometer, VirtualWindow};

/// Simulated accessory framework holding one home.
pub struct VirtualGateway {
    home: Home,
    accessories: Vec<Accessory>,
    thermometer_id: AccessoryId,
    window_id: AccessoryId,
    devices: HashMap<AccessoryId, VirtualDevice>,
    subscriptions: Mutex<HashSet<(AccessoryId, CharacteristicKind)>>,
    events: mpsc::Sender<GatewayEvent>,
}

impl VirtualGateway {
    /// Build the virtual home, pushing notifications into `events`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a descriptor builder fails.
    pub fn new(
        events: mpsc::Sender<GatewayEvent>,
        initial_temperature: f64,
    ) -> Result<Self, HomesyncError> {
        let home = Home::builder()
            .name("Virtual Home")
            .hub_state(HubState::Connected)
            .build()?;

        let thermometer = VirtualThermometer::new(initial_temperature);
        let window = VirtualWindow::default();
        let thermometer_id = thermometer.accessory_id();
        let window_id = window.accessory_id();

        let accessories = vec![thermometer.describe(home.id)?, window.describe(home.id)?];

        let mut devices = HashMap::new();
        devices.insert(thermometer_id, VirtualDevice::Thermometer(thermometer));
        devices.insert(window_id, VirtualDevice::Window(window));

        Ok(Self {
            home,
            accessories,
            thermometer_id,
            window_id,
            devices,
            subscriptions: Mutex::new(HashSet::new()),
            events,
        })
    }

    #[must_use]
    pub fn home_id(&self) -> HomeId {
        self.home.id
    }

    #[must_use]
    pub fn thermometer_id(&self) -> AccessoryId {
        self.thermometer_id
    }

    #[must_use]
    pub fn window_id(&self) -> AccessoryId {
        self.window_id
    }

    /// Push the home inventory, as a framework does once its session is up.
    pub fn announce(&self) {
        self.push(GatewayEvent::HomesUpdated(vec![self.home.clone()]));
    }

    /// Change the simulated room temperature.
    pub fn set_temperature(&self, celsius: f64) {
        let Some(VirtualDevice::Thermometer(thermometer)) = self.devices.get(&self.thermometer_id)
        else {
            return;
        };
        let value = thermometer.set_temperature(celsius);
        tracing::debug!(celsius, "virtual temperature changed");
        self.notify(self.thermometer_id, CharacteristicKind::CurrentTemperature, value);
    }

    /// Whether notifications are enabled for this characteristic.
    #[must_use]
    pub fn is_subscribed(&self, accessory_id: AccessoryId, kind: CharacteristicKind) -> bool {
        self.lock_subscriptions().contains(&(accessory_id, kind))
    }

    fn notify(&self, accessory_id: AccessoryId, kind: CharacteristicKind, value: CharacteristicValue) {
        if !self.is_subscribed(accessory_id, kind) {
            return;
        }
        self.push(GatewayEvent::ValueChanged {
            accessory_id,
            kind,
            value,
            timestamp: now(),
        });
    }

    fn push(&self, event: GatewayEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(?event, "gateway event channel full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("gateway event channel closed");
            }
        }
    }

    fn lock_subscriptions(
        &self,
    ) -> std::sync::MutexGuard<'_, HashSet<(AccessoryId, CharacteristicKind)>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn apply_write(
        &self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        value: CharacteristicValue,
    ) -> Result<(), GatewayError> {
        let failed = |reason: String| GatewayError::WriteFailed {
            accessory_id,
            kind,
            reason,
        };

        if !kind.is_writable() {
            return Err(failed(ValidationError::NotWritable(kind).to_string()));
        }
        let window = match self.devices.get(&accessory_id) {
            Some(VirtualDevice::Window(window)) => window,
            Some(VirtualDevice::Thermometer(_)) => {
                return Err(failed("accessory has no window covering".to_string()));
            }
            None => return Err(failed("unknown accessory".to_string())),
        };
        let target = value
            .as_position()
            .ok_or_else(|| failed(format!("{value} is not a valid position")))?;

        tracing::info!(%accessory_id, %target, "virtual window moving");
        for (changed_kind, changed_value) in window.move_to(target) {
            self.notify(accessory_id, changed_kind, changed_value);
        }
        Ok(())
    }
}

impl AccessoryGateway for VirtualGateway {
    fn list_homes(&self) -> impl Future<Output = Result<Vec<Home>, GatewayError>> + Send {
        let homes = vec![self.home.clone()];
        async move { Ok(homes) }
    }

    fn accessories_for(
        &self,
        home_id: HomeId,
    ) -> impl Future<Output = Result<Vec<Accessory>, GatewayError>> + Send {
        let accessories = if home_id == self.home.id {
            self.accessories.clone()
        } else {
            Vec::new()
        };
        async move { Ok(accessories) }
    }

    fn subscribe(
        &self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        let exposed = self
            .devices
            .get(&accessory_id)
            .and_then(|device| device.read(kind))
            .is_some();
        let result = if exposed {
            self.lock_subscriptions().insert((accessory_id, kind));
            Ok(())
        } else {
            Err(GatewayError::SubscriptionFailed {
                accessory_id,
                kind,
                reason: "characteristic not exposed".to_string(),
            })
        };
        async move { result }
    }

    fn read_once(
        &self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
    ) -> impl Future<Output = Result<CharacteristicValue, GatewayError>> + Send {
        let result = self
            .devices
            .get(&accessory_id)
            .and_then(|device| device.read(kind))
            .ok_or_else(|| GatewayError::ReadFailed {
                accessory_id,
                kind,
                reason: "characteristic not exposed".to_string(),
            });
        async move { result }
    }

    fn write(
        &self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        value: CharacteristicValue,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        let result = self.apply_write(accessory_id, kind, value);
        async move { result }
    }
}
