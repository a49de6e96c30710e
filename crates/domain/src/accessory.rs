//! Accessory: a device exposing one or more services.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::characteristic::CharacteristicKind;
use crate::error::{HomesyncError, ValidationError};
use crate::id::{AccessoryId, HomeId};

/// The services homesync knows how to track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    TemperatureSensor,
    WindowCovering,
}

impl ServiceKind {
    /// Characteristics tracked for this service.
    #[must_use]
    pub fn characteristics(self) -> &'static [CharacteristicKind] {
        match self {
            Self::TemperatureSensor => &[CharacteristicKind::CurrentTemperature],
            Self::WindowCovering => &[
                CharacteristicKind::CurrentPosition,
                CharacteristicKind::TargetPosition,
            ],
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TemperatureSensor => f.write_str("temperature_sensor"),
            Self::WindowCovering => f.write_str("window_covering"),
        }
    }
}

/// An accessory belonging to a home.
///
/// Accessories only appear or disappear when their home's accessory list
/// changes; homesync never creates them on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accessory {
    pub id: AccessoryId,
    pub name: String,
    pub home_id: HomeId,
    pub services: BTreeSet<ServiceKind>,
}

impl Accessory {
    /// Create a builder for constructing an [`Accessory`].
    #[must_use]
    pub fn builder() -> AccessoryBuilder {
        AccessoryBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HomesyncError::Validation`] when `name` is empty.
    pub fn validate(&self) -> Result<(), HomesyncError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }

    #[must_use]
    pub fn has_service(&self, service: ServiceKind) -> bool {
        self.services.contains(&service)
    }

    #[must_use]
    pub fn is_window(&self) -> bool {
        self.has_service(ServiceKind::WindowCovering)
    }

    #[must_use]
    pub fn is_temperature_sensor(&self) -> bool {
        self.has_service(ServiceKind::TemperatureSensor)
    }

    /// Every characteristic tracked for this accessory, in service order.
    pub fn tracked_characteristics(&self) -> impl Iterator<Item = CharacteristicKind> + '_ {
        self.services
            .iter()
            .flat_map(|service| service.characteristics().iter().copied())
    }
}

/// Step-by-step builder for [`Accessory`].
#[derive(Debug, Default)]
pub struct AccessoryBuilder {
    id: Option<AccessoryId>,
    name: Option<String>,
    home_id: Option<HomeId>,
    services: BTreeSet<ServiceKind>,
}

impl AccessoryBuilder {
    #[must_use]
    pub fn id(mut self, id: AccessoryId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn home_id(mut self, home_id: HomeId) -> Self {
        self.home_id = Some(home_id);
        self
    }

    #[must_use]
    pub fn service(mut self, service: ServiceKind) -> Self {
        self.services.insert(service);
        self
    }

    /// Consume the builder, validate, and return an [`Accessory`].
    ///
    /// # Errors
    ///
    /// Returns [`HomesyncError::Validation`] if `name` is missing or empty.
    pub fn build(self) -> Result<Accessory, HomesyncError> {
        let accessory = Accessory {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            home_id: self.home_id.unwrap_or_default(),
            services: self.services,
        };
        accessory.validate()?;
        Ok(accessory)
    }
}
