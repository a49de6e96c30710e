//! Home: a logical grouping of accessories managed by the framework.

use serde::{Deserialize, Serialize};

use crate::error::{HomesyncError, ValidationError};
use crate::id::HomeId;

/// Connectivity of the home's automation hub.
///
/// Informational only; no rule acts on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HubState {
    Connected,
    Disconnected,
    #[default]
    NotAvailable,
}

impl std::fmt::Display for HubState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::Disconnected => f.write_str("disconnected"),
            Self::NotAvailable => f.write_str("not_available"),
        }
    }
}

/// A home as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Home {
    pub id: HomeId,
    pub name: String,
    pub hub_state: HubState,
}

impl Home {
    /// Create a builder for constructing a [`Home`].
    #[must_use]
    pub fn builder() -> HomeBuilder {
        HomeBuilder::default()
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
}

/// Step-by-step builder for [`Home`].
#[derive(Debug, Default)]
pub struct HomeBuilder {
    id: Option<HomeId>,
    name: Option<String>,
    hub_state: Option<HubState>,
}

impl HomeBuilder {
    #[must_use]
    pub fn id(mut self, id: HomeId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn hub_state(mut self, hub_state: HubState) -> Self {
        self.hub_state = Some(hub_state);
        self
    }

    /// Consume the builder, validate, and return a [`Home`].
    ///
    /// # Errors
    ///
    /// Returns [`HomesyncError::Validation`] if `name` is missing or empty.
    pub fn build(self) -> Result<Home, HomesyncError> {
        let home = Home {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            hub_state: self.hub_state.unwrap_or_default(),
        };
        home.validate()?;
        Ok(home)
    }
}
