//! Window rule: temperature in, target window positions out.
//!
//! Below [`THRESHOLD_CELSIUS`] every window covering is closed, at or above
//! it every window covering is opened. There is no hysteresis and no
//! per-accessory override.

use serde::{Deserialize, Serialize};

use crate::characteristic::Position;
use crate::id::AccessoryId;

/// Temperatures strictly below this close the windows.
pub const THRESHOLD_CELSIUS: f64 = 20.0;

/// A target position the rule wants written to one window covering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCommand {
    pub accessory_id: AccessoryId,
    pub target: Position,
}

impl std::fmt::Display for WindowCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "set_target({}, {})", self.accessory_id, self.target)
    }
}

/// Target position for a single temperature observation.
#[must_use]
pub fn target_position(temperature_celsius: f64) -> Position {
    if temperature_celsius < THRESHOLD_CELSIUS {
        Position::CLOSED
    } else {
        Position::OPEN
    }
}

/// Apply the rule to every window-capable accessory.
#[must_use]
pub fn evaluate(temperature_celsius: f64, window_accessory_ids: &[AccessoryId]) -> Vec<WindowCommand> {
    let target = target_position(temperature_celsius);
    window_accessory_ids
        .iter()
        .map(|&accessory_id| WindowCommand {
            accessory_id,
            target,
        })
        .collect()
}
