//! Change events published to the presentation layer.
//!
//! Every mutation of the accessory state store produces one of these, so a
//! consumer can keep its view current without polling snapshots.

use serde::{Deserialize, Serialize};

use crate::accessory::Accessory;
use crate::automation::WindowCommand;
use crate::characteristic::{CharacteristicKind, CharacteristicReading, CharacteristicValue};
use crate::home::Home;
use crate::id::{AccessoryId, HomeId};

/// Who asked for a characteristic write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOrigin {
    User,
    Automation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// The gateway replaced the home list.
    HomesChanged { homes: Vec<Home> },
    HomeSelected { home_id: HomeId },
    AccessoriesChanged {
        home_id: HomeId,
        accessories: Vec<Accessory>,
    },
    /// A reading was stored; `previous` is `None` the first time a pair is seen.
    ReadingChanged {
        reading: CharacteristicReading,
        previous: Option<CharacteristicValue>,
    },
    WriteRequested {
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        value: CharacteristicValue,
        origin: WriteOrigin,
    },
    WriteSucceeded {
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        value: CharacteristicValue,
    },
    /// The write was rejected or timed out; the pending value was dropped.
    WriteFailed {
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        value: CharacteristicValue,
        reason: String,
    },
    AutomationFired {
        temperature: f64,
        commands: Vec<WindowCommand>,
    },
}

impl StoreEvent {
    /// Short machine-readable name, used as a log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HomesChanged { .. } => "homes_changed",
            Self::HomeSelected { .. } => "home_selected",
            Self::AccessoriesChanged { .. } => "accessories_changed",
            Self::ReadingChanged { .. } => "reading_changed",
            Self::WriteRequested { .. } => "write_requested",
            Self::WriteSucceeded { .. } => "write_succeeded",
            Self::WriteFailed { .. } => "write_failed",
            Self::AutomationFired { .. } => "automation_fired",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_serialize_with_snake_case_type_tag() {
        let home_id = HomeId::new();
        let json = serde_json::to_value(StoreEvent::HomeSelected { home_id }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "home_selected", "home_id": home_id})
        );
    }

    #[test]
    fn should_match_kind_with_serialized_tag() {
        let event = StoreEvent::WriteFailed {
            accessory_id: AccessoryId::new(),
            kind: CharacteristicKind::TargetPosition,
            value: CharacteristicValue::Int(0),
            reason: "unreachable".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.kind());
        assert_eq!(json["kind"], "target_position");
    }
}
