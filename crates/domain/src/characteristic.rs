//! Characteristics: single observable/writable attributes of a service,
//! and the readings homesync keeps for them.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::AccessoryId;
use crate::time::Timestamp;

/// The characteristics homesync tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacteristicKind {
    /// Degrees Celsius, reported by temperature sensors.
    CurrentTemperature,
    /// Device-reported window position, in percent open.
    CurrentPosition,
    /// Commanded window position, in percent open.
    TargetPosition,
}

impl CharacteristicKind {
    /// Only the commanded position may be written.
    #[must_use]
    pub fn is_writable(self) -> bool {
        matches!(self, Self::TargetPosition)
    }
}

impl std::fmt::Display for CharacteristicKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CurrentTemperature => f.write_str("current_temperature"),
            Self::CurrentPosition => f.write_str("current_position"),
            Self::TargetPosition => f.write_str("target_position"),
        }
    }
}

/// A raw characteristic value as exchanged with the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CharacteristicValue {
    Int(i64),
    Float(f64),
}

impl CharacteristicValue {
    /// Numeric view of the value; integers widen to `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    /// Interpret the value as a window position.
    ///
    /// Floats are accepted when they carry an integral percentage, since some
    /// frameworks report every numeric characteristic as a double.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
    pub fn as_position(self) -> Option<Position> {
        match self {
            Self::Int(v) => Position::new(v).ok(),
            Self::Float(v) if v.fract() == 0.0 => Position::new(v as i64).ok(),
            Self::Float(_) => None,
        }
    }
}

impl std::fmt::Display for CharacteristicValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<Position> for CharacteristicValue {
    fn from(position: Position) -> Self {
        Self::Int(i64::from(position.percent()))
    }
}

/// A window position in percent open, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Position(u8);

impl Position {
    pub const CLOSED: Self = Self(0);
    pub const OPEN: Self = Self(100);

    /// # Errors
    ///
    /// Returns [`ValidationError::PositionOutOfRange`] outside `0..=100`.
    pub fn new(percent: i64) -> Result<Self, ValidationError> {
        match u8::try_from(percent) {
            Ok(p) if p <= 100 => Ok(Self(p)),
            _ => Err(ValidationError::PositionOutOfRange(percent)),
        }
    }

    #[must_use]
    pub fn percent(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Position {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Position> for i64 {
    fn from(position: Position) -> Self {
        i64::from(position.0)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Where a reading came from. Diagnostic only: it never decides which value wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingSource {
    InitialRead,
    Notification,
    WriteAck,
}

/// The last value received for one `(accessory, characteristic)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacteristicReading {
    pub accessory_id: AccessoryId,
    pub kind: CharacteristicKind,
    pub value: CharacteristicValue,
    /// When the value was observed, as reported by the gateway.
    pub timestamp: Timestamp,
    pub source: ReadingSource,
}

impl CharacteristicReading {
    #[must_use]
    pub fn new(
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        value: CharacteristicValue,
        timestamp: Timestamp,
        source: ReadingSource,
    ) -> Self {
        Self {
            accessory_id,
            kind,
            value,
            timestamp,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_accept_positions_within_range() {
        assert_eq!(Position::new(0).unwrap(), Position::CLOSED);
        assert_eq!(Position::new(100).unwrap(), Position::OPEN);
        assert_eq!(Position::new(42).unwrap().percent(), 42);
    }

    #[test]
    fn should_reject_positions_outside_range() {
        assert_eq!(
            Position::new(101),
            Err(ValidationError::PositionOutOfRange(101))
        );
        assert_eq!(
            Position::new(-1),
            Err(ValidationError::PositionOutOfRange(-1))
        );
    }

    #[test]
    fn should_only_allow_writing_target_position() {
        assert!(CharacteristicKind::TargetPosition.is_writable());
        assert!(!CharacteristicKind::CurrentPosition.is_writable());
        assert!(!CharacteristicKind::CurrentTemperature.is_writable());
    }

    #[test]
    fn should_read_integral_float_as_position() {
        assert_eq!(
            CharacteristicValue::Float(30.0).as_position(),
            Some(Position::new(30).unwrap())
        );
        assert_eq!(CharacteristicValue::Float(30.5).as_position(), None);
        assert_eq!(CharacteristicValue::Int(250).as_position(), None);
    }

    #[test]
    fn should_widen_int_to_float() {
        assert!((CharacteristicValue::Int(21).as_f64() - 21.0).abs() < f64::EPSILON);
    }

    #[test]
    fn should_reject_out_of_range_position_when_deserializing() {
        let result: Result<Position, _> = serde_json::from_str("150");
        assert!(result.is_err());
        let ok: Position = serde_json::from_str("55").unwrap();
        assert_eq!(ok.percent(), 55);
    }

    #[test]
    fn should_serialize_values_without_tag() {
        assert_eq!(
            serde_json::to_string(&CharacteristicValue::Int(40)).unwrap(),
            "40"
        );
        assert_eq!(
            serde_json::to_string(&CharacteristicValue::Float(19.5)).unwrap(),
            "19.5"
        );
    }
}
