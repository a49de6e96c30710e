//! Virtual window covering: moves instantly to whatever target it is given.

use std::sync::Mutex;

use homesync_domain::accessory::{Accessory, ServiceKind};
use homesync_domain::characteristic::{CharacteristicKind, CharacteristicValue, Position};
use homesync_domain::error::HomesyncError;
use homesync_domain::id::{AccessoryId, HomeId};

#[derive(Debug, Clone, Copy)]
struct WindowState {
    current: Position,
    target: Position,
}

/// A simulated window covering, closed on start.
pub struct VirtualWindow {
    accessory_id: AccessoryId,
    state: Mutex<WindowState>,
}

impl Default for VirtualWindow {
    fn default() -> Self {
        Self {
            accessory_id: AccessoryId::new(),
            state: Mutex::new(WindowState {
                current: Position::CLOSED,
                target: Position::CLOSED,
            }),
        }
    }
}

impl VirtualWindow {
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
            .name("Virtual Window")
            .home_id(home_id)
            .service(ServiceKind::WindowCovering)
            .build()
    }

    pub fn read(&self, kind: CharacteristicKind) -> Option<CharacteristicValue> {
        let state = self.lock_state();
        match kind {
            CharacteristicKind::CurrentPosition => Some(state.current.into()),
            CharacteristicKind::TargetPosition => Some(state.target.into()),
            CharacteristicKind::CurrentTemperature => None,
        }
    }

    /// Move to `target`.
    ///
    /// Returns the characteristics whose value changed, target first.
    pub fn move_to(&self, target: Position) -> Vec<(CharacteristicKind, CharacteristicValue)> {
        let mut state = self.lock_state();
        let mut changed = Vec::with_capacity(2);
        if state.target != target {
            state.target = target;
            changed.push((CharacteristicKind::TargetPosition, target.into()));
        }
        if state.current != target {
            state.current = target;
            changed.push((CharacteristicKind::CurrentPosition, target.into()));
        }
        changed
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, WindowState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_start_closed() {
        let window = VirtualWindow::default();
        assert_eq!(
            window.read(CharacteristicKind::TargetPosition),
            Some(CharacteristicValue::Int(0))
        );
        assert_eq!(
            window.read(CharacteristicKind::CurrentPosition),
            Some(CharacteristicValue::Int(0))
        );
    }

    #[test]
    fn should_move_current_position_with_target() {
        let window = VirtualWindow::default();
        let changed = window.move_to(Position::OPEN);

        assert_eq!(
            changed,
            vec![
                (CharacteristicKind::TargetPosition, CharacteristicValue::Int(100)),
                (CharacteristicKind::CurrentPosition, CharacteristicValue::Int(100)),
            ]
        );
        assert_eq!(
            window.read(CharacteristicKind::CurrentPosition),
            Some(CharacteristicValue::Int(100))
        );
    }

    #[test]
    fn should_report_nothing_when_already_at_target() {
        let window = VirtualWindow::default();
        assert!(window.move_to(Position::CLOSED).is_empty());
    }

    #[test]
    fn should_not_expose_temperature() {
        let window = VirtualWindow::default();
        assert_eq!(window.read(CharacteristicKind::CurrentTemperature), None);
    }

    #[test]
    fn should_describe_window_covering() {
        let window = VirtualWindow::default();
        let accessory = window.describe(HomeId::new()).unwrap();
        assert_eq!(accessory.name, "Virtual Window");
        assert!(accessory.is_window());
    }
}
