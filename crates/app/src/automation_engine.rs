//! Automation engine: turns temperature observations into window writes.
//!
//! Wraps the pure window rule from the domain with the parts that need store
//! context: which windows belong to the selected home, and which of them
//! already have the target the rule asks for.

use homesync_domain::automation::{WindowCommand, evaluate};
use homesync_domain::characteristic::{CharacteristicKind, CharacteristicValue};

use crate::state_store::AccessoryStateStore;

/// Applies the window rule against a store snapshot.
#[derive(Debug, Clone, Copy)]
pub struct AutomationEngine {
    enabled: bool,
}

impl Default for AutomationEngine {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AutomationEngine {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Commands to issue for a new temperature.
    ///
    /// Windows whose pending or last-known target already equals the rule's
    /// target are skipped, so a temperature hovering on one side of the
    /// threshold does not hammer the hardware with identical writes.
    #[must_use]
    pub fn on_temperature(
        &self,
        temperature_celsius: f64,
        store: &AccessoryStateStore,
    ) -> Vec<WindowCommand> {
        if !self.enabled {
            return Vec::new();
        }
        if !temperature_celsius.is_finite() {
            tracing::warn!(temperature_celsius, "ignoring non-finite temperature");
            return Vec::new();
        }

        evaluate(temperature_celsius, &store.window_accessories())
            .into_iter()
            .filter(|command| {
                let already = already_targeted(store, command);
                if already {
                    tracing::debug!(%command, "window already at target, skipping write");
                }
                !already
            })
            .collect()
    }
}

fn already_targeted(store: &AccessoryStateStore, command: &WindowCommand) -> bool {
    store
        .effective_value(command.accessory_id, CharacteristicKind::TargetPosition)
        .and_then(CharacteristicValue::as_position)
        == Some(command.target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use homesync_domain::accessory::{Accessory, ServiceKind};
    use homesync_domain::characteristic::{CharacteristicReading, Position, ReadingSource};
    use homesync_domain::event::WriteOrigin;
    use homesync_domain::home::Home;
    use homesync_domain::id::AccessoryId;
    use homesync_domain::time::now;

    struct Fixture {
        store: AccessoryStateStore,
        window: AccessoryId,
        sensor: AccessoryId,
    }

    fn fixture() -> Fixture {
        let mut store = AccessoryStateStore::new();
        let home = Home::builder().name("Flat").build().unwrap();
        let home_id = home.id;
        store.set_homes(vec![home]);

        let window = Accessory::builder()
            .name("Kitchen Window")
            .home_id(home_id)
            .service(ServiceKind::WindowCovering)
            .build()
            .unwrap();
        let sensor = Accessory::builder()
            .name("Thermometer")
            .home_id(home_id)
            .service(ServiceKind::TemperatureSensor)
            .build()
            .unwrap();
        let (window_id, sensor_id) = (window.id, sensor.id);
        store.set_accessories(home_id, vec![window, sensor]);

        Fixture {
            store,
            window: window_id,
            sensor: sensor_id,
        }
    }

    fn set_target(store: &mut AccessoryStateStore, window: AccessoryId, percent: i64) {
        store.update_reading(CharacteristicReading::new(
            window,
            CharacteristicKind::TargetPosition,
            CharacteristicValue::Int(percent),
            now(),
            ReadingSource::InitialRead,
        ));
    }

    #[test]
    fn should_close_windows_when_cold() {
        let f = fixture();
        let commands = AutomationEngine::default().on_temperature(15.0, &f.store);
        assert_eq!(
            commands,
            vec![WindowCommand {
                accessory_id: f.window,
                target: Position::CLOSED
            }]
        );
    }

    #[test]
    fn should_not_command_temperature_sensors() {
        let f = fixture();
        let commands = AutomationEngine::default().on_temperature(25.0, &f.store);
        assert!(commands.iter().all(|c| c.accessory_id != f.sensor));
    }

    #[test]
    fn should_skip_window_already_at_target() {
        let mut f = fixture();
        set_target(&mut f.store, f.window, 100);

        let commands = AutomationEngine::default().on_temperature(22.0, &f.store);

        assert!(commands.is_empty());
    }

    #[test]
    fn should_skip_window_with_matching_pending_write() {
        let mut f = fixture();
        set_target(&mut f.store, f.window, 100);
        f.store.begin_write(
            f.window,
            CharacteristicKind::TargetPosition,
            Position::CLOSED.into(),
            WriteOrigin::Automation,
            now(),
        );

        let commands = AutomationEngine::default().on_temperature(10.0, &f.store);

        assert!(commands.is_empty());
    }

    #[test]
    fn should_command_window_when_target_differs() {
        let mut f = fixture();
        set_target(&mut f.store, f.window, 35);

        let commands = AutomationEngine::default().on_temperature(20.0, &f.store);

        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].target, Position::OPEN);
    }

    #[test]
    fn should_do_nothing_when_disabled() {
        let f = fixture();
        let engine = AutomationEngine::new(false);
        assert!(!engine.is_enabled());
        assert!(engine.on_temperature(5.0, &f.store).is_empty());
    }

    #[test]
    fn should_ignore_non_finite_temperature() {
        let f = fixture();
        let engine = AutomationEngine::default();
        assert!(engine.on_temperature(f64::NAN, &f.store).is_empty());
        assert!(engine.on_temperature(f64::INFINITY, &f.store).is_empty());
    }
}
