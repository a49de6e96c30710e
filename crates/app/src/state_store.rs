//! Accessory state store: the in-process mirror of the framework's state.
//!
//! Holds the home list, the selected home and its accessories, the latest
//! reading of every tracked characteristic and the writes still waiting for
//! an acknowledgement. The store is plain data: it performs no IO and is
//! mutated only by the sync service, which hands out clones as snapshots.

use std::collections::HashMap;

use homesync_domain::accessory::Accessory;
use homesync_domain::characteristic::{
    CharacteristicKind, CharacteristicReading, CharacteristicValue, ReadingSource,
};
use homesync_domain::event::WriteOrigin;
use homesync_domain::home::Home;
use homesync_domain::id::{AccessoryId, HomeId};
use homesync_domain::time::Timestamp;

type Key = (AccessoryId, CharacteristicKind);

/// A write dispatched to the gateway and not yet acknowledged.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub value: CharacteristicValue,
    pub origin: WriteOrigin,
    pub requested_at: Timestamp,
}

/// Outcome of storing a reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadingUpdate {
    /// The value differs from the previous one, or the pair is new.
    Changed {
        previous: Option<CharacteristicValue>,
    },
    /// Same value as before; only timestamp and source were refreshed.
    Unchanged,
}

/// How the home selection moved after a home-list replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    Unchanged,
    Selected(HomeId),
    /// The selected home vanished and no other home is left.
    Cleared,
}

#[derive(Debug, Clone, Default)]
pub struct AccessoryStateStore {
    homes: Vec<Home>,
    selected: Option<HomeId>,
    accessories: Vec<Accessory>,
    readings: HashMap<Key, CharacteristicReading>,
    pending: HashMap<Key, PendingWrite>,
    generation: u64,
}

impl AccessoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the home list.
    ///
    /// When nothing is selected the first home of the new list is selected.
    /// "First" is whatever order the gateway used, not a stable criterion.
    /// A selected home that is missing from the new list is dropped first.
    pub fn set_homes(&mut self, homes: Vec<Home>) -> SelectionChange {
        self.homes = homes;

        let mut cleared = false;
        if let Some(selected) = self.selected {
            if !self.homes.iter().any(|home| home.id == selected) {
                self.clear_selection();
                cleared = true;
            }
        }

        if self.selected.is_none() {
            if let Some(first) = self.homes.first().map(|home| home.id) {
                self.select_home(first);
                return SelectionChange::Selected(first);
            }
        }

        if cleared {
            SelectionChange::Cleared
        } else {
            SelectionChange::Unchanged
        }
    }

    /// Select a home by id.
    ///
    /// Unknown ids are ignored and `false` is returned. Otherwise the
    /// accessory list is cleared until the caller refetches it, pending writes
    /// are forgotten and the generation moves on, so completions issued for
    /// the previous selection can be recognised as stale.
    pub fn select_home(&mut self, id: HomeId) -> bool {
        if !self.homes.iter().any(|home| home.id == id) {
            return false;
        }
        self.selected = Some(id);
        self.accessories.clear();
        self.pending.clear();
        self.generation += 1;
        true
    }

    fn clear_selection(&mut self) {
        self.selected = None;
        self.accessories.clear();
        self.pending.clear();
        self.generation += 1;
    }

    /// Install the accessory list of `home_id`.
    ///
    /// Ignored (returns `false`) when `home_id` is not the selected home.
    pub fn set_accessories(&mut self, home_id: HomeId, accessories: Vec<Accessory>) -> bool {
        if self.selected != Some(home_id) {
            return false;
        }
        self.accessories = accessories;
        true
    }

    /// Store a reading, overwriting whatever was there.
    ///
    /// The last delivered reading wins; timestamps are never compared.
    /// Readings for accessories outside the selected home are kept too.
    pub fn update_reading(&mut self, reading: CharacteristicReading) -> ReadingUpdate {
        let key = (reading.accessory_id, reading.kind);
        let value = reading.value;
        match self.readings.insert(key, reading) {
            Some(old) if old.value == value => ReadingUpdate::Unchanged,
            Some(old) => ReadingUpdate::Changed {
                previous: Some(old.value),
            },
            None => ReadingUpdate::Changed { previous: None },
        }
    }

    #[must_use]
    pub fn reading(
        &self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
    ) -> Option<CharacteristicValue> {
        self.readings.get(&(accessory_id, kind)).map(|r| r.value)
    }

    /// The full reading, including timestamp and source.
    #[must_use]
    pub fn reading_entry(
        &self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
    ) -> Option<&CharacteristicReading> {
        self.readings.get(&(accessory_id, kind))
    }

    /// Record a write as in flight. A newer write for the same
    /// characteristic replaces the older one.
    pub fn begin_write(
        &mut self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        value: CharacteristicValue,
        origin: WriteOrigin,
        requested_at: Timestamp,
    ) {
        self.pending.insert(
            (accessory_id, kind),
            PendingWrite {
                value,
                origin,
                requested_at,
            },
        );
    }

    /// Apply a write acknowledgement.
    ///
    /// The acknowledged value becomes the stored reading. The pending entry
    /// is only dropped when it is the write being acknowledged; a newer
    /// write for the same characteristic stays pending.
    pub fn complete_write(
        &mut self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        value: CharacteristicValue,
        acknowledged_at: Timestamp,
    ) -> ReadingUpdate {
        self.drop_pending_if(accessory_id, kind, value);
        self.update_reading(CharacteristicReading::new(
            accessory_id,
            kind,
            value,
            acknowledged_at,
            ReadingSource::WriteAck,
        ))
    }

    /// Forget a failed write. Returns `true` if it was still pending.
    pub fn fail_write(
        &mut self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        value: CharacteristicValue,
    ) -> bool {
        self.drop_pending_if(accessory_id, kind, value)
    }

    fn drop_pending_if(
        &mut self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        value: CharacteristicValue,
    ) -> bool {
        let key = (accessory_id, kind);
        if self.pending.get(&key).is_some_and(|p| p.value == value) {
            self.pending.remove(&key);
            return true;
        }
        false
    }

    #[must_use]
    pub fn pending_write(
        &self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
    ) -> Option<&PendingWrite> {
        self.pending.get(&(accessory_id, kind))
    }

    /// The value the UI should show: the pending write if any, otherwise the
    /// last reading.
    #[must_use]
    pub fn effective_value(
        &self,
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
    ) -> Option<CharacteristicValue> {
        self.pending_write(accessory_id, kind)
            .map(|p| p.value)
            .or_else(|| self.reading(accessory_id, kind))
    }

    #[must_use]
    pub fn homes(&self) -> &[Home] {
        &self.homes
    }

    #[must_use]
    pub fn selected_home_id(&self) -> Option<HomeId> {
        self.selected
    }

    #[must_use]
    pub fn selected_home(&self) -> Option<&Home> {
        let id = self.selected?;
        self.homes.iter().find(|home| home.id == id)
    }

    /// Accessories of the selected home.
    #[must_use]
    pub fn accessories(&self) -> &[Accessory] {
        &self.accessories
    }

    /// Look up an accessory of the selected home.
    #[must_use]
    pub fn accessory(&self, id: AccessoryId) -> Option<&Accessory> {
        self.accessories.iter().find(|a| a.id == id)
    }

    #[must_use]
    pub fn window_accessories(&self) -> Vec<AccessoryId> {
        self.accessories
            .iter()
            .filter(|a| a.is_window())
            .map(|a| a.id)
            .collect()
    }

    /// The sensor whose readings drive the window rule: the first
    /// temperature sensor of the selected home, in accessory order.
    #[must_use]
    pub fn primary_temperature_sensor(&self) -> Option<AccessoryId> {
        self.accessories
            .iter()
            .find(|a| a.is_temperature_sensor())
            .map(|a| a.id)
    }

    /// Last reading of the primary temperature sensor. Other sensors are
    /// stored but never reported here.
    #[must_use]
    pub fn temperature(&self) -> Option<f64> {
        let sensor = self.primary_temperature_sensor()?;
        self.reading(sensor, CharacteristicKind::CurrentTemperature)
            .map(CharacteristicValue::as_f64)
    }

    /// Bumped on every selection change.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use homesync_domain::accessory::ServiceKind;
    use homesync_domain::time::now;

    fn home(name: &str) -> Home {
        Home::builder().name(name).build().unwrap()
    }

    fn window(home_id: HomeId) -> Accessory {
        Accessory::builder()
            .name("Window")
            .home_id(home_id)
            .service(ServiceKind::WindowCovering)
            .build()
            .unwrap()
    }

    fn thermometer(home_id: HomeId) -> Accessory {
        Accessory::builder()
            .name("Thermometer")
            .home_id(home_id)
            .service(ServiceKind::TemperatureSensor)
            .build()
            .unwrap()
    }

    fn notification(
        accessory_id: AccessoryId,
        kind: CharacteristicKind,
        value: CharacteristicValue,
        timestamp: Timestamp,
    ) -> CharacteristicReading {
        CharacteristicReading::new(
            accessory_id,
            kind,
            value,
            timestamp,
            ReadingSource::Notification,
        )
    }

    #[test]
    fn should_select_first_home_when_nothing_selected() {
        let mut store = AccessoryStateStore::new();
        let first = home("First");
        let second = home("Second");
        let first_id = first.id;

        let change = store.set_homes(vec![first, second]);

        assert_eq!(change, SelectionChange::Selected(first_id));
        assert_eq!(store.selected_home_id(), Some(first_id));
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn should_keep_selection_when_home_list_is_replaced() {
        let mut store = AccessoryStateStore::new();
        let first = home("First");
        let second = home("Second");
        let second_id = second.id;
        store.set_homes(vec![first.clone(), second.clone()]);
        store.select_home(second_id);

        let change = store.set_homes(vec![first, second]);

        assert_eq!(change, SelectionChange::Unchanged);
        assert_eq!(store.selected_home_id(), Some(second_id));
    }

    #[test]
    fn should_reselect_first_home_when_selected_home_disappears() {
        let mut store = AccessoryStateStore::new();
        let gone = home("Gone");
        let stays = home("Stays");
        let stays_id = stays.id;
        store.set_homes(vec![gone]);

        let change = store.set_homes(vec![stays]);

        assert_eq!(change, SelectionChange::Selected(stays_id));
    }

    #[test]
    fn should_clear_selection_when_all_homes_disappear() {
        let mut store = AccessoryStateStore::new();
        let h = home("Only");
        let id = h.id;
        store.set_homes(vec![h]);
        store.set_accessories(id, vec![window(id)]);

        let change = store.set_homes(Vec::new());

        assert_eq!(change, SelectionChange::Cleared);
        assert!(store.selected_home_id().is_none());
        assert!(store.accessories().is_empty());
    }

    #[test]
    fn should_ignore_selection_of_unknown_home() {
        let mut store = AccessoryStateStore::new();
        let h = home("Known");
        let id = h.id;
        store.set_homes(vec![h]);
        let w = window(id);
        store.set_accessories(id, vec![w.clone()]);
        let generation = store.generation();

        assert!(!store.select_home(HomeId::new()));

        assert_eq!(store.selected_home_id(), Some(id));
        assert_eq!(store.accessories(), &[w]);
        assert_eq!(store.generation(), generation);
    }

    #[test]
    fn should_ignore_selection_after_empty_home_list() {
        let mut store = AccessoryStateStore::new();
        assert_eq!(store.set_homes(Vec::new()), SelectionChange::Unchanged);

        assert!(!store.select_home(HomeId::new()));

        assert!(store.selected_home_id().is_none());
        assert!(store.homes().is_empty());
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn should_clear_accessories_and_pending_writes_when_switching_home() {
        let mut store = AccessoryStateStore::new();
        let a = home("A");
        let b = home("B");
        let (a_id, b_id) = (a.id, b.id);
        store.set_homes(vec![a, b]);
        let w = window(a_id);
        let w_id = w.id;
        store.set_accessories(a_id, vec![w]);
        store.begin_write(
            w_id,
            CharacteristicKind::TargetPosition,
            CharacteristicValue::Int(40),
            WriteOrigin::User,
            now(),
        );

        assert!(store.select_home(b_id));

        assert!(store.accessories().is_empty());
        assert!(
            store
                .pending_write(w_id, CharacteristicKind::TargetPosition)
                .is_none()
        );
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn should_ignore_accessories_for_other_home() {
        let mut store = AccessoryStateStore::new();
        store.set_homes(vec![home("Selected")]);

        let other = HomeId::new();
        assert!(!store.set_accessories(other, vec![window(other)]));
        assert!(store.accessories().is_empty());
    }

    #[test]
    fn should_keep_latest_value_per_key() {
        let mut store = AccessoryStateStore::new();
        let a = AccessoryId::new();
        let b = AccessoryId::new();
        let sequence = [
            (a, CharacteristicKind::CurrentPosition, 10),
            (b, CharacteristicKind::CurrentPosition, 20),
            (a, CharacteristicKind::TargetPosition, 30),
            (a, CharacteristicKind::CurrentPosition, 40),
            (b, CharacteristicKind::CurrentPosition, 50),
            (b, CharacteristicKind::TargetPosition, 60),
            (a, CharacteristicKind::TargetPosition, 70),
        ];

        let mut expected = HashMap::new();
        for (id, kind, value) in sequence {
            store.update_reading(notification(
                id,
                kind,
                CharacteristicValue::Int(value),
                now(),
            ));
            expected.insert((id, kind), value);

            for (&(eid, ekind), &evalue) in &expected {
                assert_eq!(
                    store.reading(eid, ekind),
                    Some(CharacteristicValue::Int(evalue))
                );
            }
        }
    }

    #[test]
    fn should_prefer_delivery_order_over_timestamps() {
        let mut store = AccessoryStateStore::new();
        let w = AccessoryId::new();
        let later = now();
        let earlier = later - Duration::seconds(5);

        store.update_reading(notification(
            w,
            CharacteristicKind::CurrentPosition,
            CharacteristicValue::Int(40),
            later,
        ));
        store.update_reading(notification(
            w,
            CharacteristicKind::CurrentPosition,
            CharacteristicValue::Int(30),
            earlier,
        ));

        assert_eq!(
            store.reading(w, CharacteristicKind::CurrentPosition),
            Some(CharacteristicValue::Int(30))
        );
    }

    #[test]
    fn should_report_whether_reading_changed() {
        let mut store = AccessoryStateStore::new();
        let t = AccessoryId::new();
        let kind = CharacteristicKind::CurrentTemperature;

        let first = store.update_reading(notification(t, kind, CharacteristicValue::Float(21.0), now()));
        let same = store.update_reading(notification(t, kind, CharacteristicValue::Float(21.0), now()));
        let changed =
            store.update_reading(notification(t, kind, CharacteristicValue::Float(19.5), now()));

        assert_eq!(first, ReadingUpdate::Changed { previous: None });
        assert_eq!(same, ReadingUpdate::Unchanged);
        assert_eq!(
            changed,
            ReadingUpdate::Changed {
                previous: Some(CharacteristicValue::Float(21.0))
            }
        );
    }

    #[test]
    fn should_return_none_for_unobserved_reading() {
        let store = AccessoryStateStore::new();
        assert!(
            store
                .reading(AccessoryId::new(), CharacteristicKind::CurrentTemperature)
                .is_none()
        );
    }

    #[test]
    fn should_store_acknowledged_write_as_reading() {
        let mut store = AccessoryStateStore::new();
        let w = AccessoryId::new();
        let kind = CharacteristicKind::TargetPosition;
        store.begin_write(w, kind, CharacteristicValue::Int(0), WriteOrigin::Automation, now());

        assert!(store.reading(w, kind).is_none());
        assert_eq!(store.effective_value(w, kind), Some(CharacteristicValue::Int(0)));

        store.complete_write(w, kind, CharacteristicValue::Int(0), now());

        assert_eq!(store.reading(w, kind), Some(CharacteristicValue::Int(0)));
        assert_eq!(
            store.reading_entry(w, kind).map(|r| r.source),
            Some(ReadingSource::WriteAck)
        );
        assert!(store.pending_write(w, kind).is_none());
    }

    #[test]
    fn should_keep_newer_pending_write_when_older_one_is_acknowledged() {
        let mut store = AccessoryStateStore::new();
        let w = AccessoryId::new();
        let kind = CharacteristicKind::TargetPosition;
        store.begin_write(w, kind, CharacteristicValue::Int(20), WriteOrigin::User, now());
        store.begin_write(w, kind, CharacteristicValue::Int(60), WriteOrigin::User, now());

        store.complete_write(w, kind, CharacteristicValue::Int(20), now());

        assert_eq!(
            store.pending_write(w, kind).map(|p| p.value),
            Some(CharacteristicValue::Int(60))
        );
        assert_eq!(store.reading(w, kind), Some(CharacteristicValue::Int(20)));
    }

    #[test]
    fn should_revert_to_last_reading_when_write_fails() {
        let mut store = AccessoryStateStore::new();
        let w = AccessoryId::new();
        let kind = CharacteristicKind::TargetPosition;
        store.update_reading(CharacteristicReading::new(
            w,
            kind,
            CharacteristicValue::Int(100),
            now(),
            ReadingSource::InitialRead,
        ));
        store.begin_write(w, kind, CharacteristicValue::Int(0), WriteOrigin::User, now());

        assert!(store.fail_write(w, kind, CharacteristicValue::Int(0)));

        assert!(store.pending_write(w, kind).is_none());
        assert_eq!(store.effective_value(w, kind), Some(CharacteristicValue::Int(100)));
    }

    #[test]
    fn should_report_temperature_of_first_sensor_only() {
        let mut store = AccessoryStateStore::new();
        let h = home("Home");
        let id = h.id;
        store.set_homes(vec![h]);
        let first = thermometer(id);
        let second = thermometer(id);
        let (first_id, second_id) = (first.id, second.id);
        store.set_accessories(id, vec![window(id), first, second]);

        assert_eq!(store.primary_temperature_sensor(), Some(first_id));

        store.update_reading(notification(
            second_id,
            CharacteristicKind::CurrentTemperature,
            CharacteristicValue::Float(25.0),
            now(),
        ));
        assert!(store.temperature().is_none());
        assert_eq!(
            store.reading(second_id, CharacteristicKind::CurrentTemperature),
            Some(CharacteristicValue::Float(25.0))
        );

        store.update_reading(notification(
            first_id,
            CharacteristicKind::CurrentTemperature,
            CharacteristicValue::Float(18.25),
            now(),
        ));
        assert_eq!(store.temperature(), Some(18.25));
        assert_eq!(store.window_accessories().len(), 1);
    }

    #[test]
    fn should_have_no_primary_sensor_without_temperature_sensors() {
        let mut store = AccessoryStateStore::new();
        let h = home("Home");
        let id = h.id;
        store.set_homes(vec![h]);
        store.set_accessories(id, vec![window(id)]);

        assert!(store.primary_temperature_sensor().is_none());
        assert!(store.temperature().is_none());
    }
}
