//! Pure BLE state transitions.
//!
//! [`BleReconciler`] owns the `connected` and `available` collections and the
//! sets of ids with a connect attempt or a profile read in flight. Every
//! method is synchronous; anything that must talk to the radio is left to
//! the caller, which feeds the outcome back in. An id is never present in both collections.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{BluetoothError, ConnectionState, GattProfile, Peripheral, Sighting};

/// What the caller must do after a sighting has been observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SightingOutcome {
    /// Nothing changed.
    Ignored,
    /// A new peripheral was added to `available`.
    AddedAvailable,
    /// A connected peripheral we have not recorded yet: read its profile,
    /// then call [`BleReconciler::insert_connected`], or
    /// [`BleReconciler::abandon_profile`] if the read is dropped.
    NeedsProfile,
}

/// Point-in-time view of the reconciler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DiscoverySnapshot {
    /// Connected peripherals, in the order they were recorded.
    pub connected: Vec<Peripheral>,
    /// Connectable peripherals, in first-seen order.
    pub available: Vec<Peripheral>,
    /// Ids with a connect attempt in flight, sorted.
    pub connecting: Vec<String>,
}

/// BLE discovery state.
#[derive(Debug, Default)]
pub struct BleReconciler {
    connected: Vec<Peripheral>,
    available: Vec<Peripheral>,
    connecting: HashSet<String>,
    profile_pending: HashSet<String>,
}

impl BleReconciler {
    /// Empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one scan result into the state.
    pub fn observe(&mut self, sighting: &Sighting) -> SightingOutcome {
        let Some(name) = sighting.display_name() else {
            return SightingOutcome::Ignored;
        };
        if self.is_connected(&sighting.id) || self.profile_pending.contains(&sighting.id) {
            return SightingOutcome::Ignored;
        }
        if sighting.connected {
            self.profile_pending.insert(sighting.id.clone());
            return SightingOutcome::NeedsProfile;
        }
        if self.is_available(&sighting.id) {
            return SightingOutcome::Ignored;
        }

        self.available
            .push(Peripheral::available(sighting.id.clone(), name));
        SightingOutcome::AddedAvailable
    }

    /// Record a connected peripheral, dropping it from `available`.
    ///
    /// Returns `false` if the id was already connected.
    pub fn insert_connected(&mut self, peripheral: Peripheral) -> bool {
        self.profile_pending.remove(&peripheral.id);
        if self.is_connected(&peripheral.id) {
            return false;
        }
        self.available.retain(|p| p.id != peripheral.id);
        self.connected.push(Peripheral {
            state: ConnectionState::Connected,
            ..peripheral
        });
        true
    }

    /// Forget a profile read that will never call [`Self::insert_connected`].
    ///
    /// The next connected sighting of `id` asks for the profile again.
    pub fn abandon_profile(&mut self, id: &str) {
        self.profile_pending.remove(id);
    }

    /// Mark a connect attempt as started.
    ///
    /// Returns the peripheral's name.
    ///
    /// # Errors
    ///
    /// Fails if an attempt for `id` is already in flight, or `id` is not available.
    pub fn begin_connect(&mut self, id: &str) -> Result<String, BluetoothError> {
        if self.connecting.contains(id) {
            return Err(BluetoothError::AlreadyConnecting { id: id.to_string() });
        }
        if self.is_connected(id) {
            return Err(BluetoothError::NotAvailable { id: id.to_string() });
        }
        let peripheral = self
            .available
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| BluetoothError::DeviceNotFound { id: id.to_string() })?;

        peripheral.state = ConnectionState::Connecting;
        self.connecting.insert(id.to_string());
        Ok(peripheral.name.clone())
    }

    /// Clear the in-flight marker for `id`.
    ///
    /// A peripheral still in `available` goes back to [`ConnectionState::Available`].
    pub fn finish_connect(&mut self, id: &str) {
        self.connecting.remove(id);
        if let Some(peripheral) = self.available.iter_mut().find(|p| p.id == id) {
            peripheral.state = ConnectionState::Available;
        }
    }

    /// Move `id` to `connected` with `profile`, returning the connected record.
    pub fn promote(&mut self, id: &str, name: String, profile: GattProfile) -> Peripheral {
        self.available.retain(|p| p.id != id);
        if let Some(existing) = self.connected.iter_mut().find(|p| p.id == id) {
            existing.profile = Some(profile);
            return existing.clone();
        }
        let peripheral = Peripheral::connected(id, name, Some(profile));
        self.connected.push(peripheral.clone());
        peripheral
    }

    /// Look up a peripheral in either collection.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Peripheral> {
        self.connected
            .iter()
            .chain(self.available.iter())
            .find(|p| p.id == id)
    }

    /// `true` if `id` is connected.
    #[must_use]
    pub fn is_connected(&self, id: &str) -> bool {
        self.connected.iter().any(|p| p.id == id)
    }

    /// `true` if `id` is available.
    #[must_use]
    pub fn is_available(&self, id: &str) -> bool {
        self.available.iter().any(|p| p.id == id)
    }

    /// `true` if a connect attempt for `id` is in flight.
    #[must_use]
    pub fn is_connecting(&self, id: &str) -> bool {
        self.connecting.contains(id)
    }

    /// Connected peripherals.
    #[must_use]
    pub fn connected(&self) -> &[Peripheral] {
        &self.connected
    }

    /// Available peripherals.
    #[must_use]
    pub fn available(&self) -> &[Peripheral] {
        &self.available
    }

    /// Copy out the current state.
    #[must_use]
    pub fn snapshot(&self) -> DiscoverySnapshot {
        let mut connecting: Vec<String> = self.connecting.iter().cloned().collect();
        connecting.sort();
        DiscoverySnapshot {
            connected: self.connected.clone(),
            available: self.available.clone(),
            connecting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn seen(id: &str, name: Option<&str>, connected: bool) -> Sighting {
        Sighting {
            id: id.to_string(),
            name: name.map(str::to_string),
            connected,
        }
    }

    fn assert_disjoint(state: &BleReconciler) {
        for p in state.connected() {
            assert!(
                !state.is_available(&p.id),
                "{} is both connected and available",
                p.id
            );
        }
    }

    #[test]
    fn test_unnamed_sightings_are_dropped() {
        let mut state = BleReconciler::new();
        assert_eq!(state.observe(&seen("AA", None, false)), SightingOutcome::Ignored);
        assert_eq!(state.observe(&seen("BB", Some("  "), true)), SightingOutcome::Ignored);
        assert!(state.snapshot().available.is_empty());
    }

    #[test]
    fn test_name_from_later_sighting_is_picked_up() {
        let mut state = BleReconciler::new();
        assert_eq!(state.observe(&seen("AA", None, false)), SightingOutcome::Ignored);
        assert_eq!(
            state.observe(&seen("AA", Some("Sensor"), false)),
            SightingOutcome::AddedAvailable
        );
        assert_eq!(
            state.observe(&seen("AA", Some("Sensor"), true)),
            SightingOutcome::NeedsProfile
        );
        state.insert_connected(Peripheral::connected("AA", "Sensor", None));
        assert!(state.available().is_empty());
        assert_eq!(state.connected()[0].id, "AA");
    }

    #[test]
    fn test_available_sighting_added_once() {
        let mut state = BleReconciler::new();
        assert_eq!(
            state.observe(&seen("AA", Some("Sensor"), false)),
            SightingOutcome::AddedAvailable
        );
        assert_eq!(state.observe(&seen("AA", Some("Sensor"), false)), SightingOutcome::Ignored);
        assert_eq!(state.available().len(), 1);
        assert_eq!(state.available()[0].state, ConnectionState::Available);
    }

    #[test]
    fn test_connected_sighting_is_idempotent() {
        let mut state = BleReconciler::new();
        assert_eq!(
            state.observe(&seen("AA", Some("Headset"), true)),
            SightingOutcome::NeedsProfile
        );
        assert!(state.insert_connected(Peripheral::connected("AA", "Headset", None)));

        let before = state.snapshot();
        assert_eq!(state.observe(&seen("AA", Some("Headset"), true)), SightingOutcome::Ignored);
        assert!(!state.insert_connected(Peripheral::connected("AA", "Headset", None)));
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn test_connected_sighting_moves_out_of_available() {
        let mut state = BleReconciler::new();
        state.observe(&seen("AA", Some("Headset"), false));
        state.insert_connected(Peripheral::available("AA", "Headset"));

        assert!(state.available().is_empty());
        assert_eq!(state.connected()[0].state, ConnectionState::Connected);
    }

    #[test]
    fn test_available_sighting_of_connected_id_ignored() {
        let mut state = BleReconciler::new();
        state.insert_connected(Peripheral::connected("AA", "Headset", None));
        assert_eq!(state.observe(&seen("AA", Some("Headset"), false)), SightingOutcome::Ignored);
        assert_disjoint(&state);
    }

    #[test]
    fn test_pending_profile_suppresses_repeat_sightings() {
        let mut state = BleReconciler::new();
        assert_eq!(
            state.observe(&seen("AA", Some("Headset"), true)),
            SightingOutcome::NeedsProfile
        );
        assert_eq!(state.observe(&seen("AA", Some("Headset"), true)), SightingOutcome::Ignored);
        assert_eq!(state.observe(&seen("AA", Some("Headset"), false)), SightingOutcome::Ignored);
        assert!(state.available().is_empty());

        state.insert_connected(Peripheral::connected("AA", "Headset", None));
        assert!(state.profile_pending.is_empty());
        assert_disjoint(&state);
    }

    #[test]
    fn test_abandoned_profile_is_requested_again() {
        let mut state = BleReconciler::new();
        state.observe(&seen("AA", Some("Headset"), true));
        state.abandon_profile("AA");

        assert!(state.profile_pending.is_empty());
        assert_eq!(
            state.observe(&seen("AA", Some("Headset"), true)),
            SightingOutcome::NeedsProfile
        );
    }

    #[test]
    fn test_begin_connect_preconditions() {
        let mut state = BleReconciler::new();
        assert_eq!(
            state.begin_connect("AA"),
            Err(BluetoothError::DeviceNotFound { id: "AA".into() })
        );

        state.observe(&seen("AA", Some("Sensor"), false));
        assert_eq!(state.begin_connect("AA"), Ok("Sensor".to_string()));
        assert_eq!(state.available()[0].state, ConnectionState::Connecting);
        assert_eq!(
            state.begin_connect("AA"),
            Err(BluetoothError::AlreadyConnecting { id: "AA".into() })
        );

        state.insert_connected(Peripheral::connected("BB", "Headset", None));
        assert_eq!(
            state.begin_connect("BB"),
            Err(BluetoothError::NotAvailable { id: "BB".into() })
        );
    }

    #[test]
    fn test_failed_attempt_restores_available() {
        let mut state = BleReconciler::new();
        state.observe(&seen("AA", Some("Sensor"), false));
        state.begin_connect("AA").unwrap();
        state.finish_connect("AA");

        assert!(!state.is_connecting("AA"));
        assert_eq!(state.available()[0].state, ConnectionState::Available);
        assert!(state.connected().is_empty());
    }

    #[test]
    fn test_promote_then_finish() {
        let mut state = BleReconciler::new();
        state.observe(&seen("AA", Some("Sensor"), false));
        let name = state.begin_connect("AA").unwrap();
        let profile = GattProfile::default();
        let connected = state.promote("AA", name, profile.clone());
        state.finish_connect("AA");

        assert_eq!(connected.state, ConnectionState::Connected);
        assert_eq!(connected.profile, Some(profile));
        assert!(state.available().is_empty());
        assert!(state.snapshot().connecting.is_empty());
        assert_disjoint(&state);
    }

    #[derive(Debug, Clone)]
    enum Step {
        Sight { id: u8, named: bool, connected: bool },
        Begin(u8),
        Finish(u8),
        Promote(u8),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0u8..6, any::<bool>(), any::<bool>())
                .prop_map(|(id, named, connected)| Step::Sight { id, named, connected }),
            (0u8..6).prop_map(Step::Begin),
            (0u8..6).prop_map(Step::Finish),
            (0u8..6).prop_map(Step::Promote),
        ]
    }

    proptest! {
        #[test]
        fn prop_collections_stay_disjoint(steps in prop::collection::vec(step(), 0..64)) {
            let mut state = BleReconciler::new();
            for step in steps {
                match step {
                    Step::Sight { id, named, connected } => {
                        let id = format!("{id:02X}");
                        let sighting = seen(&id, named.then_some("Device"), connected);
                        if state.observe(&sighting) == SightingOutcome::NeedsProfile {
                            state.insert_connected(Peripheral::connected(id, "Device", None));
                        }
                    }
                    Step::Begin(id) => {
                        let _ = state.begin_connect(&format!("{id:02X}"));
                    }
                    Step::Finish(id) => state.finish_connect(&format!("{id:02X}")),
                    Step::Promote(id) => {
                        let id = format!("{id:02X}");
                        if state.is_connecting(&id) {
                            state.promote(&id, "Device".into(), GattProfile::default());
                        }
                    }
                }

                for p in state.connected() {
                    prop_assert!(!state.is_available(&p.id));
                }
                let mut ids: Vec<&str> = state.connected().iter().map(|p| p.id.as_str()).collect();
                let total = ids.len();
                ids.sort_unstable();
                ids.dedup();
                prop_assert_eq!(ids.len(), total);
            }
        }
    }
}
