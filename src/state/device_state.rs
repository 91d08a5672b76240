// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state tracking.

use crate::types::{Contact, ContactState, Temperature};

use super::StateChange;

/// Default value of the infrared presence channel before first telemetry.
pub const IR_SENSOR_DEFAULT: &str = "NoObject";

/// Last-known state of every sensor channel on the peripheral.
///
/// Every channel has a value from construction on, so a snapshot is always
/// complete and can be persisted as-is. Equality is structural and is what
/// change detection compares.
///
/// # Examples
///
/// ```
/// use blebridge::state::DeviceState;
/// use blebridge::types::{Contact, ContactState};
///
/// let state = DeviceState::new();
/// assert_eq!(state.contact(Contact::Garage), ContactState::Closed);
/// assert_eq!(state.ir_sensor(), "NoObject");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    temperature: Temperature,
    reed_front: ContactState,
    reed_back: ContactState,
    reed_garage: ContactState,
    reed_window: ContactState,
    ir_sensor: String,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            temperature: Temperature::default(),
            reed_front: ContactState::Closed,
            reed_back: ContactState::Closed,
            reed_garage: ContactState::Closed,
            reed_window: ContactState::Closed,
            ir_sensor: IR_SENSOR_DEFAULT.to_string(),
        }
    }
}

impl DeviceState {
    /// Creates a state with every channel at its default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the temperature reading.
    #[must_use]
    pub fn temperature(&self) -> Temperature {
        self.temperature
    }

    /// Sets the temperature reading.
    pub fn set_temperature(&mut self, value: Temperature) {
        self.temperature = value;
    }

    /// Gets the state of a reed contact.
    #[must_use]
    pub fn contact(&self, contact: Contact) -> ContactState {
        *self.contact_slot(contact)
    }

    /// Sets the state of a reed contact.
    pub fn set_contact(&mut self, contact: Contact, state: ContactState) {
        *self.contact_slot_mut(contact) = state;
    }

    /// Returns all contacts with their states, in record order.
    #[must_use]
    pub fn contacts(&self) -> [(Contact, ContactState); 4] {
        Contact::ALL.map(|c| (c, self.contact(c)))
    }

    /// Gets the infrared presence value.
    #[must_use]
    pub fn ir_sensor(&self) -> &str {
        &self.ir_sensor
    }

    /// Sets the infrared presence value.
    pub fn set_ir_sensor(&mut self, value: impl Into<String>) {
        self.ir_sensor = value.into();
    }

    fn contact_slot(&self, contact: Contact) -> &ContactState {
        match contact {
            Contact::Front => &self.reed_front,
            Contact::Back => &self.reed_back,
            Contact::Garage => &self.reed_garage,
            Contact::Window => &self.reed_window,
        }
    }

    fn contact_slot_mut(&mut self, contact: Contact) -> &mut ContactState {
        match contact {
            Contact::Front => &mut self.reed_front,
            Contact::Back => &mut self.reed_back,
            Contact::Garage => &mut self.reed_garage,
            Contact::Window => &mut self.reed_window,
        }
    }

    /// Applies a state change.
    ///
    /// Only the channels named by the change are overwritten. Returns `true`
    /// if any channel value actually changed.
    pub fn apply(&mut self, change: &StateChange) -> bool {
        match change {
            StateChange::Temperature(value) => {
                if self.temperature == *value {
                    false
                } else {
                    self.temperature = *value;
                    true
                }
            }
            StateChange::Contact { contact, state } => {
                let slot = self.contact_slot_mut(*contact);
                if slot == state {
                    false
                } else {
                    *slot = *state;
                    true
                }
            }
            StateChange::IrSensor(value) => {
                if self.ir_sensor == *value {
                    false
                } else {
                    self.ir_sensor.clone_from(value);
                    true
                }
            }
            StateChange::Batch(changes) => {
                let mut changed = false;
                for change in changes {
                    changed |= self.apply(change);
                }
                changed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_front() -> StateChange {
        StateChange::contact(Contact::Front, ContactState::Open)
    }

    #[test]
    fn new_state_has_defaults() {
        let state = DeviceState::new();
        assert_eq!(state.temperature(), Temperature::default());
        for (_, contact_state) in state.contacts() {
            assert_eq!(contact_state, ContactState::Closed);
        }
        assert_eq!(state.ir_sensor(), IR_SENSOR_DEFAULT);
    }

    #[test]
    fn apply_contact_change() {
        let mut state = DeviceState::new();
        assert!(state.apply(&open_front()));
        assert_eq!(state.contact(Contact::Front), ContactState::Open);
        assert_eq!(state.contact(Contact::Back), ContactState::Closed);
    }

    #[test]
    fn apply_is_idempotent() {
        let update = StateChange::batch(vec![
            open_front(),
            StateChange::temperature(Temperature::new(22.25).unwrap()),
            StateChange::ir_sensor("Object"),
        ]);

        let mut once = DeviceState::new();
        once.apply(&update);

        let mut twice = DeviceState::new();
        twice.apply(&update);
        let changed_again = twice.apply(&update);

        assert!(!changed_again);
        assert_eq!(once, twice);
    }

    #[test]
    fn apply_merges_without_touching_absent_channels() {
        let mut state = DeviceState::new();
        state.apply(&StateChange::temperature(Temperature::new(30.0).unwrap()));
        state.apply(&open_front());

        assert_eq!(state.temperature().value(), 30.0);
        assert_eq!(state.contact(Contact::Front), ContactState::Open);
    }

    #[test]
    fn apply_batch_reports_change_if_any_member_changed() {
        let mut state = DeviceState::new();
        let batch = StateChange::batch(vec![
            StateChange::contact(Contact::Back, ContactState::Closed),
            StateChange::ir_sensor("Object"),
        ]);
        assert!(state.apply(&batch));
    }

    #[test]
    fn clones_are_independent() {
        let mut state = DeviceState::new();
        let snapshot = state.clone();
        state.apply(&open_front());
        assert_ne!(state, snapshot);
        assert_eq!(snapshot.contact(Contact::Front), ContactState::Closed);
    }
}
