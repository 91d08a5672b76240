// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State change representation.
//!
//! A [`StateChange`] is one channel update extracted from a telemetry
//! notification. Applying changes to a [`DeviceState`](super::DeviceState)
//! is a merge: only the channels named by the change are overwritten.
//!
//! # Examples
//!
//! ```
//! use blebridge::state::{DeviceState, StateChange};
//! use blebridge::types::{Contact, ContactState};
//!
//! let mut state = DeviceState::new();
//!
//! // Apply returns true if state actually changed
//! let change = StateChange::contact(Contact::Front, ContactState::Open);
//! assert!(state.apply(&change));
//!
//! // Applying the same change again is a no-op
//! assert!(!state.apply(&change));
//! ```

use crate::types::{Contact, ContactState, Temperature};

/// A single update to one or more device channels.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    /// Temperature reading changed.
    Temperature(Temperature),

    /// A reed contact changed.
    Contact {
        /// Which contact.
        contact: Contact,
        /// The new state.
        state: ContactState,
    },

    /// Infrared presence sensor reported a new value.
    IrSensor(String),

    /// Multiple changes decoded from one notification.
    Batch(Vec<StateChange>),
}

impl StateChange {
    /// Creates a temperature change.
    #[must_use]
    pub fn temperature(value: Temperature) -> Self {
        Self::Temperature(value)
    }

    /// Creates a contact change.
    #[must_use]
    pub fn contact(contact: Contact, state: ContactState) -> Self {
        Self::Contact { contact, state }
    }

    /// Creates an infrared sensor change.
    #[must_use]
    pub fn ir_sensor(value: impl Into<String>) -> Self {
        Self::IrSensor(value.into())
    }

    /// Creates a batch of changes.
    #[must_use]
    pub fn batch(changes: Vec<StateChange>) -> Self {
        Self::Batch(changes)
    }

    /// Returns `true` if this change carries no updates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Batch(changes) => changes.iter().all(Self::is_empty),
            _ => false,
        }
    }

    /// Returns the number of individual channel updates in this change.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Batch(changes) => changes.iter().map(Self::len).sum(),
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_len_counts_nested_changes() {
        let change = StateChange::batch(vec![
            StateChange::ir_sensor("Object"),
            StateChange::batch(vec![
                StateChange::contact(Contact::Back, ContactState::Open),
                StateChange::temperature(Temperature::new(20.0).unwrap()),
            ]),
        ]);
        assert_eq!(change.len(), 3);
        assert!(!change.is_empty());
    }

    #[test]
    fn empty_batch_is_empty() {
        assert!(StateChange::batch(Vec::new()).is_empty());
        assert!(StateChange::batch(vec![StateChange::batch(Vec::new())]).is_empty());
        assert!(!StateChange::ir_sensor("NoObject").is_empty());
    }
}
