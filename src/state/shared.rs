// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state shared between the notification task and the bridge loop.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{DeviceState, StateChange};

/// Cloneable handle to the single authoritative [`DeviceState`].
///
/// All reads and writes go through one mutex, so a snapshot taken by the
/// sync cycle always reflects the state at a single instant: a notification
/// is applied either entirely before or entirely after it. The lock is never
/// held across an `.await`.
///
/// # Examples
///
/// ```
/// use blebridge::state::{SharedState, StateChange};
/// use blebridge::types::{Contact, ContactState};
///
/// let state = SharedState::new();
/// let writer = state.clone();
///
/// writer.apply(&StateChange::contact(Contact::Window, ContactState::Open));
/// assert_eq!(state.snapshot().contact(Contact::Window), ContactState::Open);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<DeviceState>>,
}

impl SharedState {
    /// Creates a handle over a state with every channel at its default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handle over an existing state.
    #[must_use]
    pub fn with_state(state: DeviceState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Applies a change under the lock. Returns `true` if anything changed.
    pub fn apply(&self, change: &StateChange) -> bool {
        self.inner.lock().apply(change)
    }

    /// Returns a by-value copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> DeviceState {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Temperature;

    #[test]
    fn snapshot_does_not_follow_later_updates() {
        let state = SharedState::new();
        let before = state.snapshot();

        state.apply(&StateChange::temperature(Temperature::new(18.5).unwrap()));

        assert_eq!(before, DeviceState::new());
        assert_ne!(state.snapshot(), before);
    }

    #[tokio::test]
    async fn updates_from_another_task_are_visible() {
        let state = SharedState::new();
        let writer = state.clone();

        tokio::spawn(async move {
            writer.apply(&StateChange::ir_sensor("Object"));
        })
        .await
        .unwrap();

        assert_eq!(state.snapshot().ir_sensor(), "Object");
    }
}
