// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change-detection sync of device state to the durable store.
//!
//! A [`ChangeDetector`] remembers the last state it persisted successfully.
//! Each call to [`ChangeDetector::maybe_sync`] compares the current state
//! with it and writes a record only when they differ. A failed write leaves
//! the remembered state untouched, so the next call retries the same
//! difference.

use chrono::{DateTime, Utc};

use crate::error::ProtocolError;
use crate::state::DeviceState;
use crate::store::{TelemetryRecord, TelemetryStore};

/// Outcome of one sync attempt.
#[derive(Debug)]
pub enum SyncResult {
    /// The state equals the last persisted one; nothing was written.
    Unchanged,
    /// The state differed and was persisted.
    Synced(TelemetryRecord),
    /// The state differed but the write failed.
    SyncFailed(ProtocolError),
}

impl SyncResult {
    /// Returns true if a record was persisted.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced(_))
    }
}

/// Tracks the last persisted state for one sensor.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    sensor_id: String,
    last_synced: Option<DeviceState>,
}

impl ChangeDetector {
    /// Creates a detector that has not persisted anything yet.
    ///
    /// The first sync always writes.
    #[must_use]
    pub fn new(sensor_id: impl Into<String>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            last_synced: None,
        }
    }

    /// Returns the sensor id records are keyed by.
    #[must_use]
    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    /// Returns the last successfully persisted state.
    #[must_use]
    pub fn last_synced(&self) -> Option<&DeviceState> {
        self.last_synced.as_ref()
    }

    /// Persists `current` if it differs from the last persisted state,
    /// timestamped now.
    pub async fn maybe_sync<S: TelemetryStore>(
        &mut self,
        current: &DeviceState,
        store: &S,
    ) -> SyncResult {
        self.maybe_sync_at(current, store, Utc::now()).await
    }

    /// Same as [`maybe_sync`](Self::maybe_sync) with an explicit timestamp.
    pub async fn maybe_sync_at<S: TelemetryStore>(
        &mut self,
        current: &DeviceState,
        store: &S,
        now: DateTime<Utc>,
    ) -> SyncResult {
        if self.last_synced.as_ref() == Some(current) {
            return SyncResult::Unchanged;
        }

        let record = TelemetryRecord::new(self.sensor_id.clone(), now, current.clone());
        match store.put_item(&record).await {
            Ok(()) => {
                tracing::info!(
                    sensor_id = %self.sensor_id,
                    temp = %current.temperature(),
                    ir_sensor = current.ir_sensor(),
                    "Persisted state change"
                );
                self.last_synced = Some(current.clone());
                SyncResult::Synced(record)
            }
            Err(e) => {
                tracing::warn!(
                    sensor_id = %self.sensor_id,
                    error = %e,
                    "Failed to persist state, will retry next cycle"
                );
                SyncResult::SyncFailed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{Contact, ContactState, Temperature};

    fn temp(value: f64) -> Temperature {
        Temperature::new(value).unwrap()
    }

    #[tokio::test]
    async fn first_sync_always_persists() {
        let store = MemoryStore::new();
        let mut detector = ChangeDetector::new("esp32_cam_01");

        let result = detector.maybe_sync(&DeviceState::default(), &store).await;

        assert!(result.is_synced());
        assert_eq!(store.put_count(), 1);
        assert_eq!(detector.last_synced(), Some(&DeviceState::default()));
    }

    #[tokio::test]
    async fn equal_state_is_not_persisted_again() {
        let store = MemoryStore::new();
        let mut detector = ChangeDetector::new("esp32_cam_01");
        let state = DeviceState::default();

        detector.maybe_sync(&state, &store).await;
        for _ in 0..3 {
            assert!(matches!(
                detector.maybe_sync(&state, &store).await,
                SyncResult::Unchanged
            ));
        }
        assert_eq!(store.put_count(), 1);
    }

    #[tokio::test]
    async fn temperature_change_persists_full_record() {
        let store = MemoryStore::new();
        let mut detector = ChangeDetector::new("esp32_cam_01");
        let mut state = DeviceState::default();
        detector.maybe_sync(&state, &store).await;

        state.set_temperature(temp(72.5));
        let now = "2025-06-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let result = detector.maybe_sync_at(&state, &store, now).await;

        let SyncResult::Synced(record) = result else {
            panic!("expected Synced, got {result:?}");
        };
        assert_eq!(record.timestamp(), now);
        assert_eq!(record.state().temperature(), temp(72.5));

        let stored = store.get("esp32_cam_01").unwrap();
        assert_eq!(stored.state(), &state);
        assert_eq!(stored.state().contact(Contact::Garage), ContactState::Closed);
        assert_eq!(store.put_count(), 2);
    }

    #[tokio::test]
    async fn failed_write_is_retried_with_same_state() {
        let store = MemoryStore::new();
        let mut detector = ChangeDetector::new("esp32_cam_01");
        detector.maybe_sync(&DeviceState::default(), &store).await;

        let mut state = DeviceState::default();
        state.set_contact(Contact::Front, ContactState::Open);

        store.fail_next(1);
        let result = detector.maybe_sync(&state, &store).await;
        assert!(matches!(result, SyncResult::SyncFailed(_)));
        assert_eq!(detector.last_synced(), Some(&DeviceState::default()));

        let result = detector.maybe_sync(&state, &store).await;
        assert!(result.is_synced());
        assert_eq!(detector.last_synced(), Some(&state));
        assert_eq!(
            store.get("esp32_cam_01").unwrap().state().contact(Contact::Front),
            ContactState::Open
        );
    }

    #[tokio::test]
    async fn change_and_revert_before_sync_is_not_persisted() {
        let store = MemoryStore::new();
        let mut detector = ChangeDetector::new("esp32_cam_01");
        let mut state = DeviceState::default();
        detector.maybe_sync(&state, &store).await;

        state.set_ir_sensor("Person");
        state.set_ir_sensor("NoObject");

        assert!(matches!(
            detector.maybe_sync(&state, &store).await,
            SyncResult::Unchanged
        ));
        assert_eq!(store.put_count(), 1);
    }
}
