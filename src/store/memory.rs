// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process telemetry store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::{ParseError, ProtocolError};

use super::{Item, TelemetryRecord, TelemetryStore};

/// Telemetry store kept in memory.
///
/// Items are stored in their encoded form, exactly as a remote store would
/// receive them, so reading back goes through the same decoding path.
/// Writes can be made to fail on demand to exercise retry behavior.
///
/// # Examples
///
/// ```
/// use blebridge::state::DeviceState;
/// use blebridge::store::{MemoryStore, TelemetryRecord, TelemetryStore};
///
/// # tokio_test_block(async {
/// let store = MemoryStore::new();
/// store.put_item(&TelemetryRecord::capture("n1", &DeviceState::new())).await.unwrap();
///
/// assert_eq!(store.put_count(), 1);
/// assert!(store.get("n1").is_some());
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    items: Arc<Mutex<HashMap<String, Item>>>,
    puts: Arc<AtomicUsize>,
    failures_remaining: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` writes fail.
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Returns the number of write attempts, failed ones included.
    #[must_use]
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Returns the raw stored item for a sensor.
    #[must_use]
    pub fn get_item(&self, sensor_id: &str) -> Option<Item> {
        self.items.lock().get(sensor_id).cloned()
    }

    /// Returns the decoded record for a sensor.
    ///
    /// Returns `None` if nothing is stored or the item does not decode.
    #[must_use]
    pub fn get(&self, sensor_id: &str) -> Option<TelemetryRecord> {
        self.try_get(sensor_id).ok().flatten()
    }

    /// Returns the decoded record for a sensor, surfacing decode errors.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the stored item is malformed.
    pub fn try_get(&self, sensor_id: &str) -> Result<Option<TelemetryRecord>, ParseError> {
        self.get_item(sensor_id)
            .map(|item| TelemetryRecord::from_item(&item))
            .transpose()
    }

    fn take_failure(&self) -> bool {
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl TelemetryStore for MemoryStore {
    async fn put_item(&self, record: &TelemetryRecord) -> Result<(), ProtocolError> {
        self.puts.fetch_add(1, Ordering::SeqCst);

        if self.take_failure() {
            return Err(ProtocolError::Unavailable("injected store failure".into()));
        }

        self.items
            .lock()
            .insert(record.sensor_id().to_string(), record.to_item());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DeviceState, StateChange};
    use crate::types::{Contact, ContactState};

    #[tokio::test]
    async fn put_overwrites_previous_item() {
        let store = MemoryStore::new();
        let mut state = DeviceState::new();

        store
            .put_item(&TelemetryRecord::capture("n1", &state))
            .await
            .unwrap();
        state.apply(&StateChange::contact(Contact::Back, ContactState::Open));
        store
            .put_item(&TelemetryRecord::capture("n1", &state))
            .await
            .unwrap();

        assert_eq!(store.put_count(), 2);
        assert_eq!(store.get("n1").unwrap().state(), &state);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = MemoryStore::new();
        store.fail_next(1);
        let record = TelemetryRecord::capture("n1", &DeviceState::new());

        assert!(store.put_item(&record).await.is_err());
        assert!(store.get("n1").is_none());

        assert!(store.put_item(&record).await.is_ok());
        assert!(store.get("n1").is_some());
        assert_eq!(store.put_count(), 2);
    }
}
