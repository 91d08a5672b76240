// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Durable store for telemetry records.
//!
//! The store is a put-item sink keyed by sensor id: each write fully
//! replaces the previous record for that sensor. Two implementations are
//! provided:
//!
//! - [`HttpStore`]: `PutItem` against a JSON-protocol table endpoint
//! - [`MemoryStore`]: in-process map, used for dry runs and tests

mod http;
mod memory;
mod record;

pub use http::{HttpStore, HttpStoreConfig};
pub use memory::MemoryStore;
pub use record::{AttributeValue, Item, TelemetryRecord, attr};

use crate::error::ProtocolError;

/// A sink that durably records telemetry snapshots.
#[allow(async_fn_in_trait)]
pub trait TelemetryStore {
    /// Writes a record, replacing any previous record for the same sensor.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the write was not confirmed. The caller
    /// must treat the record as not persisted.
    async fn put_item(&self, record: &TelemetryRecord) -> Result<(), ProtocolError>;
}
