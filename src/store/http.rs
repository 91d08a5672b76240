// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `PutItem` over HTTP.

use std::time::Duration;

use serde::Serialize;

use crate::error::ProtocolError;
use crate::protocol::{HttpClient, HttpConfig};

use super::{Item, TelemetryRecord, TelemetryStore};

const PUT_ITEM_TARGET: &str = "DynamoDB_20120810.PutItem";

/// Configuration for [`HttpStore`].
///
/// # Examples
///
/// ```
/// use blebridge::store::HttpStoreConfig;
///
/// let config = HttpStoreConfig::new("https://dynamodb.us-east-2.amazonaws.com", "SensorData");
/// assert_eq!(config.table(), "SensorData");
/// ```
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    http: HttpConfig,
    table: String,
}

impl HttpStoreConfig {
    /// Creates a configuration for `table` behind `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            http: HttpConfig::new(endpoint),
            table: table.into(),
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Builds the store.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn build(self) -> Result<HttpStore, ProtocolError> {
        Ok(HttpStore {
            client: self.http.into_client()?,
            table: self.table,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PutItemRequest<'a> {
    table_name: &'a str,
    item: Item,
}

/// Telemetry store writing to a table endpoint with `PutItem`.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: HttpClient,
    table: String,
}

impl HttpStore {
    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }
}

impl TelemetryStore for HttpStore {
    async fn put_item(&self, record: &TelemetryRecord) -> Result<(), ProtocolError> {
        let request = PutItemRequest {
            table_name: &self.table,
            item: record.to_item(),
        };

        self.client
            .call(PUT_ITEM_TARGET, &request, Duration::ZERO)
            .await?;

        tracing::debug!(
            table = %self.table,
            sensor_id = record.sensor_id(),
            "Stored telemetry record"
        );
        Ok(())
    }
}
