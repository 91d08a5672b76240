// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Process configuration loaded from `BLEBRIDGE_*` environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `BLEBRIDGE_DEVICE_NAME` | `ESP32_BLE_Cam` |
//! | `BLEBRIDGE_SERVICE_UUID` | `4fafc201-1fb5-459e-8fcc-c5c9c331914b` |
//! | `BLEBRIDGE_CHARACTERISTIC_UUID` | `beb5483e-36e1-4688-b7f5-ea07361b26a8` |
//! | `BLEBRIDGE_ACTUATOR_UUID` | same as the characteristic |
//! | `BLEBRIDGE_SCAN_TIMEOUT_SECS` | `5` |
//! | `BLEBRIDGE_WRITE_TIMEOUT_SECS` | `5` |
//! | `BLEBRIDGE_SENSOR_ID` | `home_node_1` |
//! | `BLEBRIDGE_CYCLE_INTERVAL_MS` | `1000` |
//! | `BLEBRIDGE_WAIT_TIME_SECS` | `5` |
//! | `BLEBRIDGE_UNKNOWN_COMMAND` | `acknowledge` (or `leave`) |
//! | `BLEBRIDGE_RECONNECT` | `false` |
//! | `BLEBRIDGE_RECONNECT_MAX_RETRIES` | `5` |
//! | `BLEBRIDGE_STORE_ENDPOINT` | required |
//! | `BLEBRIDGE_TABLE_NAME` | `SensorData` |
//! | `BLEBRIDGE_QUEUE_ENDPOINT` | required |
//! | `BLEBRIDGE_QUEUE_URL` | required |
//! | `BLEBRIDGE_HTTP_TIMEOUT_SECS` | `10` |
//! | `BLEBRIDGE_LOG_LEVEL` | `info` |
//!
//! Store and queue requests are sent unsigned, so both endpoints must point
//! at a signing proxy or a local emulator.

use std::collections::HashMap;
use std::time::Duration;

use config::{Config, Environment};
use serde::Deserialize;
use uuid::Uuid;

use crate::bridge::{BridgeConfig, DEFAULT_SENSOR_ID, ReconnectionPolicy};
use crate::drain::UnknownCommandPolicy;
use crate::error::ConfigError;
use crate::link::{
    DEFAULT_CHARACTERISTIC_UUID, DEFAULT_DEVICE_NAME, DEFAULT_SERVICE_UUID, LinkConfig,
};
use crate::queue::HttpQueueConfig;
use crate::store::HttpStoreConfig;

const ENV_PREFIX: &str = "BLEBRIDGE";

/// Settings for the bridge process.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeSettings {
    /// Advertised name of the peripheral.
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// Service UUID.
    #[serde(default = "default_service_uuid")]
    pub service_uuid: String,

    /// Telemetry characteristic UUID.
    #[serde(default = "default_characteristic_uuid")]
    pub characteristic_uuid: String,

    /// Actuator characteristic UUID, when different from the telemetry one.
    #[serde(default)]
    pub actuator_uuid: Option<String>,

    /// Scan duration in seconds.
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,

    /// Write acknowledgement timeout in seconds.
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,

    /// Sensor id records are keyed by.
    #[serde(default = "default_sensor_id")]
    pub sensor_id: String,

    /// Pause between cycles in milliseconds.
    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,

    /// Command queue long-poll wait in seconds.
    #[serde(default = "default_wait_time_secs")]
    pub wait_time_secs: u64,

    /// What to do with unknown commands.
    #[serde(default)]
    pub unknown_command: UnknownCommandPolicy,

    /// Reconnect after losing the link.
    #[serde(default)]
    pub reconnect: bool,

    /// Reconnect attempts before giving up.
    #[serde(default = "default_reconnect_max_retries")]
    pub reconnect_max_retries: u32,

    /// Store endpoint.
    #[serde(default)]
    pub store_endpoint: String,

    /// Store table.
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Queue endpoint.
    #[serde(default)]
    pub queue_endpoint: String,

    /// Queue URL.
    #[serde(default)]
    pub queue_url: String,

    /// Store and queue request timeout in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Log level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_device_name() -> String {
    DEFAULT_DEVICE_NAME.to_string()
}

fn default_service_uuid() -> String {
    DEFAULT_SERVICE_UUID.to_string()
}

fn default_characteristic_uuid() -> String {
    DEFAULT_CHARACTERISTIC_UUID.to_string()
}

fn default_scan_timeout_secs() -> u64 {
    5
}

fn default_write_timeout_secs() -> u64 {
    5
}

fn default_sensor_id() -> String {
    DEFAULT_SENSOR_ID.to_string()
}

fn default_cycle_interval_ms() -> u64 {
    1000
}

fn default_wait_time_secs() -> u64 {
    5
}

fn default_reconnect_max_retries() -> u32 {
    5
}

fn default_table_name() -> String {
    "SensorData".to_string()
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ConfigError> {
    match value.trim() {
        "" => Err(ConfigError::Missing(field)),
        value => Ok(value),
    }
}

fn parse_uuid(field: &'static str, value: &str) -> Result<Uuid, ConfigError> {
    Uuid::parse_str(value.trim()).map_err(|source| ConfigError::InvalidUuid { field, source })
}

impl BridgeSettings {
    /// Loads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if a variable has the wrong type.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::with_prefix(ENV_PREFIX))
    }

    /// Loads settings from an explicit set of `BLEBRIDGE_*` variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if a variable has the wrong type.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::load(Environment::with_prefix(ENV_PREFIX).source(Some(vars)))
    }

    fn load(environment: Environment) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize::<Self>()?;
        Ok(settings)
    }

    /// Builds the link configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUuid` if a UUID setting is malformed.
    pub fn link_config(&self) -> Result<LinkConfig, ConfigError> {
        let notify = parse_uuid("characteristic_uuid", &self.characteristic_uuid)?;
        let actuator = match &self.actuator_uuid {
            Some(value) => parse_uuid("actuator_uuid", value)?,
            None => notify,
        };

        Ok(LinkConfig::new(self.device_name.clone())
            .with_service(parse_uuid("service_uuid", &self.service_uuid)?)
            .with_notify_characteristic(notify)
            .with_actuator_characteristic(actuator)
            .with_scan_timeout(Duration::from_secs(self.scan_timeout_secs))
            .with_write_timeout(Duration::from_secs(self.write_timeout_secs)))
    }

    /// Builds the bridge loop configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUuid` if a UUID setting is malformed.
    pub fn bridge_config(&self) -> Result<BridgeConfig, ConfigError> {
        let reconnection = if self.reconnect {
            ReconnectionPolicy::backoff().with_max_retries(self.reconnect_max_retries)
        } else {
            ReconnectionPolicy::disabled()
        };

        Ok(BridgeConfig::new(self.link_config()?)
            .with_sensor_id(self.sensor_id.clone())
            .with_cycle_interval(Duration::from_millis(self.cycle_interval_ms))
            .with_wait_time(Duration::from_secs(self.wait_time_secs))
            .with_unknown_policy(self.unknown_command)
            .with_reconnection(reconnection))
    }

    /// Builds the store client configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no store endpoint is set.
    pub fn store_config(&self) -> Result<HttpStoreConfig, ConfigError> {
        let endpoint = required("store_endpoint", &self.store_endpoint)?;
        Ok(HttpStoreConfig::new(endpoint, self.table_name.clone())
            .with_timeout(Duration::from_secs(self.http_timeout_secs)))
    }

    /// Builds the queue client configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the queue endpoint or URL is unset.
    pub fn queue_config(&self) -> Result<HttpQueueConfig, ConfigError> {
        let endpoint = required("queue_endpoint", &self.queue_endpoint)?;
        let queue_url = required("queue_url", &self.queue_url)?;
        Ok(HttpQueueConfig::new(endpoint, queue_url)
            .with_timeout(Duration::from_secs(self.http_timeout_secs)))
    }
}
