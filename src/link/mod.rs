// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The physical link to the peripheral.
//!
//! The link is split in two traits:
//!
//! - [`LinkProvider`] finds a peripheral by advertised name and connects to it
//! - [`PeripheralLink`] is the live connection: notifications, writes and
//!   release
//!
//! [`BtleProvider`] and [`BtleLink`] implement them over the host's
//! Bluetooth adapter. Nothing outside this module touches the raw
//! connection; the bridge only sees the trait operations.

mod btle;

pub use btle::{BtleLink, BtleProvider};

use std::fmt;
use std::time::Duration;

use uuid::Uuid;

use crate::error::LinkError;

/// Service UUID exposed by the peripheral firmware.
pub const DEFAULT_SERVICE_UUID: Uuid = Uuid::from_u128(0x4faf_c201_1fb5_459e_8fcc_c5c9_c331_914b);

/// Characteristic used both for telemetry notifications and command writes.
pub const DEFAULT_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0xbeb5_483e_36e1_4688_b7f5_ea07_361b_26a8);

/// Advertised name of the peripheral.
pub const DEFAULT_DEVICE_NAME: &str = "ESP32_BLE_Cam";

/// Configuration of the peripheral link.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use blebridge::link::LinkConfig;
///
/// let config = LinkConfig::new("ESP32_BLE_Front")
///     .with_scan_timeout(Duration::from_secs(10));
///
/// assert_eq!(config.device_name(), "ESP32_BLE_Front");
/// assert_eq!(config.notify_characteristic(), config.actuator_characteristic());
/// ```
#[derive(Debug, Clone)]
pub struct LinkConfig {
    device_name: String,
    service_uuid: Uuid,
    notify_characteristic: Uuid,
    actuator_characteristic: Uuid,
    scan_timeout: Duration,
    write_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_NAME)
    }
}

impl LinkConfig {
    /// Default scan duration.
    pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(5);
    /// Default write acknowledgement timeout.
    pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a configuration for the peripheral advertising as `device_name`.
    #[must_use]
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            service_uuid: DEFAULT_SERVICE_UUID,
            notify_characteristic: DEFAULT_CHARACTERISTIC_UUID,
            actuator_characteristic: DEFAULT_CHARACTERISTIC_UUID,
            scan_timeout: Self::DEFAULT_SCAN_TIMEOUT,
            write_timeout: Self::DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Sets the service UUID.
    #[must_use]
    pub fn with_service(mut self, uuid: Uuid) -> Self {
        self.service_uuid = uuid;
        self
    }

    /// Sets the characteristic telemetry is received on.
    #[must_use]
    pub fn with_notify_characteristic(mut self, uuid: Uuid) -> Self {
        self.notify_characteristic = uuid;
        self
    }

    /// Sets the characteristic commands are written to.
    #[must_use]
    pub fn with_actuator_characteristic(mut self, uuid: Uuid) -> Self {
        self.actuator_characteristic = uuid;
        self
    }

    /// Sets the scan duration.
    #[must_use]
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Sets the write acknowledgement timeout.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Returns the advertised name to look for.
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Returns the service UUID.
    #[must_use]
    pub fn service_uuid(&self) -> Uuid {
        self.service_uuid
    }

    /// Returns the notification characteristic UUID.
    #[must_use]
    pub fn notify_characteristic(&self) -> Uuid {
        self.notify_characteristic
    }

    /// Returns the actuator characteristic UUID.
    #[must_use]
    pub fn actuator_characteristic(&self) -> Uuid {
        self.actuator_characteristic
    }

    /// Returns the scan duration.
    #[must_use]
    pub fn scan_timeout(&self) -> Duration {
        self.scan_timeout
    }

    /// Returns the write timeout.
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }
}

/// Callback invoked once per inbound notification with the raw payload.
pub type NotifyCallback = Box<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// Discovers and connects to peripherals.
#[allow(async_fn_in_trait)]
pub trait LinkProvider {
    /// Identifies a discovered peripheral.
    type Address: Clone + fmt::Debug;
    /// The live connection type.
    type Link: PeripheralLink;

    /// Scans for a bounded time and returns the first advertiser whose name
    /// matches exactly.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::NotFound` if the scan completes without a match.
    async fn discover(&self, name: &str) -> Result<Self::Address, LinkError>;

    /// Connects and discovers services and characteristics.
    ///
    /// # Errors
    ///
    /// Returns `LinkError` if the connection cannot be established or the
    /// configured characteristics are missing.
    async fn connect(&self, address: &Self::Address) -> Result<Self::Link, LinkError>;
}

/// A live connection to the peripheral.
///
/// The physical link does not support concurrent operations; callers issue
/// one write at a time.
#[allow(async_fn_in_trait)]
pub trait PeripheralLink {
    /// Subscribes to notifications on `characteristic`.
    ///
    /// `on_notify` runs on a dedicated task, once per notification, and
    /// never blocks the caller.
    ///
    /// # Errors
    ///
    /// Returns `LinkError` if the subscription fails.
    async fn subscribe(
        &mut self,
        characteristic: Uuid,
        on_notify: NotifyCallback,
    ) -> Result<(), LinkError>;

    /// Writes `payload` and waits for the peripheral to acknowledge it.
    ///
    /// # Errors
    ///
    /// Returns `LinkError` if the write fails or is not acknowledged in time.
    async fn write(&self, characteristic: Uuid, payload: &[u8]) -> Result<(), LinkError>;

    /// Returns true while the link is up.
    async fn is_connected(&self) -> bool;

    /// Unsubscribes and closes the link.
    ///
    /// # Errors
    ///
    /// Returns `LinkError` if the peripheral could not be released cleanly.
    async fn disconnect(&mut self) -> Result<(), LinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uuids_match_firmware() {
        assert_eq!(
            DEFAULT_SERVICE_UUID.to_string(),
            "4fafc201-1fb5-459e-8fcc-c5c9c331914b"
        );
        assert_eq!(
            DEFAULT_CHARACTERISTIC_UUID.to_string(),
            "beb5483e-36e1-4688-b7f5-ea07361b26a8"
        );
    }

    #[test]
    fn config_builder() {
        let notify = Uuid::from_u128(1);
        let actuator = Uuid::from_u128(2);
        let config = LinkConfig::default()
            .with_notify_characteristic(notify)
            .with_actuator_characteristic(actuator)
            .with_write_timeout(Duration::from_millis(750));

        assert_eq!(config.device_name(), DEFAULT_DEVICE_NAME);
        assert_eq!(config.notify_characteristic(), notify);
        assert_eq!(config.actuator_characteristic(), actuator);
        assert_eq!(config.write_timeout(), Duration::from_millis(750));
        assert_eq!(config.scan_timeout(), LinkConfig::DEFAULT_SCAN_TIMEOUT);
    }
}
