// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Peripheral link over the host Bluetooth adapter.

use std::time::Duration;

use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::LinkError;

use super::{LinkConfig, LinkProvider, NotifyCallback, PeripheralLink};

/// Interval between looks at the adapter's peripheral list while scanning.
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(250);

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Discovers and connects to the peripheral through the first Bluetooth
/// adapter of the host.
#[derive(Debug, Clone)]
pub struct BtleProvider {
    adapter: Adapter,
    config: LinkConfig,
}

impl BtleProvider {
    /// Opens the first available adapter.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::NoAdapter` if the host has no Bluetooth adapter.
    pub async fn new(config: LinkConfig) -> Result<Self, LinkError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(LinkError::NoAdapter)?;

        Ok(Self { adapter, config })
    }

    /// Returns the link configuration.
    #[must_use]
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<PeripheralId>, LinkError> {
        for peripheral in self.adapter.peripherals().await? {
            let local_name = peripheral
                .properties()
                .await?
                .and_then(|properties| properties.local_name);
            if local_name.as_deref() == Some(name) {
                return Ok(Some(peripheral.id()));
            }
        }
        Ok(None)
    }

    async fn open_link(&self, peripheral: Peripheral) -> Result<BtleLink, LinkError> {
        peripheral.discover_services().await?;

        let link = BtleLink {
            peripheral,
            service_uuid: self.config.service_uuid(),
            write_timeout: self.config.write_timeout(),
            subscriptions: Vec::new(),
            notify_tasks: Vec::new(),
        };

        // Both characteristics must exist before the link is handed out.
        link.characteristic(self.config.notify_characteristic())?;
        link.characteristic(self.config.actuator_characteristic())?;

        Ok(link)
    }
}

impl LinkProvider for BtleProvider {
    type Address = PeripheralId;
    type Link = BtleLink;

    async fn discover(&self, name: &str) -> Result<PeripheralId, LinkError> {
        let scan_timeout = self.config.scan_timeout();
        tracing::info!(name, scan_ms = millis(scan_timeout), "Scanning for peripheral");

        self.adapter.start_scan(ScanFilter::default()).await?;

        let deadline = Instant::now() + scan_timeout;
        let found = loop {
            match self.find_by_name(name).await {
                Ok(Some(id)) => break Ok(Some(id)),
                Ok(None) if Instant::now() >= deadline => break Ok(None),
                Ok(None) => tokio::time::sleep(SCAN_POLL_INTERVAL).await,
                Err(e) => break Err(e),
            }
        };

        if let Err(e) = self.adapter.stop_scan().await {
            tracing::debug!(error = %e, "Failed to stop scan");
        }

        match found? {
            Some(id) => {
                tracing::info!(name, peripheral = ?id, "Peripheral found");
                Ok(id)
            }
            None => Err(LinkError::NotFound {
                name: name.to_string(),
                scan_ms: millis(scan_timeout),
            }),
        }
    }

    async fn connect(&self, address: &PeripheralId) -> Result<BtleLink, LinkError> {
        let peripheral = self.adapter.peripheral(address).await?;

        peripheral
            .connect()
            .await
            .map_err(|e| LinkError::ConnectionFailed(e.to_string()))?;
        tracing::info!(peripheral = ?address, "Connected");

        let opened = self.open_link(peripheral.clone()).await;
        disconnect_on_error(opened, || async {
            peripheral.disconnect().await.map_err(LinkError::from)
        })
        .await
    }
}

/// Runs `disconnect` when setting up a connected peripheral failed, so the
/// peripheral is free for the next attempt. The setup error is returned.
async fn disconnect_on_error<T, F, Fut>(
    opened: Result<T, LinkError>,
    disconnect: F,
) -> Result<T, LinkError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), LinkError>>,
{
    if let Err(e) = &opened {
        tracing::warn!(error = %e, "Link setup failed, disconnecting");
        if let Err(e) = disconnect().await {
            tracing::warn!(error = %e, "Failed to disconnect after setup failure");
        }
    }
    opened
}

/// A connected peripheral.
///
/// Notification tasks are aborted when the link is disconnected or dropped.
#[derive(Debug)]
pub struct BtleLink {
    peripheral: Peripheral,
    service_uuid: Uuid,
    write_timeout: Duration,
    subscriptions: Vec<Characteristic>,
    notify_tasks: Vec<JoinHandle<()>>,
}

impl BtleLink {
    fn characteristic(&self, uuid: Uuid) -> Result<Characteristic, LinkError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid && c.service_uuid == self.service_uuid)
            .ok_or(LinkError::CharacteristicNotFound(uuid))
    }

    fn abort_notify_tasks(&mut self) {
        for task in self.notify_tasks.drain(..) {
            task.abort();
        }
    }
}

impl PeripheralLink for BtleLink {
    async fn subscribe(
        &mut self,
        characteristic: Uuid,
        on_notify: NotifyCallback,
    ) -> Result<(), LinkError> {
        let target = self.characteristic(characteristic)?;

        let mut stream = self.peripheral.notifications().await?;
        self.peripheral.subscribe(&target).await?;
        self.subscriptions.push(target);

        let task = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid == characteristic {
                    on_notify(&notification.value);
                }
            }
            tracing::debug!(%characteristic, "Notification stream ended");
        });
        self.notify_tasks.push(task);

        tracing::debug!(%characteristic, "Subscribed to notifications");
        Ok(())
    }

    async fn write(&self, characteristic: Uuid, payload: &[u8]) -> Result<(), LinkError> {
        let target = self.characteristic(characteristic)?;

        tokio::time::timeout(
            self.write_timeout,
            self.peripheral
                .write(&target, payload, WriteType::WithResponse),
        )
        .await
        .map_err(|_| LinkError::Timeout(millis(self.write_timeout)))??;

        tracing::debug!(%characteristic, bytes = payload.len(), "Wrote characteristic");
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn disconnect(&mut self) -> Result<(), LinkError> {
        self.abort_notify_tasks();

        for characteristic in std::mem::take(&mut self.subscriptions) {
            if let Err(e) = self.peripheral.unsubscribe(&characteristic).await {
                tracing::debug!(uuid = %characteristic.uuid, error = %e, "Unsubscribe failed");
            }
        }

        if self.peripheral.is_connected().await.unwrap_or(false) {
            self.peripheral.disconnect().await?;
        }
        tracing::info!(peripheral = ?self.peripheral.id(), "Disconnected");
        Ok(())
    }
}

impl Drop for BtleLink {
    fn drop(&mut self) {
        self.abort_notify_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn failed_setup_disconnects() {
        let disconnects = AtomicUsize::new(0);

        let opened: Result<(), LinkError> = Err(LinkError::CharacteristicNotFound(Uuid::nil()));
        let result = disconnect_on_error(opened, || async {
            disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(LinkError::CharacteristicNotFound(_))));
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_disconnect_keeps_setup_error() {
        let opened: Result<(), LinkError> = Err(LinkError::Btle(btleplug::Error::DeviceNotFound));
        let result =
            disconnect_on_error(opened, || async { Err(LinkError::Disconnected) }).await;

        assert!(matches!(
            result,
            Err(LinkError::Btle(btleplug::Error::DeviceNotFound))
        ));
    }

    #[tokio::test]
    async fn successful_setup_keeps_connection() {
        let disconnects = AtomicUsize::new(0);

        let result = disconnect_on_error(Ok(7), || async {
            disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(disconnects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
