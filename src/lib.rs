// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `blebridge` - A bridge between a BLE sensor peripheral and cloud services.
//!
//! The bridge connects to a single Bluetooth LE peripheral that reports
//! temperature, four reed contacts and an IR presence sensor, and that
//! drives a door actuator. It:
//!
//! - merges telemetry notifications into a shared device state
//! - persists the state to a durable key-value store whenever it changes
//! - drains operator commands from a queue and writes them to the actuator
//!
//! # Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`link`] | Peripheral discovery, connection, notifications and writes |
//! | [`telemetry`] | Decoding notification payloads |
//! | [`state`] | The device state and its shared handle |
//! | [`sync`] | Change detection against the last persisted state |
//! | [`store`] | Durable store sink (HTTP and in-memory) |
//! | [`queue`] | Command queue source (HTTP and in-memory) |
//! | [`drain`] | Executing one queued command per cycle |
//! | [`bridge`] | The loop tying everything together |
//!
//! # Quick Start
//!
//! ```no_run
//! use blebridge::bridge::{Bridge, BridgeConfig};
//! use blebridge::link::{BtleProvider, LinkConfig};
//! use blebridge::queue::HttpQueueConfig;
//! use blebridge::store::HttpStoreConfig;
//!
//! #[tokio::main]
//! async fn main() -> blebridge::Result<()> {
//!     let link = LinkConfig::new("ESP32_BLE_Cam");
//!     let provider = BtleProvider::new(link.clone()).await?;
//!     // Requests are unsigned: point these at a signing proxy or an emulator.
//!     let store = HttpStoreConfig::new("http://localhost:8000", "SensorData").build()?;
//!     let queue = HttpQueueConfig::new(
//!         "http://localhost:4566",
//!         "http://localhost:4566/000000000000/garage-door-control",
//!     )
//!     .build()?;
//!
//!     let (_stop, shutdown) = tokio::sync::watch::channel(false);
//!     let mut bridge = Bridge::new(provider, store, queue, BridgeConfig::new(link));
//!     let report = bridge.run(shutdown).await?;
//!     println!("{} cycles", report.cycles);
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod command;
pub mod config;
pub mod drain;
pub mod error;
pub mod link;
pub mod protocol;
pub mod queue;
pub mod state;
pub mod store;
pub mod sync;
pub mod telemetry;
pub mod types;

pub use bridge::{Bridge, BridgeConfig, BridgePhase, BridgeReport, ReconnectionPolicy};
pub use command::{BridgeCommand, CommandMessage};
pub use config::BridgeSettings;
pub use drain::{CommandDrain, DrainResult, UnknownCommandPolicy};
pub use error::{
    ConfigError, DrainError, Error, LinkError, ParseError, ProtocolError, Result, ValueError,
};
pub use link::{LinkConfig, LinkProvider, PeripheralLink};
pub use queue::{CommandQueue, QueueMessage, ReceiptHandle};
pub use state::{DeviceState, SharedState, StateChange};
pub use store::{TelemetryRecord, TelemetryStore};
pub use sync::{ChangeDetector, SyncResult};
pub use types::{Contact, ContactState, Temperature};
