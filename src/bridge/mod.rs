// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The bridge loop tying the peripheral, the store and the queue together.
//!
//! A [`Bridge`] moves through these phases:
//!
//! ```text
//! Discovering -> Connecting -> Subscribing -> Running -> ShuttingDown
//!                                               |  ^
//!                                               v  |
//!                                           Reconnecting
//! ```
//!
//! While running, each cycle syncs the device state to the store, then
//! drains at most one command, then sleeps for the cycle interval.
//! Telemetry arrives concurrently on the notification task and is merged
//! into the shared state. A shutdown request is observed between cycles and
//! during the sleep, so a write or persist in progress always completes.
//! The link is released on every exit path.

mod policy;

pub use policy::ReconnectionPolicy;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;

use crate::drain::{CommandDrain, DrainResult, UnknownCommandPolicy};
use crate::error::{LinkError, Result};
use crate::link::{LinkConfig, LinkProvider, NotifyCallback, PeripheralLink};
use crate::queue::CommandQueue;
use crate::state::SharedState;
use crate::store::TelemetryStore;
use crate::sync::{ChangeDetector, SyncResult};
use crate::telemetry;

/// Sensor id records are keyed by unless configured otherwise.
pub const DEFAULT_SENSOR_ID: &str = "home_node_1";

/// Lifecycle phase of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgePhase {
    /// Created, not started.
    Idle,
    /// Scanning for the peripheral.
    Discovering,
    /// Connecting and discovering characteristics.
    Connecting,
    /// Registering for telemetry notifications.
    Subscribing,
    /// Running sync/drain cycles.
    Running,
    /// Re-establishing a lost link.
    Reconnecting,
    /// Releasing the link.
    ShuttingDown,
    /// The loop has exited.
    Stopped,
}

impl fmt::Display for BridgePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Discovering => "discovering",
            Self::Connecting => "connecting",
            Self::Subscribing => "subscribing",
            Self::Running => "running",
            Self::Reconnecting => "reconnecting",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Configuration of the bridge loop.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use blebridge::bridge::{BridgeConfig, ReconnectionPolicy};
/// use blebridge::link::LinkConfig;
///
/// let config = BridgeConfig::new(LinkConfig::new("ESP32_BLE_Front"))
///     .with_sensor_id("garage_node")
///     .with_cycle_interval(Duration::from_millis(500))
///     .with_reconnection(ReconnectionPolicy::backoff());
///
/// assert_eq!(config.sensor_id(), "garage_node");
/// assert!(config.reconnection().enabled);
/// ```
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    link: LinkConfig,
    sensor_id: String,
    cycle_interval: Duration,
    wait_time: Duration,
    unknown_policy: UnknownCommandPolicy,
    reconnection: ReconnectionPolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new(LinkConfig::default())
    }
}

impl BridgeConfig {
    /// Default pause between cycles.
    pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_secs(1);

    /// Creates a configuration for the given link.
    #[must_use]
    pub fn new(link: LinkConfig) -> Self {
        Self {
            link,
            sensor_id: DEFAULT_SENSOR_ID.to_string(),
            cycle_interval: Self::DEFAULT_CYCLE_INTERVAL,
            wait_time: CommandDrain::DEFAULT_WAIT_TIME,
            unknown_policy: UnknownCommandPolicy::default(),
            reconnection: ReconnectionPolicy::default(),
        }
    }

    /// Sets the sensor id records are keyed by.
    #[must_use]
    pub fn with_sensor_id(mut self, sensor_id: impl Into<String>) -> Self {
        self.sensor_id = sensor_id.into();
        self
    }

    /// Sets the pause between cycles.
    #[must_use]
    pub fn with_cycle_interval(mut self, interval: Duration) -> Self {
        self.cycle_interval = interval;
        self
    }

    /// Sets the command queue long-poll wait.
    #[must_use]
    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    /// Sets the unknown command policy.
    #[must_use]
    pub fn with_unknown_policy(mut self, policy: UnknownCommandPolicy) -> Self {
        self.unknown_policy = policy;
        self
    }

    /// Sets the reconnection policy.
    #[must_use]
    pub fn with_reconnection(mut self, policy: ReconnectionPolicy) -> Self {
        self.reconnection = policy;
        self
    }

    /// Returns the link configuration.
    #[must_use]
    pub fn link(&self) -> &LinkConfig {
        &self.link
    }

    /// Returns the sensor id.
    #[must_use]
    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    /// Returns the pause between cycles.
    #[must_use]
    pub fn cycle_interval(&self) -> Duration {
        self.cycle_interval
    }

    /// Returns the command queue long-poll wait.
    #[must_use]
    pub fn wait_time(&self) -> Duration {
        self.wait_time
    }

    /// Returns the unknown command policy.
    #[must_use]
    pub fn unknown_policy(&self) -> UnknownCommandPolicy {
        self.unknown_policy
    }

    /// Returns the reconnection policy.
    #[must_use]
    pub fn reconnection(&self) -> &ReconnectionPolicy {
        &self.reconnection
    }
}

/// Counters collected over one run of the bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeReport {
    /// Completed sync/drain cycles.
    pub cycles: u64,
    /// Records persisted.
    pub synced: u64,
    /// Persist attempts that failed.
    pub sync_failures: u64,
    /// Commands written and acknowledged.
    pub commands_executed: u64,
    /// Messages naming unknown commands.
    pub commands_ignored: u64,
    /// Drain attempts that failed.
    pub drain_failures: u64,
    /// Telemetry notifications merged into the state.
    pub telemetry_applied: u64,
    /// Telemetry notifications discarded as malformed.
    pub telemetry_rejected: u64,
    /// Successful reconnections.
    pub reconnects: u64,
}

#[derive(Debug, Default)]
struct TelemetryCounters {
    applied: AtomicU64,
    rejected: AtomicU64,
}

/// Bridges one peripheral to a store and a command queue.
pub struct Bridge<P, S, Q> {
    provider: P,
    store: S,
    queue: Q,
    config: BridgeConfig,
    state: SharedState,
    detector: ChangeDetector,
    drain: CommandDrain,
    telemetry: Arc<TelemetryCounters>,
    phase: watch::Sender<BridgePhase>,
}

impl<P, S, Q> Bridge<P, S, Q>
where
    P: LinkProvider,
    S: TelemetryStore,
    Q: CommandQueue,
{
    /// Creates a bridge with a default device state.
    pub fn new(provider: P, store: S, queue: Q, config: BridgeConfig) -> Self {
        let detector = ChangeDetector::new(config.sensor_id());
        let drain = CommandDrain::new(config.link().actuator_characteristic())
            .with_wait_time(config.wait_time())
            .with_unknown_policy(config.unknown_policy());
        let (phase, _) = watch::channel(BridgePhase::Idle);

        Self {
            provider,
            store,
            queue,
            config,
            state: SharedState::new(),
            detector,
            drain,
            telemetry: Arc::new(TelemetryCounters::default()),
            phase,
        }
    }

    /// Returns the shared device state.
    #[must_use]
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> BridgePhase {
        *self.phase.borrow()
    }

    /// Subscribes to phase transitions.
    #[must_use]
    pub fn watch_phase(&self) -> watch::Receiver<BridgePhase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, phase: BridgePhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            tracing::info!(from = %previous, to = %phase, "Bridge phase changed");
        }
    }

    /// Runs the bridge until `shutdown` turns true, its sender is dropped,
    /// or the link is lost for good.
    ///
    /// # Errors
    ///
    /// Returns `Error::Link` if the peripheral cannot be discovered or
    /// connected, or if the link is lost and the reconnection policy gives
    /// up. Telemetry, store and queue failures never end the loop.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<BridgeReport> {
        let mut report = BridgeReport::default();

        self.set_phase(BridgePhase::Discovering);
        let address = match self.provider.discover(self.config.link.device_name()).await {
            Ok(address) => address,
            Err(e) => {
                self.set_phase(BridgePhase::Stopped);
                return Err(e.into());
            }
        };

        let mut link = match self.establish(&address).await {
            Ok(link) => link,
            Err(e) => {
                self.set_phase(BridgePhase::Stopped);
                return Err(e.into());
            }
        };

        self.set_phase(BridgePhase::Running);
        let outcome = self
            .run_cycles(&address, &mut link, &mut shutdown, &mut report)
            .await;

        self.set_phase(BridgePhase::ShuttingDown);
        release(&mut link).await;

        report.telemetry_applied = self.telemetry.applied.load(Ordering::Relaxed);
        report.telemetry_rejected = self.telemetry.rejected.load(Ordering::Relaxed);
        self.set_phase(BridgePhase::Stopped);
        tracing::info!(?report, "Bridge stopped");

        outcome.map(|()| report).map_err(Into::into)
    }

    /// Connects and subscribes, releasing the link if subscribing fails.
    async fn establish(&self, address: &P::Address) -> std::result::Result<P::Link, LinkError> {
        self.set_phase(BridgePhase::Connecting);
        let mut link = self.provider.connect(address).await?;

        self.set_phase(BridgePhase::Subscribing);
        let characteristic = self.config.link.notify_characteristic();
        if let Err(e) = link.subscribe(characteristic, self.notify_callback()).await {
            release(&mut link).await;
            return Err(e);
        }
        Ok(link)
    }

    fn notify_callback(&self) -> NotifyCallback {
        let state = self.state.clone();
        let counters = Arc::clone(&self.telemetry);

        Box::new(move |raw: &[u8]| match telemetry::ingest(&state, raw) {
            Ok(changed) => {
                counters.applied.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(changed, bytes = raw.len(), "Applied telemetry");
            }
            Err(e) => {
                counters.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "Discarding malformed telemetry");
            }
        })
    }

    async fn run_cycles(
        &mut self,
        address: &P::Address,
        link: &mut P::Link,
        shutdown: &mut watch::Receiver<bool>,
        report: &mut BridgeReport,
    ) -> std::result::Result<(), LinkError> {
        loop {
            if shutdown_requested(shutdown) {
                tracing::info!("Shutdown requested");
                return Ok(());
            }

            if !link.is_connected().await {
                tracing::warn!("Peripheral link lost");
                if !self.reconnect(address, link, shutdown, report).await? {
                    return Ok(());
                }
                continue;
            }

            if self.cycle(link, report).await && !link.is_connected().await {
                continue;
            }

            if sleep_or_shutdown(self.config.cycle_interval, shutdown).await {
                tracing::info!("Shutdown requested");
                return Ok(());
            }
        }
    }

    /// Runs one sync and drain pass.
    ///
    /// Returns true if the drain reported a lost link.
    async fn cycle(&mut self, link: &P::Link, report: &mut BridgeReport) -> bool {
        let snapshot = self.state.snapshot();
        match self.detector.maybe_sync(&snapshot, &self.store).await {
            SyncResult::Unchanged => {}
            SyncResult::Synced(_) => report.synced += 1,
            SyncResult::SyncFailed(_) => report.sync_failures += 1,
        }

        let link_lost = match self.drain.drain_one(&self.queue, link).await {
            DrainResult::Idle => false,
            DrainResult::Executed { .. } => {
                report.commands_executed += 1;
                false
            }
            DrainResult::Ignored { .. } => {
                report.commands_ignored += 1;
                false
            }
            DrainResult::Failed(e) => {
                report.drain_failures += 1;
                e.is_connection_loss()
            }
        };

        report.cycles += 1;
        link_lost
    }

    /// Re-establishes the link according to the reconnection policy.
    ///
    /// Returns `Ok(false)` if shutdown was requested while waiting.
    async fn reconnect(
        &self,
        address: &P::Address,
        link: &mut P::Link,
        shutdown: &mut watch::Receiver<bool>,
        report: &mut BridgeReport,
    ) -> std::result::Result<bool, LinkError> {
        let policy = &self.config.reconnection;
        if !policy.enabled {
            return Err(LinkError::Disconnected);
        }

        self.set_phase(BridgePhase::Reconnecting);
        // The peripheral accepts a single connection.
        release(link).await;

        let mut attempt = 0;
        while policy.should_retry(attempt) {
            let delay = policy.delay_for_attempt(attempt);
            attempt += 1;
            tracing::info!(attempt, ?delay, "Reconnecting");

            if sleep_or_shutdown(delay, shutdown).await {
                return Ok(false);
            }

            match self.establish(address).await {
                Ok(fresh) => {
                    *link = fresh;
                    report.reconnects += 1;
                    self.set_phase(BridgePhase::Running);
                    tracing::info!(attempt, "Reconnected");
                    return Ok(true);
                }
                Err(e) => tracing::warn!(attempt, error = %e, "Reconnect attempt failed"),
            }
        }

        tracing::error!(attempts = attempt, "Giving up on peripheral link");
        Err(LinkError::Disconnected)
    }
}

/// Disconnects, logging instead of failing.
async fn release<L: PeripheralLink>(link: &mut L) {
    if let Err(e) = link.disconnect().await {
        tracing::warn!(error = %e, "Failed to release peripheral link");
    }
}

fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

/// Sleeps for `duration`; returns true early if shutdown is requested.
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        () = tokio::time::sleep(duration) => false,
        _ = shutdown.wait_for(|stop| *stop) => true,
    }
}
