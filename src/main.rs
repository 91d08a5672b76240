// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::process::ExitCode;

use blebridge::bridge::{Bridge, BridgeReport};
use blebridge::config::BridgeSettings;
use blebridge::link::BtleProvider;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match BridgeSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .init();

    info!(
        device = %settings.device_name,
        sensor_id = %settings.sensor_id,
        table = %settings.table_name,
        "Starting blebridge"
    );

    match run(settings).await {
        Ok(report) => {
            info!(
                cycles = report.cycles,
                synced = report.synced,
                commands = report.commands_executed,
                "Bridge stopped cleanly"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Bridge failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: BridgeSettings) -> blebridge::Result<BridgeReport> {
    let config = settings.bridge_config()?;
    let store = settings.store_config()?.build()?;
    let queue = settings.queue_config()?.build()?;
    let provider = BtleProvider::new(config.link().clone()).await?;

    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, finishing current cycle");
                let _ = stop.send(true);
            }
            Err(e) => {
                error!(error = %e, "Cannot listen for interrupts");
                // Dropping the sender would stop the bridge.
                std::future::pending::<()>().await;
            }
        }
    });

    let mut bridge = Bridge::new(provider, store, queue, config);
    bridge.run(shutdown).await
}
