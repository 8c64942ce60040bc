// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Service binary
//!
//! Loads configuration, installs logging and runs the server until it is
//! signalled to stop.

use anyhow::Result;
use clap::Parser;
use service::{Cli, Server, ServiceConfig, ShutdownConfig, telemetry};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ServiceConfig::from_cli(&cli)?;

    telemetry::init_tracing(&config)?;

    info!(
        system_code = %config.system_code,
        name = %config.name,
        log_level = %config.log_level,
        "starting service"
    );

    let shutdown_config = ShutdownConfig::from_config(&config);
    let server = Server::new(config, shutdown_config)?;

    // NOTE: the `#[tokio::main]` task does not run a worker future, we must spawn
    tokio::spawn(async move { server.run().await }).await??;

    info!("service stopped");
    Ok(())
}
