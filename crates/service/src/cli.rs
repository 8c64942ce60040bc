// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Command-line interface
//!
//! Flags given here override every other configuration source.

use std::path::PathBuf;

use clap::Parser;

/// Command-line flags for the service binary
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "service", version, about = "Service bootstrap with health endpoints and graceful shutdown")]
pub struct Cli {
    /// System code of the application
    #[arg(long)]
    pub app_system_code: Option<String>,

    /// Application name
    #[arg(long)]
    pub app_name: Option<String>,

    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Logging level (DEBUG, INFO, WARN, ERROR)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Configuration file replacing the optional `config.json`
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_flags() {
        let cli = Cli::parse_from([
            "service",
            "--app-system-code",
            "orders",
            "--app-name",
            "Orders",
            "--port",
            "9090",
            "--log-level",
            "DEBUG",
            "--config",
            "/etc/orders.json",
        ]);

        assert_eq!(cli.app_system_code.as_deref(), Some("orders"));
        assert_eq!(cli.app_name.as_deref(), Some("Orders"));
        assert_eq!(cli.port, Some(9090));
        assert_eq!(cli.log_level.as_deref(), Some("DEBUG"));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/orders.json")));
    }

    #[test]
    fn flags_are_optional() {
        let cli = Cli::parse_from(["service"]);
        assert!(cli.app_system_code.is_none());
        assert!(cli.port.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn rejects_invalid_port() {
        assert!(Cli::try_parse_from(["service", "--port", "70000"]).is_err());
    }
}
