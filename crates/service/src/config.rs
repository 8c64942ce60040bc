// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Service configuration module
//!
//! This module provides the configuration structure for the service and the logic
//! that layers its sources: defaults, an optional configuration file, environment
//! variables and finally command-line flags.

use std::{
    collections::HashMap,
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    str::FromStr,
    time::Duration,
};

use anyhow::{Result, anyhow, ensure};
use config::{Config, ConfigError, Environment as ConfigEnv, File};
use health::ServiceIdentity;
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::{
    cli::Cli,
    error::{ServerError, ServerResult},
};

// Configuration defaults
const DEFAULT_SYSTEM_CODE: &str = "service-template";
const DEFAULT_APP_NAME: &str = "service-template";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HANDLER_TIMEOUT_SECONDS: u64 = 14;
const DEFAULT_SHUTDOWN_GRACE_SECONDS: u64 = 30;
const MAX_TIMEOUT_SECONDS: u64 = 300;

const ENV_PREFIX: &str = "APP";
const LOG_LEVEL_ENV: &str = "LOG_LEVEL";
const DEFAULT_CONFIG_FILE: &str = "config.json";

/// A validated timeout duration in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeoutSeconds(Duration);

impl TimeoutSeconds {
    /// Create a new `TimeoutSeconds`, ensuring the value is within valid bounds
    ///
    /// # Errors
    ///
    /// Returns an error if timeout is 0 or greater than 300 seconds
    pub fn new(seconds: u64) -> Result<Self> {
        ensure!(seconds != 0, "timeout must be greater than 0");
        ensure!(
            seconds <= MAX_TIMEOUT_SECONDS,
            "timeout cannot exceed {MAX_TIMEOUT_SECONDS}"
        );
        Ok(Self(Duration::from_secs(seconds)))
    }

    /// Budget for a single business request (14 seconds)
    pub const fn default_handler() -> Self {
        Self(Duration::from_secs(DEFAULT_HANDLER_TIMEOUT_SECONDS))
    }

    /// Grace period for draining in-flight requests (30 seconds)
    pub const fn default_shutdown_grace() -> Self {
        Self(Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECONDS))
    }

    /// Create a safe testing timeout (5 seconds)
    pub const fn testing() -> Self {
        Self(Duration::from_secs(5))
    }

    /// Get the timeout value
    pub fn value(&self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for TimeoutSeconds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = u64::deserialize(deserializer)?;
        Self::new(seconds).map_err(|e| de::Error::custom(e.to_string()))
    }
}

/// Logging verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Everything, including per-check health output
    Debug,
    /// Lifecycle events and request logs
    #[default]
    Info,
    /// Timeouts, failing checks and shutdown signals
    Warn,
    /// Fatal conditions only
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            other => Err(anyhow!(
                "unknown log level '{other}', expected DEBUG, INFO, WARN or ERROR"
            )),
        }
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|e: anyhow::Error| de::Error::custom(e))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_filter().to_ascii_uppercase())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable text
    Text,
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// System code identifying the deployable unit
    pub system_code: String,
    /// Application display name
    pub name: String,
    /// Application description
    pub description: String,
    /// Address to bind
    pub host: IpAddr,
    /// Port to listen on, 0 lets the OS choose
    pub port: u16,
    /// Logging verbosity
    pub log_level: LogLevel,
    /// Log output format
    pub log_format: LogFormat,
    /// Budget for each business request (validated range: 1-300)
    pub handler_timeout_seconds: TimeoutSeconds,
    /// Grace period for draining in-flight requests on shutdown (validated range: 1-300)
    pub shutdown_grace_seconds: TimeoutSeconds,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            system_code: DEFAULT_SYSTEM_CODE.to_string(),
            name: DEFAULT_APP_NAME.to_string(),
            description: String::new(),
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            log_level: LogLevel::default(),
            log_format: LogFormat::default(),
            handler_timeout_seconds: TimeoutSeconds::default_handler(),
            shutdown_grace_seconds: TimeoutSeconds::default_shutdown_grace(),
        }
    }
}

impl ServiceConfig {
    /// Create configuration from the process environment and command-line flags
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if configuration is invalid or cannot be loaded.
    pub fn from_cli(cli: &Cli) -> ServerResult<Self> {
        Self::load(cli, None).map_err(|e| ServerError::Config {
            message: format!("failed to load configuration: {e}"),
        })
    }

    /// Load configuration using the config crate with layered sources
    ///
    /// Configuration is loaded in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. Configuration file (`--config <file>`, or an optional `config.json`)
    /// 3. Environment variables with the `APP_` prefix, plus `LOG_LEVEL`
    /// 4. Command-line flags
    ///
    /// `env` replaces the process environment when given, which keeps tests hermetic.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or is invalid.
    pub fn load(cli: &Cli, env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let log_level_env = match &env {
            Some(vars) => vars.get(LOG_LEVEL_ENV).cloned(),
            None => std::env::var(LOG_LEVEL_ENV).ok(),
        };

        let file = match &cli.config {
            Some(path) => File::from(path.as_path()).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config = Config::builder()
            .set_default("system_code", DEFAULT_SYSTEM_CODE)?
            .set_default("name", DEFAULT_APP_NAME)?
            .set_default("description", "")?
            .set_default("host", DEFAULT_HOST)?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("log_level", LogLevel::default().to_string())?
            .set_default("log_format", "json")?
            .set_default("handler_timeout_seconds", DEFAULT_HANDLER_TIMEOUT_SECONDS)?
            .set_default("shutdown_grace_seconds", DEFAULT_SHUTDOWN_GRACE_SECONDS)?
            .add_source(file)
            .add_source(
                ConfigEnv::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .try_parsing(true)
                    .source(env),
            )
            .set_override_option("log_level", log_level_env)?
            .set_override_option("system_code", cli.app_system_code.clone())?
            .set_override_option("name", cli.app_name.clone())?
            .set_override_option("port", cli.port.map(i64::from))?
            .set_override_option("log_level", cli.log_level.clone())?
            .build()?;

        config.try_deserialize()
    }

    /// Create configuration optimized for testing
    pub fn for_testing() -> Self {
        Self {
            system_code: "service-test".to_string(),
            name: "service-test".to_string(),
            description: "service under test".to_string(),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0, // let OS choose available port
            log_level: LogLevel::Debug,
            log_format: LogFormat::Text,
            handler_timeout_seconds: TimeoutSeconds::testing(),
            shutdown_grace_seconds: TimeoutSeconds::testing(),
        }
    }

    /// Get socket address for binding
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Identity reported by the health endpoints
    pub fn identity(&self) -> ServiceIdentity {
        ServiceIdentity::new(&self.system_code, &self.name, &self.description)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    #[test]
    fn timeout_validation() {
        // Invalid timeout values should fail to construct
        assert!(TimeoutSeconds::new(0).is_err());
        assert!(TimeoutSeconds::new(400).is_err());

        // Valid timeout values should construct successfully
        assert!(TimeoutSeconds::new(14).is_ok());
        assert!(TimeoutSeconds::new(1).is_ok());
        assert!(TimeoutSeconds::new(300).is_ok());
    }

    #[test]
    fn log_level_parsing() {
        assert_eq!("INFO".parse::<LogLevel>().ok(), Some(LogLevel::Info));
        assert_eq!("debug".parse::<LogLevel>().ok(), Some(LogLevel::Debug));
        assert_eq!("Warning".parse::<LogLevel>().ok(), Some(LogLevel::Warn));
        assert_eq!(" ERROR ".parse::<LogLevel>().ok(), Some(LogLevel::Error));
        assert!("verbose".parse::<LogLevel>().is_err());

        assert_eq!(LogLevel::Warn.to_string(), "WARN");
        assert_eq!(LogLevel::Warn.as_filter(), "warn");
    }

    #[test]
    fn defaults_without_any_source() {
        let config = ServiceConfig::load(&Cli::default(), env(&[])).expect("defaults load");

        assert_eq!(config.system_code, DEFAULT_SYSTEM_CODE);
        assert_eq!(config.name, DEFAULT_APP_NAME);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.handler_timeout_seconds.value(),
            Duration::from_secs(DEFAULT_HANDLER_TIMEOUT_SECONDS)
        );
        assert_eq!(
            config.shutdown_grace_seconds.value(),
            Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECONDS)
        );
    }

    #[test]
    fn environment_overrides_defaults() {
        let vars = env(&[
            ("APP_SYSTEM_CODE", "orders"),
            ("APP_NAME", "Orders Service"),
            ("APP_PORT", "9000"),
            ("APP_HANDLER_TIMEOUT_SECONDS", "3"),
            ("LOG_LEVEL", "debug"),
        ]);
        let config = ServiceConfig::load(&Cli::default(), vars).expect("env load");

        assert_eq!(config.system_code, "orders");
        assert_eq!(config.name, "Orders Service");
        assert_eq!(config.port, 9000);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.handler_timeout_seconds.value(), Duration::from_secs(3));
    }

    #[test]
    fn flags_override_environment() {
        let vars = env(&[
            ("APP_SYSTEM_CODE", "from-env"),
            ("APP_PORT", "9000"),
            ("LOG_LEVEL", "ERROR"),
        ]);
        let cli = Cli {
            app_system_code: Some("from-flag".to_string()),
            port: Some(9100),
            log_level: Some("WARN".to_string()),
            ..Cli::default()
        };
        let config = ServiceConfig::load(&cli, vars).expect("flag load");

        assert_eq!(config.system_code, "from-flag");
        assert_eq!(config.port, 9100);
        assert_eq!(config.log_level, LogLevel::Warn);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let zero_timeout = env(&[("APP_SHUTDOWN_GRACE_SECONDS", "0")]);
        assert!(ServiceConfig::load(&Cli::default(), zero_timeout).is_err());

        let bad_level = env(&[("LOG_LEVEL", "LOUD")]);
        assert!(ServiceConfig::load(&Cli::default(), bad_level).is_err());

        let bad_port = env(&[("APP_PORT", "not-a-port")]);
        assert!(ServiceConfig::load(&Cli::default(), bad_port).is_err());
    }

    #[test]
    fn config_file_sits_between_defaults_and_environment() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("service.json");
        let mut file = std::fs::File::create(&path).expect("create config file");
        write!(
            file,
            r#"{{"name": "from-file", "port": 7000, "log_format": "text"}}"#
        )
        .expect("write config file");

        let cli = Cli {
            config: Some(path),
            ..Cli::default()
        };
        let config = ServiceConfig::load(&cli, env(&[("APP_PORT", "7100")])).expect("file load");

        assert_eq!(config.name, "from-file");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.port, 7100);
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let cli = Cli {
            config: Some("/definitely/not/here.json".into()),
            ..Cli::default()
        };
        assert!(ServiceConfig::load(&cli, env(&[])).is_err());
    }

    #[test]
    fn socket_addr_and_identity() {
        let config = ServiceConfig::for_testing();
        assert_eq!(config.socket_addr().port(), 0);
        assert!(config.socket_addr().ip().is_loopback());

        let identity = config.identity();
        assert_eq!(identity.system_code, "service-test");
        assert_eq!(identity.description, "service under test");
    }
}
