// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Logging setup

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::{LogFormat, ServiceConfig},
    error::{ServerError, ServerResult},
};

/// Build the filter: `RUST_LOG` wins when set, otherwise the configured level
pub fn env_filter(config: &ServiceConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()))
}

/// Install the global tracing subscriber
///
/// # Errors
///
/// Returns `ServerError::Config` if a global subscriber is already installed.
pub fn init_tracing(config: &ServiceConfig) -> ServerResult<()> {
    let registry = tracing_subscriber::registry().with(env_filter(config));

    let result = match config.log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().flatten_event(true).with_current_span(true))
            .try_init(),
        LogFormat::Text => registry.with(fmt::layer()).try_init(),
    };

    result.map_err(|e| ServerError::Config {
        message: format!("failed to install tracing subscriber: {e}"),
    })
}
