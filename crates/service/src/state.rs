// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server state management module
//!
//! This module provides shared application state for the service, including
//! configuration, the health aggregator, the metrics registry and coordinated
//! cancellation.

use std::sync::Arc;

use health::HealthService;
use tokio_util::sync::CancellationToken;

use crate::{config::ServiceConfig, metrics::HttpMetrics};

/// Shared application state with cancellation token support
#[derive(Debug, Clone)]
pub struct ServerState {
    /// Service configuration
    config: ServiceConfig,
    /// Health aggregator behind the operational endpoints
    health: Arc<HealthService>,
    /// Metrics registry written by the middleware chain
    metrics: HttpMetrics,
    /// Cancellation token for coordinated shutdown
    pub cancellation_token: CancellationToken,
}

impl ServerState {
    /// Create new server state
    ///
    /// # Arguments
    ///
    /// * `config` - Service configuration
    /// * `health` - Health aggregator
    /// * `metrics` - Metrics registry handle
    /// * `cancellation_token` - Token for coordinated cancellation
    pub fn new(
        config: ServiceConfig,
        health: Arc<HealthService>,
        metrics: HttpMetrics,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            config,
            health,
            metrics,
            cancellation_token,
        }
    }

    /// Service configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Health aggregator
    pub fn health(&self) -> &Arc<HealthService> {
        &self.health
    }

    /// Metrics registry handle
    pub fn metrics(&self) -> &HttpMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerResult;

    fn state(token: CancellationToken) -> ServerResult<ServerState> {
        let config = ServiceConfig::for_testing();
        let health = Arc::new(HealthService::new(config.identity()));
        Ok(ServerState::new(config, health, HttpMetrics::new()?, token))
    }

    #[test]
    fn server_state_creation() -> ServerResult<()> {
        let state = state(CancellationToken::new())?;

        assert!(!state.cancellation_token.is_cancelled());
        assert_eq!(state.health().identity().system_code, "service-test");
        assert_eq!(state.config().port, 0);
        Ok(())
    }

    #[test]
    fn server_state_with_cancellation_token() -> ServerResult<()> {
        let token = CancellationToken::new();
        let state = state(token.clone())?;

        assert!(!state.cancellation_token.is_cancelled());

        // Test that the tokens are linked
        token.cancel();
        assert!(state.cancellation_token.is_cancelled());
        Ok(())
    }
}
