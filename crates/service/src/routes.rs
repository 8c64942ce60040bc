// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Routes module
//!
//! This module provides route configuration for the service. Routes come in two
//! groups: operational routes answered directly from the health aggregator and
//! metrics registry, and business routes that sit behind the middleware chain.

pub mod handlers;

use axum::{Router, routing::get};
use handlers::{
    build_info_handler, good_to_go_handler, health_handler, metrics_handler, not_found_handler,
    test_handler,
};

use crate::{middleware::MiddlewareChain, state::ServerState};

/// Detailed health report
pub const HEALTH_PATH: &str = "/__health";
/// Good-to-go readiness signal
pub const GTG_PATH: &str = "/__gtg";
/// Static build metadata
pub const BUILD_INFO_PATH: &str = "/__build-info";
/// Prometheus exposition of the request metrics
pub const METRICS_PATH: &str = "/__metrics";

/// Supervisory endpoints that must stay cheap and available
///
/// These do not go through logging, metrics or timeout middleware, so they keep
/// answering even when business handlers are saturated.
pub fn operational_routes() -> Router<ServerState> {
    Router::new()
        .route(HEALTH_PATH, get(health_handler))
        .route(GTG_PATH, get(good_to_go_handler))
        .route(BUILD_INFO_PATH, get(build_info_handler))
        .route(METRICS_PATH, get(metrics_handler))
}

/// Endpoints specific to this service
pub fn business_routes() -> Router<ServerState> {
    // placeholder until the service grows real handlers
    Router::new().route("/test", get(test_handler))
}

/// Assemble the full application router
///
/// Everything that is not an operational path is handed to `business`, wrapped in
/// `chain`. Unmatched paths end in a 404 produced inside the chain.
pub fn create_routes(
    state: ServerState,
    business: Router<ServerState>,
    chain: &MiddlewareChain,
) -> Router {
    let business = chain
        .apply(business.fallback(not_found_handler))
        .with_state(state.clone());

    operational_routes()
        .fallback_service(business)
        .with_state(state)
}
