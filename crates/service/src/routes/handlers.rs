// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP request handlers module
//!
//! This module provides the operational handlers (health, good-to-go, build info
//! and metrics) together with the placeholder business handler and the 404
//! fallback.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Serialize;
use tracing::warn;

use crate::{error::ServerError, state::ServerState};

const NO_CACHE: &str = "no-cache";

/// Health report endpoint handler
///
/// Always answers 200; the report body carries the verdict.
pub async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let report = state.health().health().await;
    ([(header::CACHE_CONTROL, NO_CACHE)], Json(report))
}

/// Good-to-go endpoint handler
///
/// Answers 200 `OK` when every check passes, 503 with the failures otherwise.
pub async fn good_to_go_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let gtg = state.health().good_to_go().await;

    let status = if gtg.ok {
        StatusCode::OK
    } else {
        warn!(message = %gtg.message, "service is not good to go");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, [(header::CACHE_CONTROL, NO_CACHE)], gtg.message)
}

/// Static build metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    /// Crate version
    pub version: String,
    /// Source repository
    pub repository: String,
    /// VCS revision the binary was built from
    pub revision: String,
    /// Tool that produced the build
    pub builder: String,
    /// Build timestamp
    pub date_time: String,
}

impl BuildInfo {
    /// Metadata baked in at compile time
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            repository: env!("CARGO_PKG_REPOSITORY").to_string(),
            revision: option_env!("BUILD_REVISION").unwrap_or("unknown").to_string(),
            builder: "cargo".to_string(),
            date_time: option_env!("BUILD_DATE").unwrap_or("unknown").to_string(),
        }
    }
}

/// Build info endpoint handler
pub async fn build_info_handler() -> Json<BuildInfo> {
    Json(BuildInfo::current())
}

/// Prometheus metrics endpoint handler
pub async fn metrics_handler(
    State(state): State<ServerState>,
) -> Result<impl IntoResponse, ServerError> {
    let metrics = state.metrics();
    let body = metrics.encode()?;
    Ok(([(header::CONTENT_TYPE, metrics.content_type())], body))
}

/// Placeholder business endpoint
pub async fn test_handler() -> &'static str {
    "OK"
}

/// Fallback for paths that match no route
pub async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}
