// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Error handling module
//!
//! This module provides the error taxonomy for the service, split into startup
//! fatal errors, request-level errors mapped onto HTTP responses, and shutdown
//! fatal errors.

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Comprehensive error types for server operations
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration validation errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Network binding errors
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        /// Socket address that failed to bind
        address: SocketAddr,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Server startup errors
    #[error("Server startup failed: {source}")]
    Startup {
        /// Underlying IO error
        source: std::io::Error,
    },

    /// In-flight requests did not finish within the grace period
    #[error("Graceful shutdown did not complete within {grace_period:?}")]
    DrainTimeout {
        /// Grace period that elapsed
        grace_period: Duration,
    },

    /// A business handler exceeded its time budget
    #[error("Request did not complete within {budget:?}")]
    HandlerTimeout {
        /// Budget that elapsed
        budget: Duration,
    },

    /// Runtime errors during server operation
    #[error("Runtime error: {message}")]
    Runtime {
        /// Error message
        message: String,
    },

    /// Metrics registry errors
    #[error("Metrics error: {source}")]
    Metrics {
        /// Underlying prometheus error
        #[from]
        source: prometheus::Error,
    },

    /// Task join errors for async operations
    #[error("Task join error: {source}")]
    TaskJoin {
        /// Underlying tokio join error
        #[source]
        source: tokio::task::JoinError,
    },

    /// Signal handling errors
    #[error("Signal handling error: {message}")]
    Signal {
        /// Error message
        message: String,
    },
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    /// HTTP status used when this error reaches a client
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::HandlerTimeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Config { .. }
            | ServerError::Bind { .. }
            | ServerError::Startup { .. }
            | ServerError::DrainTimeout { .. }
            | ServerError::Runtime { .. }
            | ServerError::Metrics { .. }
            | ServerError::TaskJoin { .. }
            | ServerError::Signal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let json_body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16()
        });

        (status, Json(json_body)).into_response()
    }
}

/// Convenient From implementations for common async error types
impl From<tokio::task::JoinError> for ServerError {
    fn from(source: tokio::task::JoinError) -> Self {
        Self::TaskJoin { source }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    #[test]
    fn handler_timeout_is_service_unavailable() {
        let error = ServerError::HandlerTimeout {
            budget: Duration::from_secs(14),
        };
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.to_string(), "Request did not complete within 14s");
    }

    #[test]
    fn lifecycle_errors_are_internal() {
        let drain = ServerError::DrainTimeout {
            grace_period: Duration::from_secs(30),
        };
        assert_eq!(drain.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(drain.to_string().contains("30s"));

        let config = ServerError::Config {
            message: "bad port".to_string(),
        };
        assert_eq!(config.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn error_response_body() {
        let response = ServerError::HandlerTimeout {
            budget: Duration::from_millis(500),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["status"], 503);
        assert_eq!(json["error"], "Request did not complete within 500ms");
    }
}
