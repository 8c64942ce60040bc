// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Service Bootstrap
//!
//! This crate provides the HTTP process scaffolding for a service: layered
//! configuration, structured logging, operational endpoints backed by the
//! [`health`] aggregator, a fixed middleware chain around business routes, and a
//! server lifecycle with bounded graceful shutdown.
//!
//! # Module Structure
//!
//! - [`cli`]: Command-line flags
//! - [`config`]: Layered configuration loading and validated types
//! - [`error`]: Error types and HTTP response handling with proper status codes
//! - [`metrics`]: Request count and latency metrics in an owned Prometheus registry
//! - [`middleware`]: Transaction ids, request logging, metrics and handler timeouts
//! - [`routes`]: Operational and business routes and their handlers
//! - [`server`]: Server lifecycle and coordinated shutdown
//! - [`shutdown`]: Termination signal handling
//! - [`state`]: Shared application state
//! - [`telemetry`]: Tracing subscriber setup
//!
//! # Key Features
//!
//! - **Operational Endpoints**: `/__health`, `/__gtg`, `/__build-info` and `/__metrics`
//!   answer outside the middleware chain
//! - **Graceful Shutdown**: SIGTERM/SIGINT stop new connections and drain in-flight
//!   requests within a grace period
//! - **Handler Timeouts**: Business requests exceeding their budget receive a 503

pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod telemetry;

pub use cli::Cli;
pub use config::{LogFormat, LogLevel, ServiceConfig, TimeoutSeconds};
pub use error::{ServerError, ServerResult};
pub use metrics::HttpMetrics;
pub use middleware::MiddlewareChain;
pub use server::{LifecycleState, RunningServer, Server, ShutdownConfig};
pub use state::ServerState;
