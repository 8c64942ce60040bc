// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Health check aggregation for the service
//!
//! This crate holds the set of named health checks a service registers and answers
//! the two questions operational tooling asks of it:
//!
//! - **Health**: a detailed report listing every check with its outcome and message
//! - **Good-to-go**: a single readiness verdict, true only when every check passes
//!
//! # Core Abstractions
//!
//! - [`HealthCheck`]: a named probe plus the metadata operators need when it fails
//! - [`HealthService`]: owns the registered checks and evaluates them on demand
//! - [`HealthReport`] / [`GoodToGo`]: the serializable answers
//!
//! Checks are evaluated fresh on every call. A probe that errors, panics or overruns
//! its timeout is reported as failing rather than propagated to the caller.

pub mod check;
pub mod report;
pub mod service;

pub use check::{CheckFuture, DEFAULT_CHECK_TIMEOUT, HealthCheck, InvalidSeverity, Severity};
pub use report::{
    CheckResult, GOOD_TO_GO_MESSAGE, GoodToGo, HealthReport, REPORT_SCHEMA_VERSION, ServiceIdentity,
};
pub use service::HealthService;
