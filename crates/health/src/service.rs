// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Health aggregation service
//!
//! [`HealthService`] owns the registered checks and evaluates all of them on every
//! call. Nothing is cached and nothing is retried: a failing check reports failing
//! until a later call observes it passing again.

use std::time::Instant;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{
    check::HealthCheck,
    report::{CheckResult, GoodToGo, HealthReport, ServiceIdentity},
};

/// Set of named health checks for one service
#[derive(Debug, Clone)]
pub struct HealthService {
    identity: ServiceIdentity,
    checks: Vec<HealthCheck>,
}

impl HealthService {
    /// Create a service with no registered checks
    pub fn new(identity: ServiceIdentity) -> Self {
        Self {
            identity,
            checks: Vec::new(),
        }
    }

    /// Register a check, builder style
    #[must_use]
    pub fn with_check(mut self, check: HealthCheck) -> Self {
        self.register(check);
        self
    }

    /// Register a check
    pub fn register(&mut self, check: HealthCheck) {
        debug!(check_id = check.id(), "registering health check");
        self.checks.push(check);
    }

    /// Identity reported in health reports
    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    /// Registered checks in registration order
    pub fn checks(&self) -> &[HealthCheck] {
        &self.checks
    }

    /// Run every check in registration order and report each outcome
    pub async fn health(&self) -> HealthReport {
        let mut results = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            results.push(run_check(check).await);
        }
        HealthReport::new(&self.identity, results)
    }

    /// Whether every registered check currently passes
    pub async fn good_to_go(&self) -> GoodToGo {
        GoodToGo::from(&self.health().await)
    }
}

/// Run one probe on its own task so that errors, panics and overruns all become
/// a failing result
async fn run_check(check: &HealthCheck) -> CheckResult {
    let started = Instant::now();
    let task = tokio::spawn(check.invoke());
    let abort = task.abort_handle();

    let outcome = match timeout(check.timeout(), task).await {
        Ok(Ok(Ok(output))) => Ok(output),
        Ok(Ok(Err(e))) => Err(format!("{e:#}")),
        Ok(Err(join_error)) if join_error.is_panic() => Err("check panicked".to_string()),
        Ok(Err(join_error)) => Err(format!("check did not complete: {join_error}")),
        Err(_) => {
            abort.abort();
            Err(format!("check timed out after {:?}", check.timeout()))
        }
    };

    let elapsed = started.elapsed();
    let (ok, check_output) = match outcome {
        Ok(output) => {
            debug!(check_id = check.id(), ?elapsed, "health check passed");
            (true, output)
        }
        Err(reason) => {
            warn!(check_id = check.id(), ?elapsed, %reason, "health check failed");
            (false, reason)
        }
    };

    CheckResult {
        id: check.id().to_string(),
        name: check.name().to_string(),
        ok,
        severity: check.severity(),
        business_impact: check.business_impact().to_string(),
        technical_summary: check.technical_summary().to_string(),
        panic_guide: check.panic_guide().to_string(),
        check_output,
        last_updated: Utc::now(),
    }
}
