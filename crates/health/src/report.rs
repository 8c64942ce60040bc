// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Health report types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::check::Severity;

/// Version of the health report document layout
pub const REPORT_SCHEMA_VERSION: u8 = 1;

/// Self-identification embedded in every health report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    /// System code of the deployable unit
    pub system_code: String,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: String,
}

impl ServiceIdentity {
    /// Create a new service identity
    pub fn new(
        system_code: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            system_code: system_code.into(),
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Outcome of one health check run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    /// Check identifier
    pub id: String,
    /// Check display name
    pub name: String,
    /// Whether the check passed
    pub ok: bool,
    /// Severity reported by the check
    pub severity: Severity,
    /// What the business loses while this check fails
    pub business_impact: String,
    /// What the check verifies
    pub technical_summary: String,
    /// How to recover
    pub panic_guide: String,
    /// Probe output on success, failure reason otherwise
    pub check_output: String,
    /// When the check ran
    pub last_updated: DateTime<Utc>,
}

/// Detailed health of the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Report layout version
    pub schema_version: u8,
    /// System code of the service
    pub system_code: String,
    /// Service display name
    pub name: String,
    /// Service description
    pub description: String,
    /// Results in registration order
    pub checks: Vec<CheckResult>,
    /// True when every check passed
    pub ok: bool,
    /// Most severe severity among failing checks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl HealthReport {
    /// Assemble a report from individual results
    pub fn new(identity: &ServiceIdentity, checks: Vec<CheckResult>) -> Self {
        let ok = checks.iter().all(|check| check.ok);
        let severity = checks
            .iter()
            .filter(|check| !check.ok)
            .map(|check| check.severity)
            .min();

        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            system_code: identity.system_code.clone(),
            name: identity.name.clone(),
            description: identity.description.clone(),
            checks,
            ok,
            severity,
        }
    }

    /// Results of the checks that failed
    pub fn failing(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|check| !check.ok)
    }
}

/// Message of a passing good-to-go verdict
pub const GOOD_TO_GO_MESSAGE: &str = "OK";

/// Readiness verdict consumed by load balancers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodToGo {
    /// True when every check passed
    pub ok: bool,
    /// Failure reasons joined together, `OK` when every check passed
    pub message: String,
}

impl GoodToGo {
    /// A passing verdict
    pub fn ok() -> Self {
        Self {
            ok: true,
            message: GOOD_TO_GO_MESSAGE.to_string(),
        }
    }

    /// A failing verdict carrying the reason
    pub fn not_ok(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

impl From<&HealthReport> for GoodToGo {
    fn from(report: &HealthReport) -> Self {
        if report.ok {
            return Self::ok();
        }

        let message = report
            .failing()
            .map(|check| format!("{}: {}", check.id, check.check_output))
            .collect::<Vec<_>>()
            .join("; ");
        Self::not_ok(message)
    }
}
