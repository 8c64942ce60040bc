// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Health check definitions

use std::{fmt, future::Future, pin::Pin, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// Health check constants
const DEFAULT_CHECK_TIMEOUT_SECONDS: u64 = 10;

/// Time a single check may run before it is reported as failing
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(DEFAULT_CHECK_TIMEOUT_SECONDS);

/// Boxed future produced by a health check probe
///
/// `Ok` carries the check output shown to operators, `Err` the failure reason.
pub type CheckFuture = Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'static>>;

type Checker = Arc<dyn Fn() -> CheckFuture + Send + Sync>;

/// How badly a failing check affects the service
///
/// Serialized as the integers 1 to 3, 1 being the most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Severity {
    /// Failure stops the service from doing its job
    High,
    /// Failure degrades the service
    Medium,
    /// Failure has no visible impact yet
    Low,
}

/// Severity value outside the 1..=3 range
#[derive(Debug, Error, PartialEq, Eq)]
#[error("severity must be between 1 and 3, got {0}")]
pub struct InvalidSeverity(pub u8);

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
        }
    }
}

impl TryFrom<u8> for Severity {
    type Error = InvalidSeverity;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::High),
            2 => Ok(Self::Medium),
            3 => Ok(Self::Low),
            other => Err(InvalidSeverity(other)),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// A named health probe plus the metadata operators need when it fails
#[derive(Clone)]
pub struct HealthCheck {
    id: String,
    name: String,
    severity: Severity,
    business_impact: String,
    technical_summary: String,
    panic_guide: String,
    timeout: Duration,
    checker: Checker,
}

impl HealthCheck {
    /// Create a check from an async probe
    ///
    /// # Arguments
    ///
    /// * `id` - Stable identifier used in reports
    /// * `name` - Human-readable name
    /// * `checker` - Probe returning the check output on success
    pub fn new<F, Fut>(id: impl Into<String>, name: impl Into<String>, checker: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            severity: Severity::Medium,
            business_impact: String::new(),
            technical_summary: String::new(),
            panic_guide: String::new(),
            timeout: DEFAULT_CHECK_TIMEOUT,
            checker: Arc::new(move || -> CheckFuture { Box::pin(checker()) }),
        }
    }

    /// Set the severity reported when this check fails
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Describe what the business loses while this check fails
    #[must_use]
    pub fn with_business_impact(mut self, business_impact: impl Into<String>) -> Self {
        self.business_impact = business_impact.into();
        self
    }

    /// Describe what the check verifies
    #[must_use]
    pub fn with_technical_summary(mut self, technical_summary: impl Into<String>) -> Self {
        self.technical_summary = technical_summary.into();
        self
    }

    /// Link or text telling operators how to recover
    #[must_use]
    pub fn with_panic_guide(mut self, panic_guide: impl Into<String>) -> Self {
        self.panic_guide = panic_guide.into();
        self
    }

    /// Bound how long the probe may run
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Check display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Severity reported on failure
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Business impact description
    pub fn business_impact(&self) -> &str {
        &self.business_impact
    }

    /// Technical summary
    pub fn technical_summary(&self) -> &str {
        &self.technical_summary
    }

    /// Recovery guide
    pub fn panic_guide(&self) -> &str {
        &self.panic_guide
    }

    /// Probe time budget
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start a fresh probe run
    pub fn invoke(&self) -> CheckFuture {
        (self.checker)()
    }
}

impl fmt::Debug for HealthCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthCheck")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("severity", &self.severity)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_conversion() {
        assert_eq!(Severity::try_from(1), Ok(Severity::High));
        assert_eq!(Severity::try_from(2), Ok(Severity::Medium));
        assert_eq!(Severity::try_from(3), Ok(Severity::Low));
        assert_eq!(Severity::try_from(0), Err(InvalidSeverity(0)));
        assert_eq!(Severity::try_from(4), Err(InvalidSeverity(4)));

        assert_eq!(u8::from(Severity::High), 1);
        assert_eq!(Severity::Low.to_string(), "3");
    }

    #[test]
    fn severity_ordering_puts_most_severe_first() {
        assert!(Severity::High < Severity::Medium);
        assert!(Severity::Medium < Severity::Low);
    }

    #[test]
    fn severity_serializes_as_integer() {
        assert_eq!(
            serde_json::to_string(&Severity::High).expect("serialize"),
            "1"
        );
        let parsed: Severity = serde_json::from_str("3").expect("deserialize");
        assert_eq!(parsed, Severity::Low);
        assert!(serde_json::from_str::<Severity>("7").is_err());
    }

    #[test]
    fn check_defaults_and_builders() {
        let check = HealthCheck::new("db", "Database", || async { Ok("ok".to_string()) });
        assert_eq!(check.id(), "db");
        assert_eq!(check.name(), "Database");
        assert_eq!(check.severity(), Severity::Medium);
        assert_eq!(check.timeout(), DEFAULT_CHECK_TIMEOUT);
        assert!(check.business_impact().is_empty());

        let check = check
            .with_severity(Severity::High)
            .with_business_impact("no reads")
            .with_technical_summary("pings the primary")
            .with_panic_guide("https://runbooks.example/db")
            .with_timeout(Duration::from_secs(2));

        assert_eq!(check.severity(), Severity::High);
        assert_eq!(check.business_impact(), "no reads");
        assert_eq!(check.technical_summary(), "pings the primary");
        assert_eq!(check.panic_guide(), "https://runbooks.example/db");
        assert_eq!(check.timeout(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn invoke_runs_probe_each_time() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let check = HealthCheck::new("counter", "Counter", move || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(format!("call {n}"))
            }
        });

        assert_eq!(check.invoke().await.expect("first call"), "call 1");
        assert_eq!(check.invoke().await.expect("second call"), "call 2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
