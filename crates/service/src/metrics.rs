// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics module
//!
//! Provides the HTTP request metrics recorded by the middleware chain. The
//! registry is owned by [`HttpMetrics`] and handed to the middleware and the
//! `/__metrics` endpoint explicitly instead of living in a process-wide global.

use std::{fmt, time::Duration};

use axum::http::{Method, StatusCode};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::error::{ServerError, ServerResult};

/// Route label used for requests that matched no route
pub const UNMATCHED_ROUTE: &str = "unmatched";

const REQUEST_DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0,
];

/// Request count and latency metrics backed by an owned registry
///
/// Cloning is cheap and every clone records into the same registry.
#[derive(Clone)]
pub struct HttpMetrics {
    registry: Registry,
    requests: IntCounterVec,
    duration: HistogramVec,
}

impl HttpMetrics {
    /// Create the metrics and register them in a fresh registry
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Metrics` if the metric definitions are rejected.
    pub fn new() -> ServerResult<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "route", "status"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request durations in seconds",
            )
            .buckets(REQUEST_DURATION_BUCKETS.to_vec()),
            &["method", "route"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            requests,
            duration,
        })
    }

    /// Record one completed request
    ///
    /// # Arguments
    /// * `method` - HTTP method of the request
    /// * `route` - Matched route template, or [`UNMATCHED_ROUTE`]
    /// * `status` - Status code sent to the client
    /// * `elapsed` - Time spent producing the response
    pub fn observe(&self, method: &Method, route: &str, status: StatusCode, elapsed: Duration) {
        self.requests
            .with_label_values(&[method.as_str(), route, status.as_str()])
            .inc();
        self.duration
            .with_label_values(&[method.as_str(), route])
            .observe(elapsed.as_secs_f64());
    }

    /// Number of requests recorded for the given labels
    pub fn request_count(&self, method: &Method, route: &str, status: StatusCode) -> u64 {
        self.requests
            .with_label_values(&[method.as_str(), route, status.as_str()])
            .get()
    }

    /// Render the registry in Prometheus text exposition format
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or produces invalid UTF-8.
    pub fn encode(&self) -> ServerResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = vec![];
        encoder.encode(&self.registry.gather(), &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| ServerError::Runtime {
            message: format!("metrics buffer is not valid UTF-8: {e}"),
        })
    }

    /// Content type of [`HttpMetrics::encode`] output
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

impl fmt::Debug for HttpMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpMetrics").finish_non_exhaustive()
    }
}
