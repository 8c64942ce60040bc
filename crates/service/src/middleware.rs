// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Middleware module for HTTP request processing
//!
//! This module builds the chain wrapped around business handlers. The order is
//! fixed, outermost first:
//!
//! 1. Transaction id assignment and request logging
//! 2. Metrics recording
//! 3. Handler timeout
//!
//! Logging and metrics therefore observe the 503 produced when the timeout fires.
//! Operational endpoints are routed around this chain entirely.

use std::time::{Duration, Instant};

use axum::{
    Router,
    body::Body,
    extract::{MatchedPath, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::{Next, from_fn_with_state},
    response::{IntoResponse, Response},
};
use tokio::time::timeout;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{Span, info, info_span, warn};
use uuid::Uuid;

use crate::{
    error::ServerError,
    metrics::{HttpMetrics, UNMATCHED_ROUTE},
};

/// Header carrying the transaction identifier
pub const TRANSACTION_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const TRANSACTION_ID_PREFIX: &str = "tid_";

/// Generates `tid_`-prefixed transaction ids for requests that arrive without one
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeTransactionId;

impl MakeRequestId for MakeTransactionId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let transaction_id = format!("{TRANSACTION_ID_PREFIX}{}", Uuid::new_v4().simple());
        HeaderValue::from_str(&transaction_id).ok().map(RequestId::new)
    }
}

/// Ordered logging, metrics and timeout layers for business routes
#[derive(Debug, Clone)]
pub struct MiddlewareChain {
    metrics: HttpMetrics,
    handler_timeout: Duration,
}

impl MiddlewareChain {
    /// Create a chain recording into `metrics` and bounding handlers by `handler_timeout`
    pub fn new(metrics: HttpMetrics, handler_timeout: Duration) -> Self {
        Self {
            metrics,
            handler_timeout,
        }
    }

    /// Wrap every route and the fallback of `router` in the chain
    ///
    /// Routes added to `router` after this call are not wrapped.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let layers = ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(
                TRANSACTION_ID_HEADER,
                MakeTransactionId,
            ))
            .layer(PropagateRequestIdLayer::new(TRANSACTION_ID_HEADER))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(make_request_span)
                    .on_response(log_response),
            )
            .layer(from_fn_with_state(self.metrics.clone(), record_http_metrics))
            .layer(from_fn_with_state(
                self.handler_timeout,
                enforce_handler_timeout,
            ));

        router.layer(layers)
    }
}

fn make_request_span(request: &Request<Body>) -> Span {
    let transaction_id = request
        .headers()
        .get(TRANSACTION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        transaction_id
    )
}

fn log_response(response: &Response, latency: Duration, _span: &Span) {
    info!(
        status = response.status().as_u16(),
        duration_ms = latency.as_secs_f64() * 1000.0,
        "request completed"
    );
}

/// Record request count and latency per route
pub async fn record_http_metrics(
    State(metrics): State<HttpMetrics>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| UNMATCHED_ROUTE.to_string(), |path| path.as_str().to_string());

    let started = Instant::now();
    let response = next.run(request).await;
    metrics.observe(&method, &route, response.status(), started.elapsed());

    response
}

/// Abandon the handler and answer 503 once `budget` has elapsed
///
/// Dropping the handler future cancels its in-flight work; nothing is retried.
pub async fn enforce_handler_timeout(
    State(budget): State<Duration>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();

    match timeout(budget, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(%path, ?budget, "request exceeded its time budget");
            ServerError::HandlerTimeout { budget }.into_response()
        }
    }
}
