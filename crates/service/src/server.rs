// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server implementation module
//!
//! This module provides the main server struct and its lifecycle: binding the
//! listener, serving requests, and coordinated graceful shutdown using
//! `CancellationToken`. The lifecycle moves through [`LifecycleState`] in one
//! direction only and is observable through a watch channel.

use std::{fmt, net::SocketAddr, sync::Arc, time::Duration};

use axum::{Router, extract::Request};
use health::{HealthCheck, HealthService, Severity};
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::watch,
    task::JoinHandle,
    time::timeout,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tower::ServiceExt;
use tracing::{debug, error, info, warn};

use crate::{
    config::ServiceConfig,
    error::{ServerError, ServerResult},
    metrics::HttpMetrics,
    middleware::MiddlewareChain,
    routes::{business_routes, create_routes},
    shutdown::{ShutdownSignals, forward_signals},
    state::ServerState,
};

// Server constants
const DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS: u64 = 30;
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Identifier of the health check reporting the server's own lifecycle
pub const HTTP_SERVER_CHECK_ID: &str = "http-server";

/// Configuration for server shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Maximum time to wait for in-flight requests before giving up on them
    pub graceful_timeout: Duration,
}

impl ShutdownConfig {
    /// Shutdown behavior taken from the service configuration
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            graceful_timeout: config.shutdown_grace_seconds.value(),
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            graceful_timeout: Duration::from_secs(DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS),
        }
    }
}

/// Phases of the server lifecycle, in the only order they can occur
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    /// Constructed, not yet bound
    Created,
    /// Accepting connections
    Listening,
    /// No longer accepting; draining in-flight requests
    ShuttingDown,
    /// Serving has ended
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Created => "created",
            LifecycleState::Listening => "listening",
            LifecycleState::ShuttingDown => "shutting-down",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Main server struct
#[derive(Debug)]
pub struct Server {
    /// Service configuration
    config: ServiceConfig,
    /// Application router
    router: Router,
    /// Server state
    state: ServerState,
    /// Cancellation token for coordinated shutdown
    cancellation_token: CancellationToken,
    /// Configuration for coordinated shutdown
    shutdown_config: ShutdownConfig,
    /// Lifecycle publisher
    lifecycle: watch::Sender<LifecycleState>,
}

impl Server {
    /// Create a server with no dependency checks and the default business routes
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Metrics` if the metrics registry cannot be built.
    pub fn new(config: ServiceConfig, shutdown_config: ShutdownConfig) -> ServerResult<Self> {
        let health = HealthService::new(config.identity());
        Self::with_components(config, shutdown_config, health, business_routes())
    }

    /// Create a server with caller-supplied health checks and business routes
    ///
    /// The server's own `http-server` check is appended to `health`; it fails
    /// once shutdown has begun so load balancers stop routing here.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Metrics` if the metrics registry cannot be built.
    pub fn with_components(
        config: ServiceConfig,
        shutdown_config: ShutdownConfig,
        mut health: HealthService,
        business: Router<ServerState>,
    ) -> ServerResult<Self> {
        let cancellation_token = CancellationToken::new();
        health.register(Self::lifecycle_check(cancellation_token.clone()));

        let metrics = HttpMetrics::new()?;
        let chain = MiddlewareChain::new(metrics.clone(), config.handler_timeout_seconds.value());
        let state = ServerState::new(
            config.clone(),
            Arc::new(health),
            metrics,
            cancellation_token.child_token(),
        );
        let router = create_routes(state.clone(), business, &chain);
        let (lifecycle, _) = watch::channel(LifecycleState::Created);

        Ok(Self {
            config,
            router,
            state,
            cancellation_token,
            shutdown_config,
            lifecycle,
        })
    }

    fn lifecycle_check(cancellation_token: CancellationToken) -> HealthCheck {
        HealthCheck::new(HTTP_SERVER_CHECK_ID, "HTTP server", move || {
            let shutting_down = cancellation_token.is_cancelled();
            async move {
                if shutting_down {
                    anyhow::bail!("server is shutting down");
                }
                Ok("accepting requests".to_string())
            }
        })
        .with_severity(Severity::High)
        .with_business_impact("Requests routed to this instance will be refused")
        .with_technical_summary("Reports whether the HTTP server has begun graceful shutdown")
        .with_panic_guide("Expected during deployments; otherwise check why the process was signalled")
    }

    /// Bind the listener and start serving in a background task
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if unable to bind to the configured address,
    /// or `ServerError::Startup` if the bound address cannot be read.
    pub async fn start(self) -> ServerResult<RunningServer> {
        let Self {
            config,
            router,
            state,
            cancellation_token,
            shutdown_config,
            lifecycle,
        } = self;

        let addr = config.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                address: addr,
                source,
            })?;

        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Startup { source })?;

        info!(
            address = %local_addr,
            system_code = %config.system_code,
            handler_timeout = ?config.handler_timeout_seconds.value(),
            "server listening"
        );

        let force_close = CancellationToken::new();
        let serve_task = tokio::spawn(serve(
            listener,
            router,
            cancellation_token.clone(),
            force_close.clone(),
        ));
        lifecycle.send_replace(LifecycleState::Listening);

        Ok(RunningServer {
            local_addr,
            state,
            cancellation_token,
            shutdown_config,
            lifecycle,
            force_close,
            serve_task,
        })
    }

    /// Run the server until a termination signal and drain in-flight requests
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Signal` if signal handlers cannot be registered,
    /// `ServerError::Bind` if the listener cannot be bound, and
    /// `ServerError::DrainTimeout` if requests outlive the grace period.
    pub async fn run(self) -> ServerResult<()> {
        let signals = ShutdownSignals::install()?;
        let running = self.start().await?;

        let shutdown_token = running.cancellation_token();
        tokio::spawn(async move {
            info!("spawning the graceful shutdown task");
            forward_signals(signals, shutdown_token).await;
        });

        running.wait().await
    }

    /// Returns a clone of the cancellation token for coordinated shutdown
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Initiates graceful shutdown by cancelling the server's cancellation token
    ///
    /// Calling this before [`Server::start`] makes the server drain immediately
    /// after binding.
    pub fn shutdown(&self) {
        info!("programmatic shutdown requested");
        self.cancellation_token.cancel();
    }

    /// Subscribe to lifecycle transitions
    pub fn lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.lifecycle.subscribe()
    }

    /// Get service configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Get server state for testing
    pub fn state(&self) -> &ServerState {
        &self.state
    }
}

/// Handle to a server that is accepting connections
#[derive(Debug)]
pub struct RunningServer {
    local_addr: SocketAddr,
    state: ServerState,
    cancellation_token: CancellationToken,
    shutdown_config: ShutdownConfig,
    lifecycle: watch::Sender<LifecycleState>,
    force_close: CancellationToken,
    serve_task: JoinHandle<()>,
}

impl RunningServer {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns a clone of the cancellation token for coordinated shutdown
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Initiates graceful shutdown; idempotent
    pub fn shutdown(&self) {
        info!("programmatic shutdown requested");
        self.cancellation_token.cancel();
    }

    /// Subscribe to lifecycle transitions
    pub fn lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.lifecycle.subscribe()
    }

    /// Shared state seen by the handlers
    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Wait for shutdown to be requested, then drain within the grace period
    ///
    /// Connections still open when the grace period elapses are closed, which
    /// drops their in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::DrainTimeout` if in-flight requests are still
    /// running when the grace period elapses, `ServerError::TaskJoin` if the
    /// serve task failed, and `ServerError::Runtime` if serving stopped without
    /// a shutdown request.
    pub async fn wait(mut self) -> ServerResult<()> {
        tokio::select! {
            () = self.cancellation_token.cancelled() => {}
            joined = &mut self.serve_task => {
                self.cancellation_token.cancel();
                self.lifecycle.send_replace(LifecycleState::Stopped);
                error!("server stopped without a shutdown request");
                joined?;
                return Err(ServerError::Runtime {
                    message: "server stopped without a shutdown request".to_string(),
                });
            }
        }

        self.lifecycle.send_replace(LifecycleState::ShuttingDown);
        let grace_period = self.shutdown_config.graceful_timeout;
        info!(?grace_period, "draining in-flight requests");

        let outcome = match timeout(grace_period, &mut self.serve_task).await {
            Ok(joined) => joined.map_err(ServerError::from),
            Err(_) => {
                error!(
                    ?grace_period,
                    "in-flight requests did not finish within the grace period, closing connections"
                );
                self.force_close.cancel();
                if let Err(e) = (&mut self.serve_task).await {
                    warn!(error = %e, "serve task failed while closing connections");
                }
                Err(ServerError::DrainTimeout { grace_period })
            }
        };

        self.lifecycle.send_replace(LifecycleState::Stopped);
        match &outcome {
            Ok(()) => info!("server shut down gracefully"),
            Err(e) => warn!(error = %e, "server shut down with errors"),
        }
        outcome
    }
}

/// Accept connections until `shutdown` fires, then wait for the open ones
///
/// The listener is dropped as soon as shutdown begins so new connections are
/// refused. Open connections finish their current request and close; any still
/// open when `force_close` fires are dropped.
async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
    force_close: CancellationToken,
) {
    let connections = TaskTracker::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, remote_addr)) => {
                    connections.spawn(serve_connection(
                        stream,
                        remote_addr,
                        router.clone(),
                        shutdown.clone(),
                        force_close.clone(),
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
            () = shutdown.cancelled() => break,
        }
    }

    drop(listener);
    info!(
        open_connections = connections.len(),
        "no longer accepting connections"
    );

    connections.close();
    connections.wait().await;
}

async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    router: Router,
    shutdown: CancellationToken,
    force_close: CancellationToken,
) {
    let service = service_fn(move |request: Request<Incoming>| router.clone().oneshot(request));
    let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        () = shutdown.cancelled() => {
            connection.as_mut().graceful_shutdown();
            tokio::select! {
                result = connection.as_mut() => result,
                () = force_close.cancelled() => {
                    debug!(%remote_addr, "connection closed after the grace period");
                    return;
                }
            }
        }
    };

    if let Err(e) = result {
        debug!(%remote_addr, error = %e, "connection ended with an error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn server_creation() -> ServerResult<()> {
        let server = Server::new(ServiceConfig::for_testing(), ShutdownConfig::default())?;
        assert_eq!(server.config().system_code, "service-test");
        assert!(!server.cancellation_token().is_cancelled());
        assert_eq!(*server.lifecycle().borrow(), LifecycleState::Created);
        Ok(())
    }

    #[tokio::test]
    async fn programmatic_shutdown() -> ServerResult<()> {
        let server = Server::new(ServiceConfig::for_testing(), ShutdownConfig::default())?;

        assert!(!server.cancellation_token().is_cancelled());

        server.shutdown();

        assert!(server.cancellation_token().is_cancelled());
        assert!(server.state().cancellation_token.is_cancelled());
        Ok(())
    }

    #[test]
    fn shutdown_config_default() {
        let config = ShutdownConfig::default();
        assert_eq!(
            config.graceful_timeout,
            Duration::from_secs(DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS)
        );
    }

    #[test]
    fn shutdown_config_follows_service_config() {
        let config = ServiceConfig::for_testing();
        assert_eq!(
            ShutdownConfig::from_config(&config).graceful_timeout,
            config.shutdown_grace_seconds.value()
        );
    }

    #[test]
    fn lifecycle_states_are_ordered() {
        assert!(LifecycleState::Created < LifecycleState::Listening);
        assert!(LifecycleState::Listening < LifecycleState::ShuttingDown);
        assert!(LifecycleState::ShuttingDown < LifecycleState::Stopped);
        assert_eq!(LifecycleState::ShuttingDown.to_string(), "shutting-down");
    }

    #[tokio::test]
    async fn lifecycle_check_is_registered_last() -> ServerResult<()> {
        let health = HealthService::new(ServiceConfig::for_testing().identity()).with_check(
            HealthCheck::new("database", "Database", || async { Ok("ok".to_string()) }),
        );
        let server = Server::with_components(
            ServiceConfig::for_testing(),
            ShutdownConfig::default(),
            health,
            business_routes(),
        )?;

        let ids: Vec<_> = server
            .state()
            .health()
            .checks()
            .iter()
            .map(HealthCheck::id)
            .collect();
        assert_eq!(ids, ["database", HTTP_SERVER_CHECK_ID]);
        Ok(())
    }

    #[tokio::test]
    async fn lifecycle_check_fails_after_shutdown() -> ServerResult<()> {
        let server = Server::new(ServiceConfig::for_testing(), ShutdownConfig::default())?;
        assert!(server.state().health().good_to_go().await.ok);

        server.shutdown();

        let gtg = server.state().health().good_to_go().await;
        assert!(!gtg.ok);
        assert!(gtg.message.contains(HTTP_SERVER_CHECK_ID));
        Ok(())
    }

    #[tokio::test]
    async fn start_and_shutdown_without_traffic() -> ServerResult<()> {
        let server = Server::new(ServiceConfig::for_testing(), ShutdownConfig::default())?;
        let running = server.start().await?;
        assert_ne!(running.local_addr().port(), 0);
        assert_eq!(*running.lifecycle().borrow(), LifecycleState::Listening);

        running.shutdown();
        let lifecycle = running.lifecycle();
        running.wait().await?;
        assert_eq!(*lifecycle.borrow(), LifecycleState::Stopped);
        Ok(())
    }
}
