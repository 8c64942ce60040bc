// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Termination signal handling
//!
//! Handlers are registered up front so a registration failure surfaces as a
//! startup error instead of a panic in a background task.

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::error::{ServerError, ServerResult};

/// Registered SIGTERM and SIGINT handlers
#[derive(Debug)]
pub struct ShutdownSignals {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    /// Register the termination signal handlers
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Signal` if a handler cannot be registered.
    #[cfg(unix)]
    pub fn install() -> ServerResult<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        let sigterm = signal(SignalKind::terminate()).map_err(|e| ServerError::Signal {
            message: format!("failed to register SIGTERM handler: {e}"),
        })?;
        let sigint = signal(SignalKind::interrupt()).map_err(|e| ServerError::Signal {
            message: format!("failed to register SIGINT handler: {e}"),
        })?;

        Ok(Self { sigterm, sigint })
    }

    /// Register the termination signal handlers
    ///
    /// # Errors
    ///
    /// Never fails on this platform; ctrl-c registration errors surface in [`Self::recv`].
    #[cfg(not(unix))]
    pub fn install() -> ServerResult<Self> {
        Ok(Self {})
    }

    /// Wait for the next termination signal and return its name
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Signal` if the signal stream is closed.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> ServerResult<&'static str> {
        let received = tokio::select! {
            received = self.sigterm.recv() => received.map(|()| "SIGTERM"),
            received = self.sigint.recv() => received.map(|()| "SIGINT"),
        };

        received.ok_or_else(|| ServerError::Signal {
            message: "signal stream closed".to_string(),
        })
    }

    /// Wait for ctrl-c
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Signal` if the handler cannot be installed.
    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> ServerResult<&'static str> {
        tokio::signal::ctrl_c()
            .await
            .map(|()| "CTRL+C")
            .map_err(|e| ServerError::Signal {
                message: format!("failed to listen for ctrl-c: {e}"),
            })
    }
}

/// Cancel `cancellation_token` when the first termination signal arrives
///
/// Returns early if the token is cancelled by other means. Further signals
/// received while draining are ignored.
pub async fn forward_signals(mut signals: ShutdownSignals, cancellation_token: CancellationToken) {
    tokio::select! {
        received = signals.recv() => match received {
            Ok(signal_name) => {
                warn!(signal = signal_name, "shutdown signal received, starting graceful shutdown");
                cancellation_token.cancel();
            }
            Err(e) => error!(error = %e, "stopped listening for shutdown signals"),
        },
        () = cancellation_token.cancelled() => {}
    }
}
