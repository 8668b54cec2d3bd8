//! Graceful-close plumbing.
//!
//! A [`CloseHandle`] is a cloneable flag backed by a `watch` channel. The
//! connection manager selects on it; the CLI flips it from a signal
//! listener:
//! - SIGTERM/SIGINT on Unix
//! - Ctrl+C elsewhere

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

/// A handle for requesting or checking a graceful close.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CloseHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CloseHandle {
    /// Creates a handle in the "open" state.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Requests a graceful close.
    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    /// Returns true if a close has been requested.
    pub fn is_closed(&self) -> bool {
        *self.rx.borrow()
    }

    /// Returns a future that completes once a close is requested.
    pub fn wait(&self) -> CloseSignal {
        CloseSignal {
            rx: self.rx.clone(),
        }
    }
}

/// A future-like signal that completes when a close is requested.
pub struct CloseSignal {
    rx: watch::Receiver<bool>,
}

impl CloseSignal {
    /// Waits for the close request.
    pub async fn wait(mut self) {
        // An error means every sender is gone, so no close can ever come.
        let requested = self.rx.wait_for(|closed| *closed).await.is_ok();
        if !requested {
            std::future::pending::<()>().await;
        }
    }
}

/// Spawns a task that requests a close on SIGTERM or SIGINT.
#[cfg(unix)]
pub fn spawn_listener(handle: CloseHandle) {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(error = %e, "failed to install signal handlers, using Ctrl+C only");
                    wait_ctrl_c(handle).await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, closing"),
            _ = sigint.recv() => info!("received SIGINT, closing"),
            _ = handle.wait().wait() => {}
        }
        handle.close();
        debug!("signal listener stopped");
    });
}

/// Spawns a task that requests a close on Ctrl+C.
#[cfg(not(unix))]
pub fn spawn_listener(handle: CloseHandle) {
    tokio::spawn(wait_ctrl_c(handle));
}

async fn wait_ctrl_c(handle: CloseHandle) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("received Ctrl+C, closing"),
            Err(e) => {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
        },
        _ = handle.wait().wait() => {}
    }
    handle.close();
}
