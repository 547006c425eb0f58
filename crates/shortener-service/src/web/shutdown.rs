//! Shutdown requests raised from inside the request pipeline.
//!
//! The channel holds at most one pending notice; further requests while one is
//! pending are dropped.

use crate::errors::WebError;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Why shutdown was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownNotice {
    pub reason: String,
}

/// Sending half, cloned into every mounted route.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: mpsc::Sender<ShutdownNotice>,
}

/// Receiving half, owned by `main`.
#[derive(Debug)]
pub struct ShutdownListener {
    rx: mpsc::Receiver<ShutdownNotice>,
}

/// Create a connected signal/listener pair.
pub fn shutdown_channel() -> (ShutdownSignal, ShutdownListener) {
    let (tx, rx) = mpsc::channel(1);
    (ShutdownSignal { tx }, ShutdownListener { rx })
}

impl ShutdownSignal {
    /// Queue a shutdown notice. Returns `true` if this call queued it.
    pub fn request(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        match self.tx.try_send(ShutdownNotice {
            reason: reason.clone(),
        }) {
            Ok(()) => {
                tracing::warn!(target: "shortener.web.shutdown", reason = %reason, "Shutdown requested");
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::debug!(target: "shortener.web.shutdown", reason = %reason, "Shutdown already pending");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(target: "shortener.web.shutdown", reason = %reason, "Shutdown listener gone");
                false
            }
        }
    }

    /// Request shutdown for an error that escaped the pipeline, unless it is
    /// an ordinary client disconnect.
    pub fn report(&self, err: &WebError) -> bool {
        if err.is_client_disconnect() {
            tracing::debug!(target: "shortener.web.shutdown", error = %err, "Client disconnected");
            return false;
        }
        self.request(err.to_string())
    }
}

impl ShutdownListener {
    /// Wait for the next notice. `None` once every signal has been dropped.
    pub async fn recv(&mut self) -> Option<ShutdownNotice> {
        self.rx.recv().await
    }

    /// Pending notice, if any.
    pub fn try_recv(&mut self) -> Option<ShutdownNotice> {
        self.rx.try_recv().ok()
    }
}
