//! Graceful shutdown: a one-shot stop flag and the signal listener that sets it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;

/// Shared, monotonic "stop requested" flag.
///
/// Cloning yields another handle to the same flag. The flag only ever goes
/// from `false` to `true`.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
}

impl StopToken {
    /// Create a token with no stop requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop.
    ///
    /// Returns `true` if this call performed the transition, `false` if a stop
    /// was already requested.
    pub fn request_stop(&self) -> bool {
        !self.stopped.swap(true, Ordering::AcqRel)
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Spawn a task that requests a stop on SIGINT or SIGTERM.
///
/// The first signal schedules the stop; the running tick is allowed to
/// finish. Later signals are logged and otherwise ignored.
pub fn spawn_signal_listener(token: StopToken) -> JoinHandle<()> {
    tracing::info!("Signal handler installed");

    tokio::spawn(async move {
        loop {
            let signal = wait_for_signal().await;
            if token.request_stop() {
                tracing::info!(signal, "Signal caught, scheduling a stop");
            } else {
                tracing::info!(signal, "Signal caught, stop already scheduled");
            }
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Failed to listen for SIGINT");
                        std::future::pending::<()>().await;
                    }
                    "SIGINT"
                }
                _ = sigterm.recv() => "SIGTERM",
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to register SIGTERM handler, using SIGINT only");
            ctrl_c_only().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c_only().await
}

async fn ctrl_c_only() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    "SIGINT"
}
