//! Process shutdown signalling.

use tokio::sync::watch;
use tracing::{error, info};

/// Create the shutdown channel shared with the publisher loop.
pub fn channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Wait for Ctrl+C or SIGTERM.
///
/// A handler that cannot be registered never fires, so only a delivered
/// signal returns.
pub async fn wait_for_signal() {
    tokio::select! {
        _ = interrupt() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

async fn interrupt() {
    delivered(tokio::signal::ctrl_c(), "Ctrl+C").await;
}

/// Resolve once `signal` is delivered. Never resolves if listening failed.
async fn delivered(signal: impl Future<Output = std::io::Result<()>>, name: &str) {
    if let Err(e) = signal.await {
        error!(error = %e, signal = name, "Failed to listen for signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Failed to listen for SIGTERM");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
