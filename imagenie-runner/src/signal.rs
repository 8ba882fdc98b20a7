//! Shutdown signal handling.

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal received.
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Cancels `token` on the first shutdown signal.
///
/// The listener exits quietly if the token is cancelled some other way.
pub fn cancel_on_signal(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = wait_for_shutdown_signal() => match result {
                Ok(signal) => {
                    info!(signal, "shutdown signal received, cancelling run");
                    token.cancel();
                }
                Err(e) => error!(error = %e, "signal handling unavailable"),
            },
            () = token.cancelled() => {}
        }
    })
}
