//! Signal handling for graceful shutdown

use futures::{future, stream::StreamExt};
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use tracing::{error, info};

/// Signals that end the server
pub const SHUTDOWN_SIGNALS: [i32; 3] = [SIGTERM, SIGINT, SIGHUP];

/// Wait for a shutdown signal and return its number.
///
/// If the handler cannot be installed the error is logged and this never
/// resolves, leaving the server running until it is killed.
pub async fn shutdown_signal() -> i32 {
    let mut signals = match Signals::new(SHUTDOWN_SIGNALS) {
        Ok(signals) => signals,
        Err(e) => {
            error!("Failed to install shutdown signal handler: {}", e);
            return future::pending().await;
        }
    };

    match signals.next().await {
        Some(signal) => {
            info!("Received signal: {}", signal);
            signal
        }
        None => future::pending().await,
    }
}
