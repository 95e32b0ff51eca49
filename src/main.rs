//! Countdown Timer - A single-screen countdown timer
//!
//! This is the main entry point serving the timer over HTTP.

use std::sync::Arc;
use anyhow::anyhow;
use tokio::net::TcpListener;
use tracing::info;

use countdown_timer::{
    api::create_router,
    config::Config,
    scheduler::TokioTimer,
    state::AppState,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("countdown_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting countdown-timer v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}", config.host, config.port);

    let timer = TokioTimer::try_current().map_err(|e| anyhow!(e))?;
    let state = Arc::new(AppState::new(config.port, config.host.clone(), Arc::new(timer)));

    let app = create_router(Arc::clone(&state));

    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /input/:field - Set hours, minutes or seconds from text");
    info!("  POST /toggle       - Start or stop the countdown");
    info!("  GET  /status       - Current timer and server status");
    info!("  GET  /events       - Server-sent timer updates");
    info!("  GET  /health       - Health check");

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    state.shutdown();
    info!("Server shutdown complete");
    Ok(())
}
