//! Campus Realtime server binary
//!
//! Loads configuration, wires the gateway and serves the WebSocket endpoint
//! alongside the internal emit API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campus_realtime::{create_router, spawn_sweep_task, AppState, Config, StaticDirectory};

/// Main entry point for the realtime gateway.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Load the user directory (auth service, record store, conversation authorizer)
/// 4. Wire the gateway and start the admin cache sweep task
/// 5. Start HTTP server on configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_realtime=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Campus Realtime gateway");

    let config = Config::from_env();
    info!(
        port = config.server_port,
        admin_cache_max_entries = config.admin_cache_max_entries,
        sliding_ms = config.admin_cache_sliding_ms,
        absolute_ms = config.admin_cache_absolute_ms,
        sweep_ms = config.sweep_interval_ms,
        evict_displaced = config.evict_displaced_connections,
        "Configuration loaded"
    );

    let directory = match &config.directory_file {
        Some(path) => StaticDirectory::from_file(path)?,
        None => {
            warn!("DIRECTORY_FILE not set; every connection will be rejected");
            StaticDirectory::new()
        }
    };
    info!(users = directory.user_count(), "Directory loaded");
    let directory = Arc::new(directory);

    if config.emit_api_key.is_none() {
        warn!("EMIT_API_KEY not set; the emit API will refuse every request");
    }
    let state = AppState::new(directory.clone(), directory.clone(), directory, &config);

    let sweep_handle = spawn_sweep_task(state.lookup.clone(), config.sweep_interval());
    info!("Background sweep task started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sweep_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the sweep task and allows graceful shutdown.
async fn shutdown_signal(sweep_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    sweep_handle.abort();
    warn!("Sweep task aborted");
}
