//! Channel Relay - caching, quota-aware relay server
//!
//! Serves channel data, analysis streams and email validation over HTTP.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use channel_relay::{create_router, spawn_cleanup_task, spawn_mutex_sweep, AppState, Config};

/// Main entry point for the relay server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the relay context with its caches, trackers and providers
/// 4. Start the cache cleanup and mutex sweep tasks
/// 5. Serve the router until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "channel_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Channel Relay");

    let config = Config::from_env();
    info!(
        port = config.server_port,
        daily_quota = config.daily_quota,
        channel_batch_size = config.channel_batch_size,
        analysis_batch_size = config.analysis_batch_size,
        model = %config.openai_model,
        "configuration loaded"
    );
    for key in config.missing_keys() {
        warn!(key, "provider key not configured; calls through it will fail");
    }

    let port = config.server_port;
    let cleanup_interval = config.cleanup_interval;
    let sweep_interval = config.mutex_cleanup_interval;

    let state = AppState::from_config(config).context("failed to build relay context")?;
    info!(caches = state.context.registry.len(), "relay context initialized");

    let background = vec![
        spawn_cleanup_task(state.context.registry.clone(), cleanup_interval),
        spawn_mutex_sweep(state.context.mutex.clone(), sweep_interval),
    ];

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(background))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then aborts the background
/// tasks.
async fn shutdown_signal(background: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
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

    for handle in &background {
        handle.abort();
    }
    warn!(tasks = background.len(), "background tasks aborted");
}
