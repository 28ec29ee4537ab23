//! route_cache demo server
//!
//! Serves a small `/things` resource through the response cache.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use route_cache::api::{create_router, AppState};
use route_cache::{spawn_sweep_task, Cache, Config, SimpleBackend};

/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the cache on the configured backend
/// 4. Start the expiry sweep if enabled
/// 5. Serve the router on the configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "route_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting route_cache demo server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: backend={}, strategy={}, threshold={}, default_timeout={}s, port={}, cleanup_interval={}s",
        config.backend,
        config.strategy,
        config.threshold,
        config.default_timeout,
        config.server_port,
        config.cleanup_interval
    );

    // The in-process store is kept by concrete type for the sweep and /stats.
    let (cache, store) = if config.backend == "simple" {
        let store = Arc::new(SimpleBackend::new(config.threshold, config.default_timeout));
        let cache = Cache::with_backend(config.clone(), store.clone());
        (cache, Some(store))
    } else {
        let cache = Cache::new(config.clone()).context("failed to build cache backend")?;
        (cache, None)
    };

    let sweep_handle = match &store {
        Some(store) if config.cleanup_interval > 0 => {
            Some(spawn_sweep_task(store.clone(), config.cleanup_interval))
        }
        _ => None,
    };

    let app = create_router(AppState::new(Arc::new(cache), store));

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

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then aborts the sweep.
async fn shutdown_signal(sweep_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
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

    if let Some(handle) = sweep_handle {
        handle.abort();
        warn!("Expiry sweep aborted");
    }
}
