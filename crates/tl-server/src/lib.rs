//! tl-server: upload orchestration, video job tracking and the HTTP surface.
//!
//! This crate ties tl-core and tl-media into a running service. It provides:
//!
//! - [`progress::ProgressTracker`], the in-memory job table with expiry
//! - [`pipeline::VideoPipeline`], the staged video job state machine
//! - [`orchestrator::UploadOrchestrator`], which validates uploads and picks
//!   synchronous or fire-and-forget execution
//! - An Axum HTTP API for uploads, progress polling and diagnostics
//! - Graceful shutdown that drains in-flight video jobs

pub mod context;
pub mod error;
pub mod middleware;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod router;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use tl_core::config::Config;
use tl_media::{FfmpegBackend, ToolRegistry, VideoBackend};
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;

/// Start the travelog media server.
///
/// Creates the upload directories, discovers ffmpeg, starts the expiry
/// sweeper and serves HTTP until a shutdown signal arrives. In-flight video
/// jobs are allowed to finish before this returns.
pub async fn start(config: Config) -> tl_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let layout = config.uploads.layout();
    layout.ensure()?;
    tracing::info!("Upload root at {}", layout.root.display());

    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    for info in tools.check_all() {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}; video uploads will fail", info.name);
        }
    }

    let backend: Arc<dyn VideoBackend> =
        Arc::new(FfmpegBackend::new(tools.clone(), config.video.clone()));
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| tl_core::Error::Internal(format!("Invalid server address: {e}")))?;
    let sweep_interval = config.jobs.sweep_interval();

    let ctx = AppContext::new(config, tools, backend);

    let cancel = CancellationToken::new();
    let sweeper = progress::start_sweeper(ctx.tracker.clone(), sweep_interval, cancel.clone());

    let app = router::build_router(ctx.clone());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| tl_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;
    tracing::info!("Starting server on {addr}");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await;
    if let Err(e) = &served {
        tracing::error!("Server error: {e}");
    }

    cancel.cancel();
    if let Err(e) = sweeper.await {
        tracing::debug!("Sweeper task ended abnormally: {e}");
    }
    ctx.orchestrator.shutdown().await;

    tracing::info!("Server shutdown complete");
    served.map_err(tl_core::Error::from)
}

/// Wait for SIGINT, SIGTERM or cancellation.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
