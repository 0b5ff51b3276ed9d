//! HTTP orchestration API.
//!
//! Accepts calls, runs them in the background and serves their progress
//! and results for polling.
//!
//! # Feature Gate
//!
//! This module requires the `server` feature flag (on by default):
//! ```toml
//! [dependencies]
//! heavy-rs = { version = "...", features = ["server"] }
//! ```
//!
//! # Architecture
//!
//! ```text
//! POST /orchestrate ──▶ CallRegistry::start ──▶ tokio::spawn(Orchestrator::execute_with)
//!                           │                          │
//! GET  …/progress ◀── ProgressTracker ◀────────────────┤
//! GET  …/result   ◀── outcome ◀────────────────────────┘
//! DELETE …        ──▶ CancellationToken (child of the server root)
//! ```

pub mod params;
pub mod registry;
pub mod routes;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::agent::orchestrator::Orchestrator;

pub use params::{Accepted, ErrorBody, OrchestrateParams};
pub use registry::{CallRegistry, CallStatus, DEFAULT_RETAINED};
pub use routes::{AppState, router};

/// Serves the API on `listener` until `shutdown` is cancelled.
///
/// Cancelling `shutdown` also cancels every running call.
///
/// # Errors
///
/// Returns an error if the server encounters a runtime error.
pub async fn serve_on(
    listener: TcpListener,
    orchestrator: Arc<Orchestrator>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let registry = Arc::new(CallRegistry::new(DEFAULT_RETAINED, shutdown.child_token()));
    let app = router(AppState {
        orchestrator,
        registry: Arc::clone(&registry),
    });

    info!(addr = %listener.local_addr()?, "orchestration API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!(abandoned = registry.running(), "orchestration API stopped");
    Ok(())
}

/// Binds `host:port` and serves until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(orchestrator: Arc<Orchestrator>, host: &str, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    let shutdown = CancellationToken::new();

    let signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown requested, cancelling running orchestrations");
        signal.cancel();
    });

    serve_on(listener, orchestrator, shutdown).await
}
