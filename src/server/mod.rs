//! API server
//!
//! Exposes download progress over HTTP for the voice-generation frontend.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /api/models/:model/progress` - Latest progress record for a model
//! - `GET /api/models/:model/progress/stream` - Live progress event stream
//! - `GET /api/models/downloads/active` - All in-flight downloads
//!
//! # Example
//!
//! ```no_run
//! use vocalis::server::Server;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let server = Server::new(8788);
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use futures_util::StreamExt;
use serde::Serialize;

use crate::progress::{ProgressRecord, ProgressStore};

// Maximum request body size (64KB; the API only serves reads)
const MAX_BODY_SIZE: usize = 64 * 1024;

/// Server state shared across handlers.
pub struct AppState {
    /// The process-wide progress store.
    pub store: Arc<ProgressStore>,
}

/// API server configuration.
#[derive(Debug)]
pub struct Server {
    /// Port to listen on.
    port: u16,
    /// Address to bind to (defaults to 127.0.0.1 for security).
    bind_address: String,
}

impl Default for Server {
    fn default() -> Self {
        Self::new(8788)
    }
}

impl Server {
    /// Create a new server with the specified port.
    /// By default, binds to 127.0.0.1 (localhost only) for security.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            bind_address: "127.0.0.1".to_string(),
        }
    }

    /// Set the bind address.
    /// Use "0.0.0.0" to allow network access, "127.0.0.1" (default) for localhost only.
    pub fn with_bind_address(mut self, addr: impl Into<String>) -> Self {
        self.bind_address = addr.into();
        self
    }

    /// Build the router with all routes, backed by the global progress store.
    pub fn build_router(&self) -> Router {
        Self::build_router_with_store(ProgressStore::global())
    }

    /// Build the router against an explicit store. Tests use this to avoid
    /// sharing the process-wide instance.
    pub fn build_router_with_store(store: Arc<ProgressStore>) -> Router {
        let state = Arc::new(AppState { store });

        Router::new()
            .route("/health", get(health_handler))
            .route("/api/models/downloads/active", get(active_downloads_handler))
            .route("/api/models/:model/progress", get(model_progress_handler))
            .route(
                "/api/models/:model/progress/stream",
                get(progress_stream_handler),
            )
            .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
            .with_state(state)
    }

    /// Start the server with graceful shutdown.
    pub async fn start(&self) -> Result<()> {
        let router = self.build_router();
        let addr = format!("{}:{}", self.bind_address, self.port);

        tracing::info!("Starting server on {}", addr);

        if self.bind_address == "0.0.0.0" {
            tracing::warn!(
                "Server is binding to 0.0.0.0 which exposes the API to the network. \
                Use 127.0.0.1 (default) for local-only access."
            );
        }

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                anyhow::anyhow!(
                    "Port {} is already in use. Another vocalis server may be running; \
                    stop it or pick a different port with --port <PORT>",
                    self.port
                )
            } else {
                anyhow::anyhow!("Failed to bind to {}: {}", addr, e)
            }
        })?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }

    /// Get the port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: &'static str,
    active_downloads: usize,
}

/// Active downloads response.
#[derive(Serialize)]
struct ActiveDownloadsResponse {
    downloads: Vec<ProgressRecord>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION"),
        active_downloads: state.store.get_all_active().len(),
    })
}

/// Latest progress record for one model.
///
/// 404 when no download was ever recorded for the model.
async fn model_progress_handler(
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
) -> Result<Json<ProgressRecord>, (StatusCode, String)> {
    state.store.get_progress(&model).map(Json).ok_or((
        StatusCode::NOT_FOUND,
        format!("No download recorded for model '{}'", model),
    ))
}

/// All records still in flight.
async fn active_downloads_handler(
    State(state): State<Arc<AppState>>,
) -> Json<ActiveDownloadsResponse> {
    Json(ActiveDownloadsResponse {
        downloads: state.store.get_all_active(),
    })
}

/// Live progress stream for one model, as Server-Sent Events.
///
/// Emits one `data:` frame per progress record and `: heartbeat` comment
/// frames through idle periods. The response completes once a complete or
/// error record has been sent; a client that reconnects afterwards gets that
/// terminal record again immediately.
async fn progress_stream_handler(
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
) -> impl IntoResponse {
    tracing::debug!(target: "vocalis::server", model = %model, "progress stream opened");

    let frames = state
        .store
        .subscribe(&model)
        .map(|frame| Ok::<_, Infallible>(Bytes::from(frame.to_sse())));

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
}

/// Wait for a shutdown signal.
async fn shutdown_signal() {
    // On Unix, listen for SIGINT and SIGTERM
    // On Windows, fall back to Ctrl+C only
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt())
            .expect("failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown...");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
    }

    tracing::info!("Shutting down server");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::DownloadStatus;

    #[test]
    fn test_server_creation() {
        let server = Server::new(3000);
        assert_eq!(server.port(), 3000);
    }

    #[test]
    fn test_server_default() {
        let server = Server::default();
        assert_eq!(server.port(), 8788);
    }

    #[test]
    fn test_server_bind_address() {
        let server = Server::new(8080).with_bind_address("0.0.0.0");
        assert_eq!(server.bind_address, "0.0.0.0");
    }

    #[test]
    fn test_router_builds() {
        let store = Arc::new(ProgressStore::new());
        store.update_progress("modelA", 1, 2, "weights.bin", DownloadStatus::Downloading);
        let _router = Server::build_router_with_store(store);
    }
}
