//! JSON API over the engine.
//!
//! All endpoints are `POST` with a JSON body:
//! - `/profile`: normalized 1 kWp production profile
//! - `/analyze`: capacity sweep and key variants
//! - `/seasonality`: seasonal sizing search
//! - `/economics/analyze`: NPV, IRR, LCOE and payback of one variant
//! - `/economics/sensitivity`: tornado data
//! - `/scoring/analyze`: ranked offers
//!
//! Input errors return `400` with `{error, field}`; requests exceeding the
//! server timeout return `504`.

mod handlers;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::post;
use tracing::info;

pub use types::{ApiError, ErrorResponse, SensitivityRequest};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Shared, read-only server settings.
pub struct AppState {
    /// Longest a request may run before its sweep is cancelled.
    pub request_timeout: Duration,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Builds the axum router with all API routes.
///
/// # Arguments
///
/// * `state` - Shared application state
///
/// # Returns
///
/// Configured `Router` ready to serve.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/profile", post(handlers::post_profile))
        .route("/analyze", post(handlers::post_analyze))
        .route("/seasonality", post(handlers::post_seasonality))
        .route("/economics/analyze", post(handlers::post_economics))
        .route("/economics/sensitivity", post(handlers::post_sensitivity))
        .route("/scoring/analyze", post(handlers::post_scoring))
        .with_state(state)
}

/// Binds to the given address and serves the API.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
