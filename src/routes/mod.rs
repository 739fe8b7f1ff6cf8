//! API Routes
//!
//! This module organizes all HTTP endpoints for the application:
//! - `/api/sessions` - Session lifecycle and per-session credential
//! - `/api/sessions/{id}/dataset`, `/dictionary` - CSV uploads
//! - `/api/sessions/{id}/analysis` - "Analyze CSV with AI" toggle
//! - `/api/sessions/{id}/chat` - Chat turns
//! - `/api/sessions/{id}/chart-suggestions` - AI chart recommendations
//! - `/api/sessions/{id}/plot`, `/plot.svg` - Auto plotting
//! - `/api/health` - Health checks

pub mod analysis;
pub mod chat;
pub mod files;
pub mod health;
pub mod plots;
pub mod sessions;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::apply_cors;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let max_upload = state.config.server.max_upload_bytes;
    let origins = state.config.server.cors_allowed_origins.clone();

    let api_router = Router::new()
        .merge(sessions::router(state.clone()))
        .merge(files::router(state.clone()))
        .merge(analysis::router(state.clone()))
        .merge(chat::router(state.clone()))
        .merge(plots::router(state.clone()))
        .merge(health::router(state));

    apply_cors(api_router, &origins)
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(TraceLayer::new_for_http())
}
