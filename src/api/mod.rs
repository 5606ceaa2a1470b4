//! # API Module
//!
//! HTTP surface of the server. The same JSON-RPC handler that serves stdio
//! is mounted at `POST /api/rpc`.
//!
//! ## Available Endpoints
//!
//! - `GET /api/health` - Liveness and basic server facts
//! - `POST /api/rpc` - MCP JSON-RPC requests

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub mod health;
pub mod rpc;

/// The full HTTP application with tracing and permissive CORS.
pub fn router(state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(health::health_handler))
        .route("/rpc", post(rpc::rpc_handler));

    Router::new()
        .nest("/api", api_router)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
