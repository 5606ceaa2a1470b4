use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::AppState;

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let wallet_loaded = state.wallets.active().await.is_some();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "defaultNetwork": state.config.default_network,
        "networks": state.registry.names(),
        "cachedProviders": state.resolver.cached(),
        "walletLoaded": wallet_loaded,
    }))
}
