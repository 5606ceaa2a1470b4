// src/api/rpc.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::Value;
use tracing::debug;

use crate::mcp::handler::handle_mcp_request;
use crate::mcp::protocol::{error_codes, Request, Response};
use crate::AppState;

/// Forwards JSON-RPC requests over HTTP to the MCP handler. A body that is
/// not a JSON-RPC request gets a parse error instead of axum's rejection.
pub async fn rpc_handler(State(state): State<AppState>, body: String) -> impl IntoResponse {
    let req = match serde_json::from_str::<Request>(&body) {
        Ok(req) => req,
        Err(e) => {
            debug!("Rejecting malformed RPC body: {}", e);
            return (
                StatusCode::OK,
                Json(Response::error(
                    Value::Null,
                    error_codes::PARSE_ERROR,
                    format!("Parse error: {}", e),
                )),
            )
                .into_response();
        }
    };

    match handle_mcp_request(req, state).await {
        Some(resp) => (StatusCode::OK, Json(resp)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
