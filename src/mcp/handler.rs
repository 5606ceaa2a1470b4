//! # MCP Handler Module
//!
//! Implements the Model Context Protocol methods the server answers:
//! `initialize`, `ping`, `tools/list` and `tools/call`. Tool names are also
//! accepted as methods and rewritten into `tools/call`.

use crate::{
    mcp::protocol::{error_codes, Request, Response},
    tools, AppState,
};
use serde_json::{json, Value};
use tracing::{debug, info};

pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// This is the main dispatcher for all incoming MCP requests.
pub async fn handle_mcp_request(req: Request, state: AppState) -> Option<Response> {
    info!("Handling MCP request for method: {}", req.method);

    if req.is_notification() {
        debug!("Ignoring notification {}", req.method);
        return None;
    }

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(&req),
        "ping" => Response::success(req.id.clone(), json!({})),
        "tools/list" => handle_tools_list(&req),
        "tools/call" => handle_tool_call(req, &state).await,
        // Direct method calls are rewritten into tools/call
        method if tools::find(method).is_some() => {
            let wrapped = Request {
                jsonrpc: req.jsonrpc.clone(),
                id: req.id.clone(),
                method: "tools/call".to_string(),
                params: Some(json!({
                    "name": method,
                    "arguments": req.params.clone().unwrap_or_else(|| json!({}))
                })),
            };
            handle_tool_call(wrapped, &state).await
        }
        _ => Response::error(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };

    Some(response)
}

fn handle_initialize(req: &Request) -> Response {
    let server_info = json!({
        "name": "eth_mcp",
        "version": env!("CARGO_PKG_VERSION")
    });
    let capabilities = json!({ "tools": { "listChanged": false } });
    let instructions = "Ethereum and EVM-chain MCP server. Every chain tool accepts an optional `provider` \
        (network name or RPC URL) and `chainId`; without them the default network is used. \
        Load or generate a wallet before calling tools that send transactions.";

    Response::success(
        req.id.clone(),
        json!({
            "serverInfo": server_info,
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": capabilities,
            "instructions": instructions
        }),
    )
}

fn handle_tools_list(req: &Request) -> Response {
    let tools: Vec<Value> = tools::catalog().iter().map(|t| t.spec.describe()).collect();
    Response::success(req.id.clone(), json!({ "tools": tools }))
}

/// Handles a 'tools/call' request. Tool failures come back as successful
/// JSON-RPC responses carrying an `isError` envelope.
async fn handle_tool_call(req: Request, state: &AppState) -> Response {
    let params = match req.params.as_ref() {
        Some(p) => p,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'params' object".into(),
            )
        }
    };

    let tool_name = match params.get("name").and_then(|n| n.as_str()) {
        Some(name) => name,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'name' field in params".into(),
            )
        }
    };

    let empty_args = json!({});
    let args = params.get("arguments").unwrap_or(&empty_args);

    let result = tools::dispatch(state, tool_name, args).await;
    match serde_json::to_value(&result) {
        Ok(value) => Response::success(req.id, value),
        Err(e) => Response::error(
            req.id,
            error_codes::INVALID_PARAMS,
            format!("Could not encode result of {}: {}", tool_name, e),
        ),
    }
}
