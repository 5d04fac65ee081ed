use axum::{extract::State, Json};
use serde_json::Value;

use crate::mcp::{
    handler::handle_mcp_request,
    protocol::{error_codes, Request, Response},
};
use crate::AppState;

// Forward JSON-RPC requests over HTTP to the MCP handler
pub async fn rpc_handler(State(state): State<AppState>, Json(req): Json<Request>) -> Json<Response> {
    match handle_mcp_request(req, state).await {
        Some(resp) => Json(resp),
        None => Json(Response::error(
            Value::Null,
            error_codes::INVALID_REQUEST,
            "Notifications are not supported over HTTP".into(),
        )),
    }
}
