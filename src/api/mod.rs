//! # API Module
//!
//! HTTP mode for the wallet MCP server.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Liveness plus the current chain and wallet mode
//! - `POST /api/rpc` - JSON-RPC 2.0 MCP requests (`initialize`, `tools/list`, `tools/call`)

pub mod health;
pub mod rpc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

/// The HTTP router with all routes nested under `/api`.
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
