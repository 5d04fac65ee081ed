use axum::{extract::State, response::IntoResponse, Json};

use crate::AppState;

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let account = state.container.wallet().get_current_account().await;
    Json(serde_json::json!({
        "status": "ok",
        "chainId": account.chain_id,
        "walletMode": account.wallet_mode,
        "connected": account.is_connected,
    }))
}
