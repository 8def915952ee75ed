//! Tool catalog and the dual-envelope entry point.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::mcp::Reply;
use crate::state::AppState;

/// `GET /registry`
pub async fn registry(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.document())
}

/// `POST /`: JSON-RPC 2.0 or legacy flat call, told apart by the body.
pub async fn entry(State(state): State<AppState>, body: Bytes) -> Reply {
    state.dispatcher.dispatch(&body).await
}
