pub mod discovery;
pub mod mcp;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::mcp::protocol::SERVER_NAME;
use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health + MCP entry point
        .route("/", get(health).post(mcp::entry))
        .route("/registry", get(mcp::registry))
        // Discovery (REST)
        .route("/servers", get(discovery::list_servers))
        .route("/sessions", get(discovery::list_sessions))
        .route("/tags", get(discovery::get_tags))
        .route("/tags/batch", post(discovery::get_tags_batch))
        .route("/value", get(discovery::read_value))
        .route("/prompt", get(discovery::get_prompt))
        .route("/prompt/batch", post(discovery::get_prompt_batch))
}

/// `GET /`
async fn health() -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "name": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": message.into() }))).into_response()
}
