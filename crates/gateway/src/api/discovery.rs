//! REST surface over the discovery service.
//!
//! - `GET  /servers`       : configured known servers
//! - `GET  /sessions`      : session registry snapshot
//! - `GET  /tags`          : tags of one endpoint
//! - `POST /tags/batch`    : tags of many endpoints, failures inline
//! - `GET  /value`         : current value of one node
//! - `GET  /prompt`        : modeling prompt for one endpoint
//! - `POST /prompt/batch`  : modeling prompt across endpoints

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::api_error;
use crate::discovery::{compose, DiscoveryError};
use crate::mcp::tools::{BatchArgs, EndpointArgs};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Deserialize)]
pub struct ValueQuery {
    server_url: String,
    node_id: String,
}

#[derive(Serialize)]
struct SessionView {
    server_url: String,
    state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An unusable address is the caller's fault; anything else is ours.
fn discovery_error(e: DiscoveryError) -> Response {
    let status = match &e {
        DiscoveryError::InvalidEndpoint(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::warn!(error = %e, status = status.as_u16(), "discovery request failed");
    api_error(status, e.to_string())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `GET /servers`
pub async fn list_servers(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.config.discovery.known_servers.clone())
}

/// `GET /sessions`
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions: Vec<SessionView> = state
        .sessions
        .sessions()
        .into_iter()
        .map(|info| SessionView {
            server_url: info.url.to_string(),
            state: info.state.to_string(),
            last_error: info.last_error,
        })
        .collect();
    Json(sessions)
}

/// `GET /tags?server_url=&skip_system_tags=`
pub async fn get_tags(
    State(state): State<AppState>,
    query: Result<Query<EndpointArgs>, QueryRejection>,
) -> Response {
    let Query(args) = match query {
        Ok(q) => q,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, e.body_text()),
    };
    let skip = args
        .skip_system_tags
        .unwrap_or(state.discovery.default_skip_system_tags());

    match state.discovery.tags(&args.server_url, skip).await {
        Ok(tags) => Json(tags).into_response(),
        Err(e) => discovery_error(e),
    }
}

/// `POST /tags/batch`
pub async fn get_tags_batch(
    State(state): State<AppState>,
    body: Result<Json<BatchArgs>, JsonRejection>,
) -> Response {
    let Json(args) = match body {
        Ok(b) => b,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, e.body_text()),
    };
    let skip = args
        .skip_system_tags
        .unwrap_or(state.discovery.default_skip_system_tags());

    Json(state.discovery.tags_batch(&args.servers, skip).await).into_response()
}

/// `GET /value?server_url=&node_id=`
///
/// A failed read answers `{"value": null}`; only an unusable address or an
/// unreachable endpoint is an error.
pub async fn read_value(
    State(state): State<AppState>,
    query: Result<Query<ValueQuery>, QueryRejection>,
) -> Response {
    let Query(q) = match query {
        Ok(q) => q,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, e.body_text()),
    };

    match state.discovery.read_value(&q.server_url, &q.node_id).await {
        Ok(reading) => Json(reading).into_response(),
        Err(e) => discovery_error(e),
    }
}

/// `GET /prompt?server_url=&skip_system_tags=`
pub async fn get_prompt(
    State(state): State<AppState>,
    query: Result<Query<EndpointArgs>, QueryRejection>,
) -> Response {
    let Query(args) = match query {
        Ok(q) => q,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, e.body_text()),
    };
    let skip = args
        .skip_system_tags
        .unwrap_or(state.discovery.default_skip_system_tags());

    match state.discovery.tags(&args.server_url, skip).await {
        Ok(tags) => Json(json!({ "prompt": compose(&tags) })).into_response(),
        Err(e) => discovery_error(e),
    }
}

/// `POST /prompt/batch`
pub async fn get_prompt_batch(
    State(state): State<AppState>,
    body: Result<Json<BatchArgs>, JsonRejection>,
) -> Response {
    let Json(args) = match body {
        Ok(b) => b,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, e.body_text()),
    };
    let skip = args
        .skip_system_tags
        .unwrap_or(state.discovery.default_skip_system_tags());

    Json(state.discovery.prompt_batch(&args.servers, skip).await).into_response()
}
