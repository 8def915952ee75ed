//! The `POST /` entry point.
//!
//! Both envelopes run the same [`Dispatcher::execute`]; they differ only in
//! how a result or an error is framed on the way out.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::Instrument;

use super::envelope::{decode, Envelope, JsonRpcEnvelope, LegacyEnvelope, Request};
use super::protocol::{InitializeResult, JsonRpcError, JsonRpcResponse};
use super::registry::ToolRegistry;
use super::tools::ToolCall;
use super::DispatchError;
use crate::discovery::DiscoveryService;

/// A framed response: status plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    fn detail(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "detail": message.into() }),
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Stateless per request; shares discovery and the catalog with the REST
/// surface.
pub struct Dispatcher {
    discovery: Arc<DiscoveryService>,
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(discovery: Arc<DiscoveryService>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            discovery,
            registry,
        }
    }

    /// Decode `body`, run it and frame the outcome for its envelope.
    pub async fn dispatch(&self, body: &[u8]) -> Reply {
        let span = tracing::info_span!(
            "dispatch",
            request_id = %uuid::Uuid::new_v4(),
            envelope = tracing::field::Empty,
        );
        self.dispatch_decoded(body).instrument(span).await
    }

    async fn dispatch_decoded(&self, body: &[u8]) -> Reply {
        let envelope = match decode(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "rejected malformed request");
                return Reply::detail(StatusCode::BAD_REQUEST, e.to_string());
            }
        };
        tracing::Span::current().record("envelope", envelope.kind());

        match envelope {
            Envelope::JsonRpc(JsonRpcEnvelope { id, request }) => {
                frame_jsonrpc(id, self.execute(request).await)
            }
            Envelope::Legacy(LegacyEnvelope { request }) => {
                frame_legacy(self.execute(request).await)
            }
        }
    }

    /// Run a decoded request, returning the unframed result object.
    pub async fn execute(&self, request: Request) -> Result<Value, DispatchError> {
        match request {
            Request::Initialize => Ok(json!(InitializeResult::default())),
            Request::ListTools => Ok(json!(self.registry.list())),
            Request::CallTool { name, arguments } => {
                let tool = self.registry.lookup(&name).ok_or_else(|| {
                    DispatchError::UnknownOperation(format!("Tool '{name}' not found"))
                })?;
                let call = ToolCall::parse(tool, arguments).map_err(|e| {
                    DispatchError::InvalidArguments(format!("invalid arguments for {tool}: {e}"))
                })?;
                tracing::info!(tool = %tool, "invoking tool");
                let output = call.invoke(&self.discovery).await?;
                Ok(output.into_value())
            }
            Request::UnknownMethod(method) => Err(DispatchError::UnknownOperation(format!(
                "Method '{method}' not found"
            ))),
            Request::InvalidRequest(message) => Err(DispatchError::InvalidRequest(message)),
            Request::InvalidParams(message) => Err(DispatchError::InvalidArguments(message)),
        }
    }
}

/// Unknown operations and invalid requests stay inside a 200 JSON-RPC
/// response; argument and tool failures also set a transport status.
fn frame_jsonrpc(id: Value, outcome: Result<Value, DispatchError>) -> Reply {
    match outcome {
        Ok(result) => Reply::ok(json!(JsonRpcResponse::success(id, result))),
        Err(e) => {
            let status = match &e {
                DispatchError::UnknownOperation(_) | DispatchError::InvalidRequest(_) => {
                    StatusCode::OK
                }
                DispatchError::Malformed(_) | DispatchError::InvalidArguments(_) => {
                    StatusCode::BAD_REQUEST
                }
                DispatchError::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            log_failure(&e);
            let error = JsonRpcError::new(e.code(), e.to_string());
            Reply {
                status,
                body: json!(JsonRpcResponse::failure(id, error)),
            }
        }
    }
}

/// Legacy results are returned bare; errors become `{"detail": ...}`.
fn frame_legacy(outcome: Result<Value, DispatchError>) -> Reply {
    match outcome {
        Ok(result) => Reply::ok(result),
        Err(e) => {
            let status = match &e {
                DispatchError::UnknownOperation(_) => StatusCode::NOT_FOUND,
                DispatchError::Malformed(_)
                | DispatchError::InvalidRequest(_)
                | DispatchError::InvalidArguments(_) => StatusCode::BAD_REQUEST,
                DispatchError::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            log_failure(&e);
            Reply::detail(status, e.to_string())
        }
    }
}

fn log_failure(e: &DispatchError) {
    match e {
        DispatchError::Failed(_) => tracing::warn!(error = %e, "tool call failed"),
        _ => tracing::info!(code = e.code(), error = %e, "request rejected"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tb_domain::config::DiscoveryConfig;
    use tb_domain::EndpointUrl;
    use tb_opcua_client::{AddressSpace, MemoryConnector, SessionManager};

    use super::*;

    fn dispatcher() -> Dispatcher {
        let space = AddressSpace::new();
        let plant = space.add_object(&space.objects(), "OilAndGasPlant").unwrap();
        let line = space.add_object(&plant, "Line1").unwrap();
        let pump = space.add_object(&line, "Pump").unwrap();
        space.add_variable(&pump, "MotorTemp", 70.0).unwrap();

        let connector = Arc::new(MemoryConnector::new());
        connector.bind(&EndpointUrl::parse("opc.tcp://localhost:4840").unwrap(), space);
        let sessions = Arc::new(SessionManager::new(connector, Duration::from_secs(1)));
        let discovery = Arc::new(DiscoveryService::new(sessions, &DiscoveryConfig::default()));
        Dispatcher::new(discovery, Arc::new(ToolRegistry::new("http://localhost:8000")))
    }

    async fn send(dispatcher: &Dispatcher, body: Value) -> Reply {
        dispatcher.dispatch(body.to_string().as_bytes()).await
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request() {
        let reply = dispatcher().dispatch(b"{oops").await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.body, json!({ "detail": "Invalid JSON" }));

        let reply = dispatcher().dispatch(b"\"just a string\"").await;
        assert_eq!(reply.body, json!({ "detail": "Payload must be an object" }));
    }

    #[tokio::test]
    async fn initialize_is_identical_across_envelopes() {
        let d = dispatcher();
        let rpc = send(&d, json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize" })).await;
        let legacy = send(&d, json!({ "tool": "initialize" })).await;
        assert_eq!(rpc.status, StatusCode::OK);
        assert_eq!(rpc.body["id"], 1);
        assert_eq!(rpc.body["result"], legacy.body);
        assert_eq!(legacy.body["protocolVersion"], "2025-06-18");
    }

    #[tokio::test]
    async fn unknown_tool_per_envelope() {
        let d = dispatcher();
        let rpc = send(
            &d,
            json!({
                "jsonrpc": "2.0",
                "id": 9,
                "method": "tools/call",
                "params": { "name": "drop_tables", "arguments": {} }
            }),
        )
        .await;
        assert_eq!(rpc.status, StatusCode::OK);
        assert_eq!(rpc.body["id"], 9);
        assert_eq!(rpc.body["error"]["code"], -32601);
        assert!(rpc.body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("drop_tables"));

        let legacy = send(&d, json!({ "tool": "drop_tables", "input": {} })).await;
        assert_eq!(legacy.status, StatusCode::NOT_FOUND);
        assert_eq!(legacy.body, json!({ "detail": "Tool 'drop_tables' not found" }));
    }

    #[tokio::test]
    async fn unknown_method_is_a_jsonrpc_error() {
        let reply = send(
            &dispatcher(),
            json!({ "jsonrpc": "2.0", "id": "q", "method": "prompts/list" }),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(
            reply.body["error"],
            json!({ "code": -32601, "message": "Method 'prompts/list' not found" })
        );
    }

    #[tokio::test]
    async fn non_string_method_is_an_invalid_request() {
        let reply = send(&dispatcher(), json!({ "jsonrpc": "2.0", "id": 2, "method": 5 })).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn bad_arguments_are_invalid_params() {
        let d = dispatcher();
        let rpc = send(
            &d,
            json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "tools/call",
                "params": { "name": "get_tags", "arguments": { "skip_system_tags": true } }
            }),
        )
        .await;
        assert_eq!(rpc.status, StatusCode::BAD_REQUEST);
        assert_eq!(rpc.body["error"]["code"], -32602);
        assert_eq!(rpc.body["id"], 3);

        let legacy = send(&d, json!({ "tool": "get_tags_batch", "input": { "servers": 1 } })).await;
        assert_eq!(legacy.status, StatusCode::BAD_REQUEST);
        assert!(legacy.body["detail"].is_string());
    }

    #[tokio::test]
    async fn unreachable_single_endpoint_fails_at_the_transport() {
        let d = dispatcher();
        let rpc = send(
            &d,
            json!({
                "jsonrpc": "2.0",
                "id": 4,
                "method": "tools/call",
                "params": { "name": "get_tags", "arguments": { "server_url": "opc.tcp://localhost:4999" } }
            }),
        )
        .await;
        assert_eq!(rpc.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(rpc.body["error"]["code"], -32603);
        assert_eq!(rpc.body["id"], 4);

        let legacy = send(
            &d,
            json!({ "tool": "generate_prompt", "args": { "server_url": "opc.tcp://localhost:4999" } }),
        )
        .await;
        assert_eq!(legacy.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(legacy.body["detail"].as_str().unwrap().contains("4999"));
    }

    #[tokio::test]
    async fn unparsable_address_is_invalid_params() {
        let reply = send(
            &dispatcher(),
            json!({ "tool": "get_tags", "input": { "server_url": "localhost" } }),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn legacy_call_without_a_name_is_a_bad_request() {
        let reply = send(&dispatcher(), json!({ "input": { "server_url": "x" } })).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn batch_never_fails_as_a_whole() {
        let reply = send(
            &dispatcher(),
            json!({
                "tool": "get_tags_batch",
                "input": { "servers": ["opc.tcp://localhost:4840", "opc.tcp://localhost:4841"] }
            }),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK);
        let tags = reply.body["tags"].as_array().unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0]["browse_path"], "Objects/OilAndGasPlant/Line1/Pump/MotorTemp");
        assert_eq!(tags[1]["server_url"], "opc.tcp://localhost:4841");
        assert!(tags[1]["error"].is_string());
    }
}
