//! Request envelope decoding.
//!
//! The dispatcher accepts two body shapes on one route. [`decode`] turns the
//! raw body into an [`Envelope`] once; nothing downstream looks at raw JSON
//! fields again.

use serde_json::{Map, Value};

use super::DispatchError;

/// The operation a request asks for, independent of its envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Initialize,
    ListTools,
    CallTool { name: String, arguments: Value },
    /// A JSON-RPC method outside `initialize`, `tools/list`, `tools/call`.
    UnknownMethod(String),
    InvalidRequest(String),
    InvalidParams(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcEnvelope {
    /// Echoed verbatim; `null` when absent.
    pub id: Value,
    pub request: Request,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyEnvelope {
    pub request: Request,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    JsonRpc(JsonRpcEnvelope),
    Legacy(LegacyEnvelope),
}

impl Envelope {
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::JsonRpc(_) => "jsonrpc",
            Envelope::Legacy(_) => "legacy",
        }
    }

    pub fn request(&self) -> &Request {
        match self {
            Envelope::JsonRpc(envelope) => &envelope.request,
            Envelope::Legacy(envelope) => &envelope.request,
        }
    }
}

const METHOD_INITIALIZE: &str = "initialize";
const METHOD_TOOLS_LIST: &str = "tools/list";
const METHOD_TOOLS_CALL: &str = "tools/call";

/// Keys a legacy call may name its tool under, in priority order.
const LEGACY_NAME_KEYS: [&str; 2] = ["tool", "name"];

/// Keys a legacy call may carry its arguments under, in priority order.
const LEGACY_ARGUMENT_KEYS: [&str; 3] = ["input", "args", "arguments"];

/// Decode a request body.
///
/// An object carrying both `jsonrpc` and `method` is a JSON-RPC request;
/// any other object is a legacy call. Only a body that is not a JSON object
/// fails here.
pub fn decode(body: &[u8]) -> Result<Envelope, DispatchError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| DispatchError::Malformed("Invalid JSON".into()))?;
    let Value::Object(mut object) = value else {
        return Err(DispatchError::Malformed("Payload must be an object".into()));
    };

    if object.contains_key("jsonrpc") && object.contains_key("method") {
        let id = object.remove("id").unwrap_or(Value::Null);
        let request = match object.remove("method") {
            Some(Value::String(method)) => jsonrpc_request(method, object.remove("params")),
            _ => Request::InvalidRequest("method must be a string".into()),
        };
        return Ok(Envelope::JsonRpc(JsonRpcEnvelope { id, request }));
    }

    Ok(Envelope::Legacy(LegacyEnvelope {
        request: legacy_request(object),
    }))
}

fn jsonrpc_request(method: String, params: Option<Value>) -> Request {
    match method.as_str() {
        METHOD_INITIALIZE => Request::Initialize,
        METHOD_TOOLS_LIST => Request::ListTools,
        METHOD_TOOLS_CALL => {
            let mut params = match params {
                None | Some(Value::Null) => Map::new(),
                Some(Value::Object(params)) => params,
                Some(_) => return Request::InvalidParams("params must be an object".into()),
            };
            match params.remove("name") {
                Some(Value::String(name)) => Request::CallTool {
                    name,
                    arguments: params.remove("arguments").unwrap_or(Value::Null),
                },
                _ => Request::InvalidParams("tools/call requires a tool name".into()),
            }
        }
        _ => Request::UnknownMethod(method),
    }
}

fn legacy_request(mut object: Map<String, Value>) -> Request {
    let name = LEGACY_NAME_KEYS
        .iter()
        .find_map(|key| match object.get(*key) {
            Some(Value::String(name)) if !name.is_empty() => Some(name.clone()),
            _ => None,
        });
    let Some(name) = name else {
        return Request::InvalidParams("request must name a tool in \"tool\" or \"name\"".into());
    };

    match name.as_str() {
        METHOD_INITIALIZE => Request::Initialize,
        METHOD_TOOLS_LIST => Request::ListTools,
        _ => {
            let arguments = LEGACY_ARGUMENT_KEYS
                .iter()
                .find_map(|key| object.remove(*key).filter(|value| !value.is_null()))
                .unwrap_or(Value::Null);
            Request::CallTool { name, arguments }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn decode_json(value: Value) -> Envelope {
        decode(value.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn malformed_bodies() {
        assert_eq!(
            decode(b"{not json").unwrap_err().to_string(),
            "Invalid JSON"
        );
        assert_eq!(
            decode(b"[1, 2]").unwrap_err().to_string(),
            "Payload must be an object"
        );
        assert!(matches!(decode(b""), Err(DispatchError::Malformed(_))));
    }

    #[test]
    fn jsonrpc_needs_both_markers() {
        let envelope = decode_json(json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize" }));
        assert_eq!(envelope.kind(), "jsonrpc");
        assert_eq!(envelope.request(), &Request::Initialize);

        // `jsonrpc` alone is a legacy call.
        let envelope = decode_json(json!({ "jsonrpc": "2.0", "tool": "tools/list" }));
        assert_eq!(envelope.kind(), "legacy");
        assert_eq!(envelope.request(), &Request::ListTools);
    }

    #[test]
    fn jsonrpc_tools_call() {
        let envelope = decode_json(json!({
            "jsonrpc": "2.0",
            "id": "abc",
            "method": "tools/call",
            "params": { "name": "get_tags", "arguments": { "server_url": "x" } }
        }));
        let Envelope::JsonRpc(envelope) = envelope else {
            panic!("expected JSON-RPC");
        };
        assert_eq!(envelope.id, json!("abc"));
        assert_eq!(
            envelope.request,
            Request::CallTool {
                name: "get_tags".into(),
                arguments: json!({ "server_url": "x" }),
            }
        );
    }

    #[test]
    fn jsonrpc_missing_id_is_null() {
        let Envelope::JsonRpc(envelope) =
            decode_json(json!({ "jsonrpc": "2.0", "method": "tools/list" }))
        else {
            panic!("expected JSON-RPC");
        };
        assert_eq!(envelope.id, Value::Null);
    }

    #[test]
    fn jsonrpc_bad_shapes() {
        let request = |body: Value| decode_json(body).request().clone();

        assert_eq!(
            request(json!({ "jsonrpc": "2.0", "method": "resources/list" })),
            Request::UnknownMethod("resources/list".into())
        );
        assert!(matches!(
            request(json!({ "jsonrpc": "2.0", "method": 3 })),
            Request::InvalidRequest(_)
        ));
        assert!(matches!(
            request(json!({ "jsonrpc": "2.0", "method": "tools/call", "params": [] })),
            Request::InvalidParams(_)
        ));
        assert!(matches!(
            request(json!({ "jsonrpc": "2.0", "method": "tools/call", "params": {} })),
            Request::InvalidParams(_)
        ));
    }

    #[test]
    fn legacy_name_and_argument_precedence() {
        let envelope = decode_json(json!({
            "tool": "get_tags",
            "name": "generate_prompt",
            "args": { "server_url": "b" },
            "input": { "server_url": "a" }
        }));
        assert_eq!(
            envelope.request(),
            &Request::CallTool {
                name: "get_tags".into(),
                arguments: json!({ "server_url": "a" }),
            }
        );

        let envelope = decode_json(json!({
            "name": "get_tags",
            "input": null,
            "arguments": { "server_url": "c" }
        }));
        assert_eq!(
            envelope.request(),
            &Request::CallTool {
                name: "get_tags".into(),
                arguments: json!({ "server_url": "c" }),
            }
        );
    }

    #[test]
    fn legacy_without_a_name() {
        assert!(matches!(
            decode_json(json!({ "input": {} })).request(),
            Request::InvalidParams(_)
        ));
    }

    #[test]
    fn legacy_unknown_name_still_decodes() {
        assert_eq!(
            decode_json(json!({ "tool": "delete_everything" })).request(),
            &Request::CallTool {
                name: "delete_everything".into(),
                arguments: Value::Null,
            }
        );
    }
}
