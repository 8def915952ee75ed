//! MCP-style tool serving over a JSON-RPC 2.0 and a legacy flat-call
//! envelope.

pub mod dispatcher;
pub mod envelope;
pub mod protocol;
pub mod registry;
pub mod tools;

pub use dispatcher::{Dispatcher, Reply};
pub use envelope::{decode, Envelope, Request};
pub use registry::{RegistryDocument, ToolDescriptor, ToolRegistry};
pub use tools::{Tool, ToolCall, ToolOutput};

use crate::discovery::DiscoveryError;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The body is not a JSON object. Rejected before any envelope exists.
    #[error("{0}")]
    Malformed(String),

    #[error("{0}")]
    UnknownOperation(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Failed(DiscoveryError),
}

impl DispatchError {
    /// JSON-RPC error code for this failure.
    pub fn code(&self) -> i64 {
        match self {
            DispatchError::Malformed(_) | DispatchError::InvalidRequest(_) => {
                protocol::INVALID_REQUEST
            }
            DispatchError::UnknownOperation(_) => protocol::METHOD_NOT_FOUND,
            DispatchError::InvalidArguments(_) => protocol::INVALID_PARAMS,
            DispatchError::Failed(_) => protocol::INTERNAL_ERROR,
        }
    }
}

impl From<DiscoveryError> for DispatchError {
    fn from(e: DiscoveryError) -> Self {
        match e {
            DiscoveryError::InvalidEndpoint(inner) => DispatchError::InvalidArguments(inner.to_string()),
            other => DispatchError::Failed(other),
        }
    }
}
