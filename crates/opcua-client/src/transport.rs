//! Transport seam.
//!
//! Discovery code only ever talks to a [`Connection`] obtained from a
//! [`Connector`]. Implementations:
//! - [`crate::memory::MemoryConnector`]: in-process address spaces.
//! - `crate::wire::OpcUaConnector` (feature `opcua-transport`): real servers.

use std::sync::Arc;

use async_trait::async_trait;

use tb_domain::{EndpointUrl, NodeClass, NodeId, Variant};

/// The attributes the walker reads for every child it visits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAttributes {
    pub display_name: String,
    pub node_class: NodeClass,
}

/// Opens sessions to endpoints.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &EndpointUrl) -> Result<Arc<dyn Connection>, TransportError>;
}

/// One live session with an endpoint.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Forward hierarchical children of `node`, in server order.
    async fn browse(&self, node: &NodeId) -> Result<Vec<NodeId>, TransportError>;

    async fn read_attributes(&self, node: &NodeId) -> Result<NodeAttributes, TransportError>;

    /// Built-in data type name of a Variable node (`Double`, `Boolean`, ...).
    async fn read_data_type(&self, node: &NodeId) -> Result<String, TransportError>;

    async fn read_value(&self, node: &NodeId) -> Result<Variant, TransportError>;

    /// Whether the session is still usable.
    fn is_alive(&self) -> bool;

    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Errors that can occur during transport operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("session is disconnected")]
    Disconnected,

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node {node} has no readable {attribute} attribute")]
    BadAttribute { node: NodeId, attribute: &'static str },

    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("transport not supported: {0}")]
    Unsupported(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Errors after which the session must be discarded and reopened.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            TransportError::Unreachable(_) | TransportError::Disconnected | TransportError::Timeout(_)
        )
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ChainConnector
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tries each connector in order and returns the first session opened.
///
/// Only `Unreachable` falls through to the next connector; any other error
/// is returned as is.
pub struct ChainConnector {
    connectors: Vec<Arc<dyn Connector>>,
}

impl ChainConnector {
    pub fn new(connectors: Vec<Arc<dyn Connector>>) -> Self {
        Self { connectors }
    }
}

#[async_trait]
impl Connector for ChainConnector {
    async fn connect(&self, url: &EndpointUrl) -> Result<Arc<dyn Connection>, TransportError> {
        let mut last = TransportError::Unreachable(format!("no transport accepts {url}"));
        for connector in &self.connectors {
            match connector.connect(url).await {
                Ok(conn) => return Ok(conn),
                Err(e @ TransportError::Unreachable(_)) => last = e,
                Err(e) => return Err(e),
            }
        }
        Err(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{AddressSpace, MemoryConnector};

    fn url(raw: &str) -> EndpointUrl {
        EndpointUrl::parse(raw).unwrap()
    }

    #[test]
    fn connection_loss_classification() {
        assert!(TransportError::Disconnected.is_connection_loss());
        assert!(TransportError::Timeout(10).is_connection_loss());
        assert!(!TransportError::UnknownNode(NodeId::from("i=1")).is_connection_loss());
    }

    #[tokio::test]
    async fn chain_falls_through_unreachable() {
        let empty = Arc::new(MemoryConnector::new());
        let bound = Arc::new(MemoryConnector::new());
        bound.bind(&url("opc.tcp://localhost:4840"), AddressSpace::new());

        let chain = ChainConnector::new(vec![empty, bound]);
        assert!(chain.connect(&url("opc.tcp://localhost:4840")).await.is_ok());

        let err = match chain.connect(&url("opc.tcp://localhost:4999")).await {
            Ok(_) => panic!("expected failure"),
            Err(e) => e,
        };
        assert!(matches!(err, TransportError::Unreachable(_)));
    }
}
