//! `tb-opcua-client`: address-space discovery over an abstract OPC UA transport.
//!
//! This crate provides:
//! - [`Connector`] / [`Connection`]: the seam between discovery logic and a
//!   wire stack.
//! - [`AddressSpace`] / [`MemoryConnector`]: an in-process address space that
//!   the simulators populate and tests build by hand.
//! - [`SessionManager`]: the pooled, per-endpoint session registry.
//! - [`walk`]: depth-first traversal producing [`AddressNode`]s.
//! - [`discover_roots`] / [`RootFilter`]: dynamic domain-root classification.
//!
//! With the `opcua-transport` feature, [`wire::OpcUaConnector`] binds the
//! traits to the `opcua` crate's client.

pub mod classifier;
pub mod memory;
#[cfg(feature = "opcua-transport")]
pub mod wire;
pub mod session;
pub mod transport;
pub mod walker;

pub use classifier::{discover_roots, RootFilter};
pub use memory::{AddressSpace, MemoryConnector};
pub use session::{close_in_background, SessionInfo, SessionManager, SessionState};
pub use transport::{ChainConnector, Connection, Connector, NodeAttributes, TransportError};
pub use walker::{walk, AddressNode, SkipReason, SkippedNode, Walk, WalkOptions};

use tb_domain::EndpointUrl;

/// Errors surfaced by session and discovery operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("not connected to {0}")]
    NotConnected(EndpointUrl),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("address space has no Objects folder under its root")]
    MissingObjectsFolder,
}

impl ClientError {
    /// Whether the failure means the session behind it is no longer usable.
    pub fn is_connection_loss(&self) -> bool {
        match self {
            ClientError::Transport(e) => e.is_connection_loss(),
            ClientError::NotConnected(_) => true,
            ClientError::MissingObjectsFolder => false,
        }
    }
}

impl From<ClientError> for tb_domain::Error {
    fn from(e: ClientError) -> Self {
        tb_domain::Error::Other(e.to_string())
    }
}
