//! Tag discovery: per-endpoint collection, batch aggregation and prompt
//! composition.

pub mod aggregate;
pub mod normalize;
pub mod prompt;
mod service;

use tb_domain::EndpointUrl;
use tb_opcua_client::ClientError;

pub use aggregate::{split_batch, BatchPrompt};
pub use normalize::{normalize, NormalizeError};
pub use prompt::compose;
pub use service::{DiscoveryService, ValueReading};

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    InvalidEndpoint(tb_domain::Error),

    #[error("failed to connect to {url}: {source}")]
    Connect { url: EndpointUrl, source: ClientError },

    #[error("failed to browse {url}: {source}")]
    Browse { url: EndpointUrl, source: ClientError },

    #[error("{url} did not answer within {timeout_ms} ms")]
    Timeout { url: EndpointUrl, timeout_ms: u64 },

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}
