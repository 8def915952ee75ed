//! Mapping from walked address-space nodes to [`Tag`] records.

use tb_domain::{EndpointUrl, NodeId, Tag};
use tb_opcua_client::AddressNode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("node {node_id} has no {field}")]
    MissingField {
        node_id: NodeId,
        field: &'static str,
    },
}

/// Build the tag for `node` as served by `server_url`.
///
/// Every field is required. A node missing one is a data error, never a tag
/// with a made-up default.
pub fn normalize(node: AddressNode, server_url: &EndpointUrl) -> Result<Tag, NormalizeError> {
    let missing = |field| NormalizeError::MissingField {
        node_id: node.node_id.clone(),
        field,
    };

    if node.browse_path.is_empty() {
        return Err(missing("browse path"));
    }
    if node.display_name.is_empty() {
        return Err(missing("display name"));
    }
    let data_type = match node.data_type {
        Some(ref data_type) if !data_type.is_empty() => data_type.clone(),
        _ => return Err(missing("data type")),
    };

    Ok(Tag {
        server_url: server_url.clone(),
        node_id: node.node_id,
        browse_path: node.browse_path,
        display_name: node.display_name,
        data_type,
    })
}
