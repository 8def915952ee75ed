use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::endpoint::EndpointUrl;
use crate::node::{NodeId, Variant};

/// A discovered variable, normalized and tagged with the endpoint it lives on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub server_url: EndpointUrl,
    pub node_id: NodeId,
    /// `/`-joined display names from the (excluded) root to the variable.
    pub browse_path: String,
    pub display_name: String,
    pub data_type: String,
}

/// A value read from a tag at a point in time.
///
/// Only produced by explicit value reads, never during discovery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagSample {
    pub tag: Tag,
    pub timestamp: DateTime<Utc>,
    /// `None` when the read failed.
    pub value: Option<Variant>,
}

/// Inline record standing in for an endpoint that failed during a batch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointFailure {
    /// The address as the caller supplied it (it may not have parsed).
    pub server_url: String,
    pub error: String,
}

/// One element of a batch result: either a tag or an endpoint failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Tag(Tag),
    Failure(EndpointFailure),
}

impl BatchEntry {
    pub fn as_tag(&self) -> Option<&Tag> {
        match self {
            BatchEntry::Tag(tag) => Some(tag),
            BatchEntry::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&EndpointFailure> {
        match self {
            BatchEntry::Tag(_) => None,
            BatchEntry::Failure(failure) => Some(failure),
        }
    }
}
