//! Multi-endpoint fan-out.
//!
//! A batch never fails as a whole: each endpoint contributes either its tags
//! or exactly one inline failure record, at the position it was requested.

use futures_util::stream::{self, StreamExt};
use serde::Serialize;

use tb_domain::{BatchEntry, EndpointFailure, Tag};

use super::{compose, DiscoveryService};

impl DiscoveryService {
    /// Discover tags on every address in `servers`.
    ///
    /// Up to `max_concurrent_endpoints` endpoints are in flight at once, but
    /// results keep the input order. Dropping the returned future cancels
    /// only this batch's pending endpoints.
    pub async fn tags_batch(&self, servers: &[String], skip_system_tags: bool) -> Vec<BatchEntry> {
        // Per-endpoint futures own their address; they must not borrow `servers`.
        let per_endpoint: Vec<Vec<BatchEntry>> = stream::iter(servers.iter().cloned())
            .map(|server: String| async move {
                match self.tags(&server, skip_system_tags).await {
                    Ok(tags) => tags.into_iter().map(BatchEntry::Tag).collect(),
                    Err(e) => {
                        tracing::warn!(server_url = %server, error = %e, "endpoint failed in batch");
                        vec![BatchEntry::Failure(EndpointFailure {
                            server_url: server,
                            error: e.to_string(),
                        })]
                    }
                }
            })
            .buffered(self.max_concurrent_endpoints())
            .collect()
            .await;

        let entries: Vec<BatchEntry> = per_endpoint.into_iter().flatten().collect();
        tracing::debug!(endpoints = servers.len(), entries = entries.len(), "batch complete");
        entries
    }

    /// Compose one prompt from every reachable endpoint in `servers`.
    pub async fn prompt_batch(&self, servers: &[String], skip_system_tags: bool) -> BatchPrompt {
        let (tags, errors) = split_batch(self.tags_batch(servers, skip_system_tags).await);
        BatchPrompt {
            prompt: compose(&tags),
            errors,
        }
    }
}

/// A prompt composed across endpoints, plus the endpoints left out of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchPrompt {
    pub prompt: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<EndpointFailure>,
}

/// Separate batch entries into tags and failures, keeping relative order.
pub fn split_batch(entries: Vec<BatchEntry>) -> (Vec<Tag>, Vec<EndpointFailure>) {
    let mut tags = Vec::new();
    let mut failures = Vec::new();
    for entry in entries {
        match entry {
            BatchEntry::Tag(tag) => tags.push(tag),
            BatchEntry::Failure(failure) => failures.push(failure),
        }
    }
    (tags, failures)
}
