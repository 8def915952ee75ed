//! Domain-root classification.
//!
//! A domain root is any top-level container under `Objects` whose name is not
//! in the configured system set. Nothing about the plant layout is hardcoded,
//! so new facilities show up without configuration changes.

use std::collections::HashSet;

use tb_domain::NodeId;

use crate::transport::Connection;
use crate::ClientError;

/// Name of the standard objects folder under the root.
pub const OBJECTS_FOLDER_NAME: &str = "Objects";

/// Find the `Objects` folder among the root's children.
pub async fn objects_folder(conn: &dyn Connection) -> Result<NodeId, ClientError> {
    for child in conn.browse(&NodeId::root_folder()).await? {
        let attrs = conn.read_attributes(&child).await?;
        if attrs.display_name == OBJECTS_FOLDER_NAME {
            return Ok(child);
        }
    }
    Err(ClientError::MissingObjectsFolder)
}

/// Names of the containers directly under `Objects` that are not system roots.
///
/// Only the first level is read. A child whose attributes cannot be read is
/// logged and left out.
pub async fn discover_roots(
    conn: &dyn Connection,
    system_names: &HashSet<String>,
) -> Result<Vec<String>, ClientError> {
    let objects = objects_folder(conn).await?;
    let mut roots = Vec::new();

    for child in conn.browse(&objects).await? {
        match conn.read_attributes(&child).await {
            Ok(attrs) if attrs.node_class.is_container() => {
                if !system_names.contains(&attrs.display_name) {
                    roots.push(attrs.display_name);
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(node_id = %child, error = %e, "failed to classify top-level node");
            }
        }
    }

    tracing::debug!(roots = ?roots, "discovered domain roots");
    Ok(roots)
}

/// Keeps browse paths that fall under one of the discovered domain roots.
#[derive(Debug, Clone)]
pub struct RootFilter {
    prefixes: Vec<String>,
}

impl RootFilter {
    pub fn new<I, S>(roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            prefixes: roots
                .into_iter()
                .map(|root| format!("{OBJECTS_FOLDER_NAME}/{}", root.as_ref()))
                .collect(),
        }
    }

    /// True when `path` is `Objects/<root>` or lies below it.
    ///
    /// Matching stops at a segment boundary: root `Plant` does not claim
    /// `Objects/Plant2/...`.
    pub fn matches(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}
