//! Depth-first address-space traversal.

use std::fmt;

use tb_domain::{NodeClass, NodeId};

use crate::transport::{Connection, TransportError};

/// One node reached by the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressNode {
    pub node_id: NodeId,
    pub display_name: String,
    pub node_class: NodeClass,
    /// Display names from the start node (excluded) down to this node.
    pub browse_path: String,
    /// Present for Variable nodes only.
    pub data_type: Option<String>,
}

/// A node the walk could not fully process.
#[derive(Debug, Clone)]
pub struct SkippedNode {
    pub node_id: NodeId,
    /// Path of the parent the node was reached from.
    pub parent_path: String,
    pub reason: SkipReason,
    pub error: TransportError,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    /// Also emit Object and ObjectType nodes (without a data type).
    pub include_all: bool,
}

/// Result of a walk: what was reached, plus what was skipped along the way.
#[derive(Debug, Clone, Default)]
pub struct Walk {
    pub nodes: Vec<AddressNode>,
    pub skipped: Vec<SkippedNode>,
}

impl Walk {
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Which step of a node visit failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Browse,
    Attributes,
    DataType,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::Browse => "browse",
            SkipReason::Attributes => "read attributes",
            SkipReason::DataType => "read data type",
        })
    }
}

struct Frame {
    node_id: NodeId,
    parent_path: String,
}

/// Walk everything reachable below `start`, depth first, in server order.
///
/// Per-node failures are logged and recorded in [`Walk::skipped`]; the
/// failing node contributes nothing and its siblings are still visited.
/// The address space is assumed to be a tree: there is no cycle detection.
pub async fn walk(conn: &dyn Connection, start: &NodeId, options: WalkOptions) -> Walk {
    let mut out = Walk::default();
    let mut stack: Vec<Frame> = Vec::new();

    push_children(conn, start, "", &mut stack, &mut out).await;

    while let Some(frame) = stack.pop() {
        let attrs = match conn.read_attributes(&frame.node_id).await {
            Ok(attrs) => attrs,
            Err(e) => {
                skip(&mut out, frame, SkipReason::Attributes, e);
                continue;
            }
        };

        let browse_path = if frame.parent_path.is_empty() {
            attrs.display_name.clone()
        } else {
            format!("{}/{}", frame.parent_path, attrs.display_name)
        };

        match attrs.node_class {
            NodeClass::Variable => match conn.read_data_type(&frame.node_id).await {
                Ok(data_type) => out.nodes.push(AddressNode {
                    node_id: frame.node_id,
                    display_name: attrs.display_name,
                    node_class: NodeClass::Variable,
                    browse_path,
                    data_type: Some(data_type),
                }),
                Err(e) => skip(&mut out, frame, SkipReason::DataType, e),
            },
            class if class.is_container() => {
                if options.include_all {
                    out.nodes.push(AddressNode {
                        node_id: frame.node_id.clone(),
                        display_name: attrs.display_name,
                        node_class: class,
                        browse_path: browse_path.clone(),
                        data_type: None,
                    });
                }
                push_children(conn, &frame.node_id, &browse_path, &mut stack, &mut out).await;
            }
            _ => {}
        }
    }

    out
}

/// Push the children of `node` so that the first child is popped first.
async fn push_children(
    conn: &dyn Connection,
    node: &NodeId,
    path: &str,
    stack: &mut Vec<Frame>,
    out: &mut Walk,
) {
    match conn.browse(node).await {
        Ok(children) => stack.extend(children.into_iter().rev().map(|node_id| Frame {
            node_id,
            parent_path: path.to_owned(),
        })),
        Err(e) => skip(
            out,
            Frame {
                node_id: node.clone(),
                parent_path: path.to_owned(),
            },
            SkipReason::Browse,
            e,
        ),
    }
}

fn skip(out: &mut Walk, frame: Frame, reason: SkipReason, error: TransportError) {
    tracing::warn!(
        node_id = %frame.node_id,
        parent_path = %frame.parent_path,
        step = %reason,
        error = %error,
        "skipping node"
    );
    out.skipped.push(SkippedNode {
        node_id: frame.node_id,
        parent_path: frame.parent_path,
        reason,
        error,
    });
}
