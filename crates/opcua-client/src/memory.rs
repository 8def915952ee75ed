//! In-process address spaces and the connector that serves them.
//!
//! Every [`AddressSpace`] starts with the standard skeleton
//! (`Root → Objects, Types, Views` and `Objects → Server`) so that the
//! system/domain split behaves the way it does against a real server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use tb_domain::{EndpointUrl, NodeClass, NodeId, Variant};

use crate::transport::{Connection, Connector, NodeAttributes, TransportError};

/// Namespace index used for nodes added after the skeleton.
pub const APP_NAMESPACE: u16 = 2;

/// Port assumed when an address omits one.
pub const DEFAULT_PORT: u16 = 4840;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AddressSpace
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct MemoryNode {
    attributes: NodeAttributes,
    value: Option<Variant>,
    children: Vec<NodeId>,
}

/// A mutable tree of nodes shared between a writer (simulator, test) and any
/// number of sessions.
pub struct AddressSpace {
    nodes: RwLock<HashMap<NodeId, MemoryNode>>,
    next_id: AtomicU32,
    online: AtomicBool,
}

impl AddressSpace {
    /// A new address space holding only the standard skeleton.
    pub fn new() -> Arc<Self> {
        let space = Self {
            nodes: RwLock::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            online: AtomicBool::new(true),
        };
        space.build_skeleton();
        Arc::new(space)
    }

    fn build_skeleton(&self) {
        let ns0 = |id| NodeId::numeric(0, id);
        let root = NodeId::root_folder();
        self.nodes.write().insert(
            root.clone(),
            MemoryNode {
                attributes: NodeAttributes {
                    display_name: "Root".into(),
                    node_class: NodeClass::Object,
                },
                value: None,
                children: Vec::new(),
            },
        );

        let objects = NodeId::objects_folder();
        let types = ns0(NodeId::TYPES_FOLDER);
        let views = ns0(NodeId::VIEWS_FOLDER);
        self.attach(&root, objects.clone(), "Objects", NodeClass::Object, None);
        self.attach(&root, types.clone(), "Types", NodeClass::Object, None);
        self.attach(&root, views, "Views", NodeClass::Object, None);

        let server = ns0(NodeId::SERVER);
        let status = ns0(2256);
        self.attach(&objects, server.clone(), "Server", NodeClass::Object, None);
        self.attach(&server, status.clone(), "ServerStatus", NodeClass::Object, None);
        self.attach(&status, ns0(2259), "State", NodeClass::Variable, Some("Running".into()));
        self.attach(&status, ns0(2992), "SecondsTillShutdown", NodeClass::Variable, Some(0_i64.into()));
        self.attach(&server, ns0(2267), "ServiceLevel", NodeClass::Variable, Some(255_i64.into()));

        let object_types = ns0(88);
        let event_types = ns0(3048);
        self.attach(&types, object_types.clone(), "ObjectTypes", NodeClass::Object, None);
        self.attach(&object_types, ns0(58), "BaseObjectType", NodeClass::ObjectType, None);
        self.attach(&types, ns0(89), "VariableTypes", NodeClass::Object, None);
        self.attach(&types, ns0(90), "DataTypes", NodeClass::Object, None);
        self.attach(&types, ns0(91), "ReferenceTypes", NodeClass::Object, None);
        self.attach(&types, event_types.clone(), "EventTypes", NodeClass::Object, None);
        self.attach(&event_types, ns0(2041), "BaseEventType", NodeClass::ObjectType, None);
    }

    fn attach(
        &self,
        parent: &NodeId,
        id: NodeId,
        name: &str,
        node_class: NodeClass,
        value: Option<Variant>,
    ) -> bool {
        let mut nodes = self.nodes.write();
        let Some(parent_node) = nodes.get_mut(parent) else {
            return false;
        };
        parent_node.children.push(id.clone());
        nodes.insert(
            id,
            MemoryNode {
                attributes: NodeAttributes {
                    display_name: name.to_owned(),
                    node_class,
                },
                value,
                children: Vec::new(),
            },
        );
        true
    }

    fn add(
        &self,
        parent: &NodeId,
        name: &str,
        node_class: NodeClass,
        value: Option<Variant>,
    ) -> Result<NodeId, TransportError> {
        let id = NodeId::numeric(APP_NAMESPACE, self.next_id.fetch_add(1, Ordering::Relaxed));
        if self.attach(parent, id.clone(), name, node_class, value) {
            Ok(id)
        } else {
            Err(TransportError::UnknownNode(parent.clone()))
        }
    }

    /// The `Objects` folder, where plant content is added.
    pub fn objects(&self) -> NodeId {
        NodeId::objects_folder()
    }

    pub fn add_object(&self, parent: &NodeId, name: &str) -> Result<NodeId, TransportError> {
        self.add(parent, name, NodeClass::Object, None)
    }

    pub fn add_variable(
        &self,
        parent: &NodeId,
        name: &str,
        value: impl Into<Variant>,
    ) -> Result<NodeId, TransportError> {
        self.add(parent, name, NodeClass::Variable, Some(value.into()))
    }

    /// Replace the value of a Variable node.
    pub fn write(&self, node: &NodeId, value: impl Into<Variant>) -> Result<(), TransportError> {
        let mut nodes = self.nodes.write();
        let entry = nodes
            .get_mut(node)
            .ok_or_else(|| TransportError::UnknownNode(node.clone()))?;
        if entry.attributes.node_class != NodeClass::Variable {
            return Err(TransportError::BadAttribute {
                node: node.clone(),
                attribute: "Value",
            });
        }
        entry.value = Some(value.into());
        Ok(())
    }

    pub fn read(&self, node: &NodeId) -> Result<Variant, TransportError> {
        let nodes = self.nodes.read();
        let entry = nodes
            .get(node)
            .ok_or_else(|| TransportError::UnknownNode(node.clone()))?;
        entry.value.clone().ok_or_else(|| TransportError::BadAttribute {
            node: node.clone(),
            attribute: "Value",
        })
    }

    /// Resolve a `/`-joined display-name path starting below `Root`
    /// (`Objects/Server/ServiceLevel`).
    pub fn find(&self, path: &str) -> Option<NodeId> {
        let nodes = self.nodes.read();
        let mut current = NodeId::root_folder();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let node = nodes.get(&current)?;
            current = node
                .children
                .iter()
                .find(|child| {
                    nodes
                        .get(*child)
                        .is_some_and(|c| c.attributes.display_name == segment)
                })?
                .clone();
        }
        Some(current)
    }

    /// Number of nodes, skeleton included.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Take the space offline. Open sessions start failing with
    /// `Disconnected` and new connects are refused.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    fn children(&self, node: &NodeId) -> Result<Vec<NodeId>, TransportError> {
        self.nodes
            .read()
            .get(node)
            .map(|n| n.children.clone())
            .ok_or_else(|| TransportError::UnknownNode(node.clone()))
    }

    fn attributes(&self, node: &NodeId) -> Result<NodeAttributes, TransportError> {
        self.nodes
            .read()
            .get(node)
            .map(|n| n.attributes.clone())
            .ok_or_else(|| TransportError::UnknownNode(node.clone()))
    }

    fn data_type(&self, node: &NodeId) -> Result<String, TransportError> {
        let nodes = self.nodes.read();
        let entry = nodes
            .get(node)
            .ok_or_else(|| TransportError::UnknownNode(node.clone()))?;
        match (&entry.attributes.node_class, &entry.value) {
            (NodeClass::Variable, Some(value)) => Ok(value.data_type().to_owned()),
            _ => Err(TransportError::BadAttribute {
                node: node.clone(),
                attribute: "DataType",
            }),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MemoryConnector
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Serves bound address spaces by `host:port`.
///
/// Loopback spellings (`localhost`, `127.0.0.1`, `0.0.0.0`, `::1`) are one
/// host, and the path segment of the address is ignored, so a simulator
/// bound at `opc.tcp://0.0.0.0:4840/oilgas/server/` answers
/// `opc.tcp://localhost:4840`.
#[derive(Default)]
pub struct MemoryConnector {
    spaces: RwLock<HashMap<String, Arc<AddressSpace>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(url: &EndpointUrl) -> String {
        let host = url.host().trim_start_matches('[').trim_end_matches(']');
        let host = match host.to_ascii_lowercase().as_str() {
            "localhost" | "127.0.0.1" | "0.0.0.0" | "::1" | "::" => "localhost".to_owned(),
            other => other.to_owned(),
        };
        format!("{host}:{}", url.port().unwrap_or(DEFAULT_PORT))
    }

    /// Serve `space` at `url`, replacing whatever was bound there.
    pub fn bind(&self, url: &EndpointUrl, space: Arc<AddressSpace>) {
        let key = Self::key(url);
        tracing::debug!(server_url = %url, key = %key, "address space bound");
        self.spaces.write().insert(key, space);
    }

    pub fn unbind(&self, url: &EndpointUrl) -> Option<Arc<AddressSpace>> {
        self.spaces.write().remove(&Self::key(url))
    }

    pub fn is_bound(&self, url: &EndpointUrl) -> bool {
        self.spaces.read().contains_key(&Self::key(url))
    }

    pub fn bound_count(&self) -> usize {
        self.spaces.read().len()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &EndpointUrl) -> Result<Arc<dyn Connection>, TransportError> {
        let space = self
            .spaces
            .read()
            .get(&Self::key(url))
            .cloned()
            .filter(|space| space.is_online())
            .ok_or_else(|| TransportError::Unreachable(url.to_string()))?;
        Ok(Arc::new(MemoryConnection {
            space,
            open: AtomicBool::new(true),
        }))
    }
}

/// A session on an in-process [`AddressSpace`].
pub struct MemoryConnection {
    space: Arc<AddressSpace>,
    open: AtomicBool,
}

impl MemoryConnection {
    fn check(&self) -> Result<&AddressSpace, TransportError> {
        if self.is_alive() {
            Ok(self.space.as_ref())
        } else {
            Err(TransportError::Disconnected)
        }
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn browse(&self, node: &NodeId) -> Result<Vec<NodeId>, TransportError> {
        self.check()?.children(node)
    }

    async fn read_attributes(&self, node: &NodeId) -> Result<NodeAttributes, TransportError> {
        self.check()?.attributes(node)
    }

    async fn read_data_type(&self, node: &NodeId) -> Result<String, TransportError> {
        self.check()?.data_type(node)
    }

    async fn read_value(&self, node: &NodeId) -> Result<Variant, TransportError> {
        self.check()?.read(node)
    }

    fn is_alive(&self) -> bool {
        self.open.load(Ordering::Acquire) && self.space.is_online()
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if self.open.swap(false, Ordering::AcqRel) {
            Ok(())
        } else {
            Err(TransportError::Disconnected)
        }
    }
}
