//! OPC UA wire transport backed by the `opcua` crate's client.
//!
//! The `opcua` session API is blocking, so every call runs on the blocking
//! pool via `spawn_blocking`. Sessions are opened anonymously with no
//! message security.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use opcua::client::prelude::{
    AttributeService, ClientBuilder, IdentityToken, Session, ViewService,
};
use opcua::sync::RwLock;
use opcua::types::{
    AttributeId, BrowseDescription, BrowseDirection, DataValue, EndpointDescription,
    MessageSecurityMode, NodeId as UaNodeId, QualifiedName,
    ReadValueId, ReferenceTypeId, SecurityPolicy, StatusCode, TimestampsToReturn, UAString,
    UserTokenPolicy, Variant as UaVariant,
};

use tb_domain::{EndpointUrl, NodeClass, NodeId, Variant};

use crate::transport::{Connection, Connector, NodeAttributes, TransportError};

/// Every field of a browse reference description.
const BROWSE_RESULT_ALL: u32 = 0x3f;

/// Opens anonymous, unsecured sessions with `opcua`'s client.
pub struct OpcUaConnector {
    application_name: String,
}

impl OpcUaConnector {
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
        }
    }
}

impl Default for OpcUaConnector {
    fn default() -> Self {
        Self::new("tagbridge")
    }
}

#[async_trait]
impl Connector for OpcUaConnector {
    async fn connect(&self, url: &EndpointUrl) -> Result<Arc<dyn Connection>, TransportError> {
        let url = url.to_string();
        let name = self.application_name.clone();

        let session = blocking(move || {
            let mut client = ClientBuilder::new()
                .application_name(name.as_str())
                .application_uri(format!("urn:{name}"))
                .trust_server_certs(true)
                .create_sample_keypair(true)
                .session_retry_limit(0)
                .client()
                .ok_or_else(|| TransportError::Protocol("invalid client configuration".into()))?;

            let endpoint: EndpointDescription = (
                url.as_str(),
                SecurityPolicy::None.to_str(),
                MessageSecurityMode::None,
                UserTokenPolicy::anonymous(),
            )
                .into();

            client
                .connect_to_endpoint(endpoint, IdentityToken::Anonymous)
                .map_err(|status| TransportError::Unreachable(format!("{url}: {status}")))
        })
        .await?;

        Ok(Arc::new(OpcUaConnection { session }))
    }
}

/// A live `opcua` session.
pub struct OpcUaConnection {
    session: Arc<RwLock<Session>>,
}

impl OpcUaConnection {
    async fn read_attribute(
        &self,
        node: &NodeId,
        attribute: AttributeId,
        name: &'static str,
    ) -> Result<UaVariant, TransportError> {
        let session = self.session.clone();
        let ua_node = to_ua(node)?;
        let our_node = node.clone();

        blocking(move || {
            let request = ReadValueId {
                node_id: ua_node,
                attribute_id: attribute as u32,
                index_range: UAString::null(),
                data_encoding: QualifiedName::null(),
            };
            let values: Vec<DataValue> = session
                .read()
                .read(&[request], TimestampsToReturn::Neither, 0.0)
                .map_err(status_error)?;
            values
                .into_iter()
                .next()
                .and_then(|dv| dv.value)
                .ok_or(TransportError::BadAttribute {
                    node: our_node,
                    attribute: name,
                })
        })
        .await
    }
}

#[async_trait]
impl Connection for OpcUaConnection {
    async fn browse(&self, node: &NodeId) -> Result<Vec<NodeId>, TransportError> {
        let session = self.session.clone();
        let ua_node = to_ua(node)?;

        blocking(move || {
            let description = BrowseDescription {
                node_id: ua_node,
                browse_direction: BrowseDirection::Forward,
                reference_type_id: ReferenceTypeId::HierarchicalReferences.into(),
                include_subtypes: true,
                // Zero selects every node class.
                node_class_mask: 0,
                result_mask: BROWSE_RESULT_ALL,
            };
            let results = session
                .read()
                .browse(&[description])
                .map_err(status_error)?
                .unwrap_or_default();

            Ok(results
                .into_iter()
                .flat_map(|result| result.references.unwrap_or_default())
                .map(|reference| NodeId::from(reference.node_id.node_id.to_string()))
                .collect())
        })
        .await
    }

    async fn read_attributes(&self, node: &NodeId) -> Result<NodeAttributes, TransportError> {
        let display_name = match self
            .read_attribute(node, AttributeId::DisplayName, "DisplayName")
            .await?
        {
            UaVariant::LocalizedText(text) => text.text.as_ref().to_owned(),
            other => format!("{other:?}"),
        };
        let node_class = match self
            .read_attribute(node, AttributeId::NodeClass, "NodeClass")
            .await?
        {
            UaVariant::Int32(1) => NodeClass::Object,
            UaVariant::Int32(2) => NodeClass::Variable,
            UaVariant::Int32(8) => NodeClass::ObjectType,
            _ => NodeClass::Other,
        };
        Ok(NodeAttributes {
            display_name,
            node_class,
        })
    }

    async fn read_data_type(&self, node: &NodeId) -> Result<String, TransportError> {
        match self
            .read_attribute(node, AttributeId::DataType, "DataType")
            .await?
        {
            UaVariant::NodeId(id) => Ok(builtin_type_name(&id)),
            _ => Err(TransportError::BadAttribute {
                node: node.clone(),
                attribute: "DataType",
            }),
        }
    }

    async fn read_value(&self, node: &NodeId) -> Result<Variant, TransportError> {
        let value = self.read_attribute(node, AttributeId::Value, "Value").await?;
        Ok(from_ua(value))
    }

    fn is_alive(&self) -> bool {
        self.session.read().is_connected()
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let session = self.session.clone();
        blocking(move || {
            session.read().disconnect();
            Ok(())
        })
        .await
    }
}

// ── conversions ─────────────────────────────────────────────────────

async fn blocking<T, F>(f: F) -> Result<T, TransportError>
where
    F: FnOnce() -> Result<T, TransportError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TransportError::Protocol(format!("blocking task failed: {e}")))?
}

fn status_error(status: StatusCode) -> TransportError {
    if status == StatusCode::BadNotConnected
        || status == StatusCode::BadConnectionClosed
        || status == StatusCode::BadSessionClosed
    {
        TransportError::Disconnected
    } else if status == StatusCode::BadTimeout {
        TransportError::Timeout(0)
    } else {
        TransportError::Protocol(status.to_string())
    }
}

fn to_ua(node: &NodeId) -> Result<UaNodeId, TransportError> {
    UaNodeId::from_str(node.as_str()).map_err(|_| TransportError::UnknownNode(node.clone()))
}

/// Name of a namespace-0 built-in data type, or the data type's node id.
fn builtin_type_name(id: &UaNodeId) -> String {
    let name = match id.as_u32() {
        Some(1) if id.namespace == 0 => "Boolean",
        Some(2) if id.namespace == 0 => "SByte",
        Some(3) if id.namespace == 0 => "Byte",
        Some(4) if id.namespace == 0 => "Int16",
        Some(5) if id.namespace == 0 => "UInt16",
        Some(6) if id.namespace == 0 => "Int32",
        Some(7) if id.namespace == 0 => "UInt32",
        Some(8) if id.namespace == 0 => "Int64",
        Some(9) if id.namespace == 0 => "UInt64",
        Some(10) if id.namespace == 0 => "Float",
        Some(11) if id.namespace == 0 => "Double",
        Some(12) if id.namespace == 0 => "String",
        Some(13) if id.namespace == 0 => "DateTime",
        Some(14) if id.namespace == 0 => "Guid",
        Some(15) if id.namespace == 0 => "ByteString",
        Some(21) if id.namespace == 0 => "LocalizedText",
        _ => return id.to_string(),
    };
    name.to_owned()
}

fn from_ua(value: UaVariant) -> Variant {
    match value {
        UaVariant::Boolean(v) => Variant::Boolean(v),
        UaVariant::SByte(v) => Variant::Int64(v.into()),
        UaVariant::Byte(v) => Variant::Int64(v.into()),
        UaVariant::Int16(v) => Variant::Int64(v.into()),
        UaVariant::UInt16(v) => Variant::Int64(v.into()),
        UaVariant::Int32(v) => Variant::Int64(v.into()),
        UaVariant::UInt32(v) => Variant::Int64(v.into()),
        UaVariant::Int64(v) => Variant::Int64(v),
        UaVariant::Float(v) => Variant::Double(v.into()),
        UaVariant::Double(v) => Variant::Double(v),
        UaVariant::String(s) => Variant::String(s.as_ref().to_owned()),
        UaVariant::LocalizedText(text) => Variant::String(text.text.as_ref().to_owned()),
        other => Variant::String(format!("{other:?}")),
    }
}
