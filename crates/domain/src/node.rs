//! Address-space primitives shared by the client, the simulators and the gateway.

use std::fmt;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NodeId
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Opaque, endpoint-scoped node identifier in the standard string form
/// (`i=85`, `ns=2;i=17`, `ns=2;s=Line1.Pump`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// The address-space root folder.
    pub const ROOT_FOLDER: u32 = 84;
    /// The `Objects` folder directly under root.
    pub const OBJECTS_FOLDER: u32 = 85;
    /// The `Types` folder directly under root.
    pub const TYPES_FOLDER: u32 = 86;
    /// The `Views` folder directly under root.
    pub const VIEWS_FOLDER: u32 = 87;
    /// The `Server` object under `Objects`.
    pub const SERVER: u32 = 2253;

    /// A numeric identifier. Namespace 0 is rendered without the `ns=` prefix.
    pub fn numeric(namespace: u16, id: u32) -> Self {
        if namespace == 0 {
            Self(format!("i={id}"))
        } else {
            Self(format!("ns={namespace};i={id}"))
        }
    }

    /// A string identifier.
    pub fn string(namespace: u16, id: &str) -> Self {
        if namespace == 0 {
            Self(format!("s={id}"))
        } else {
            Self(format!("ns={namespace};s={id}"))
        }
    }

    pub fn root_folder() -> Self {
        Self::numeric(0, Self::ROOT_FOLDER)
    }

    pub fn objects_folder() -> Self {
        Self::numeric(0, Self::OBJECTS_FOLDER)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for NodeId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for NodeId {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NodeClass
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Category of an address-space entry.
///
/// Only `Object` and `ObjectType` are containers the walker descends into;
/// every other class the wire stack reports (methods, reference types, data
/// types, views) collapses into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeClass {
    Variable,
    Object,
    ObjectType,
    Other,
}

impl NodeClass {
    pub fn is_container(self) -> bool {
        matches!(self, NodeClass::Object | NodeClass::ObjectType)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeClass::Variable => "Variable",
            NodeClass::Object => "Object",
            NodeClass::ObjectType => "ObjectType",
            NodeClass::Other => "Other",
        }
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Variant
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A runtime value held by a Variable node.
///
/// Serializes as the bare JSON value (`true`, `42`, `61.5`, `"Running"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Variant {
    Boolean(bool),
    Int64(i64),
    Double(f64),
    String(String),
}

impl Variant {
    /// The built-in data type name reported for the variable during discovery.
    pub fn data_type(&self) -> &'static str {
        match self {
            Variant::Boolean(_) => "Boolean",
            Variant::Int64(_) => "Int64",
            Variant::Double(_) => "Double",
            Variant::String(_) => "String",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Variant::Double(v) => Some(*v),
            Variant::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Boolean(v)
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Variant::Int64(v)
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::Double(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_owned())
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_omit_namespace_zero() {
        assert_eq!(NodeId::objects_folder().as_str(), "i=85");
        assert_eq!(NodeId::numeric(2, 17).as_str(), "ns=2;i=17");
        assert_eq!(NodeId::string(3, "Line1.Pump").as_str(), "ns=3;s=Line1.Pump");
    }

    #[test]
    fn only_objects_and_object_types_are_containers() {
        assert!(NodeClass::Object.is_container());
        assert!(NodeClass::ObjectType.is_container());
        assert!(!NodeClass::Variable.is_container());
        assert!(!NodeClass::Other.is_container());
    }

    #[test]
    fn variant_serializes_as_bare_value() {
        assert_eq!(serde_json::to_string(&Variant::Double(61.5)).unwrap(), "61.5");
        assert_eq!(serde_json::to_string(&Variant::from("Idle")).unwrap(), "\"Idle\"");
        assert_eq!(serde_json::to_string(&Variant::Boolean(true)).unwrap(), "true");
    }

    #[test]
    fn variant_data_type_names() {
        assert_eq!(Variant::from(0.0).data_type(), "Double");
        assert_eq!(Variant::from(100_i64).data_type(), "Int64");
        assert_eq!(Variant::from(false).data_type(), "Boolean");
        assert_eq!(Variant::from("BATCH-001").data_type(), "String");
    }
}
