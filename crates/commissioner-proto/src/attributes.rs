//! Attribute paths and values.
//!
//! A read request names [`AttributePath`]s, which may leave the endpoint as a
//! wildcard. A read report answers with [`ConcreteAttributePath`]s, one per
//! endpoint that actually carries the attribute.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{AttributeId, ClusterId, EndpointId};

/// Path named in a read request. `endpoint == None` is a wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttributePath {
    /// Endpoint, or `None` for every endpoint
    pub endpoint: Option<EndpointId>,
    /// Cluster
    pub cluster: ClusterId,
    /// Attribute
    pub attribute: AttributeId,
}

impl AttributePath {
    /// Path on one endpoint.
    pub const fn new(endpoint: EndpointId, cluster: ClusterId, attribute: AttributeId) -> Self {
        Self { endpoint: Some(endpoint), cluster, attribute }
    }

    /// Path on every endpoint.
    pub const fn wildcard(cluster: ClusterId, attribute: AttributeId) -> Self {
        Self { endpoint: None, cluster, attribute }
    }

    /// Whether a concrete path from a report answers this request path.
    pub fn matches(&self, concrete: &ConcreteAttributePath) -> bool {
        self.cluster == concrete.cluster
            && self.attribute == concrete.attribute
            && self.endpoint.is_none_or(|ep| ep == concrete.endpoint)
    }
}

/// Path carried in a read report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConcreteAttributePath {
    /// Endpoint
    pub endpoint: EndpointId,
    /// Cluster
    pub cluster: ClusterId,
    /// Attribute
    pub attribute: AttributeId,
}

impl ConcreteAttributePath {
    /// Construct a concrete path.
    pub const fn new(endpoint: EndpointId, cluster: ClusterId, attribute: AttributeId) -> Self {
        Self { endpoint, cluster, attribute }
    }
}

/// Decoded attribute value.
///
/// Structs are keyed by context tag, matching how cluster specifications
/// number struct fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// Null
    Null,
    /// Boolean
    Bool(bool),
    /// Unsigned integer (any width)
    Unsigned(u64),
    /// Signed integer (any width)
    Signed(i64),
    /// UTF-8 string
    Text(String),
    /// Octet string
    Bytes(Vec<u8>),
    /// List of values
    List(Vec<AttributeValue>),
    /// Struct keyed by context tag
    Struct(BTreeMap<u8, AttributeValue>),
}

impl AttributeValue {
    /// Value as an unsigned integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Unsigned(v) => Some(*v),
            Self::Signed(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Value as an octet string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Value as a list.
    pub fn as_list(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    /// Field of a struct value.
    pub fn field(&self, tag: u8) -> Option<&AttributeValue> {
        match self {
            Self::Struct(fields) => fields.get(&tag),
            _ => None,
        }
    }
}
