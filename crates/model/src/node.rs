use std::collections::BTreeMap;

use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

/// A property value as it arrives from the repository: a JSON scalar,
/// collection, or map. Normalization into index-ready shapes happens in the
/// request builder (§4.6), not here.
pub type PropertyValue = Value;

/// Full metadata record for one node, as returned by the `metadata`
/// endpoint. `properties` arrives keyed by `{uri}localName`; the node
/// metadata resolver rewrites those keys to `prefix:localName` in place
/// once the namespace mapping is available (§4.5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: i64,
    pub tenant_domain: String,
    pub node_ref: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub acl_id: i64,
    pub txn_id: i64,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
    #[serde(default)]
    pub aspects: Vec<String>,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub name_paths: Vec<Vec<String>>,
    #[serde(default)]
    pub ancestors: Vec<String>,
    #[serde(default)]
    pub parent_assocs: Vec<Value>,
    #[serde(default)]
    pub owner: Option<String>,
    /// Populated by the node metadata resolver after ACL readers are
    /// fetched; empty until then.
    #[serde(default)]
    pub readers: Vec<String>,
}

impl Node {
    /// Reads a property after key translation, matching §9's canonical
    /// resolution: callers should always read `sys:store-identifier` in its
    /// rewritten (prefixed) form, never the raw QName.
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }
}

/// Access-control readers for one ACL id, as returned in bulk by the
/// `aclsReaders` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclReaders {
    pub acl_id: i64,
    #[serde(default)]
    pub readers: Vec<String>,
    #[serde(default)]
    pub denied: Vec<String>,
    pub tenant_domain: String,
}
