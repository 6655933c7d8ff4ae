use errors::BridgeError;
use serde::{
    Deserialize,
    Serialize,
};

/// A commit unit in the source repository. Totally ordered by `id`; once the
/// cursor reaches `T`, no transaction `<= T` is re-ingested in the normal
/// path (§3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub commit_time_ms: i64,
    pub updates: u32,
    pub deletes: u32,
}

/// `"u" | "d"` on the wire. Any other value is a Schema error: a protocol
/// guarantee was violated, so the cycle aborts rather than guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Updated,
    Deleted,
}

impl NodeStatus {
    pub fn parse(raw: &str) -> Result<Self, BridgeError> {
        match raw {
            "u" => Ok(NodeStatus::Updated),
            "d" => Ok(NodeStatus::Deleted),
            other => Err(BridgeError::schema(format!(
                "unknown transaction node status {other:?}"
            ))),
        }
    }
}

impl Serialize for NodeStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let s = match self {
            NodeStatus::Updated => "u",
            NodeStatus::Deleted => "d",
        };
        serializer.serialize_str(s)
    }
}

impl<'de> Deserialize<'de> for NodeStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NodeStatus::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Per-node change header returned by the `nodes` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionNode {
    pub id: i64,
    pub status: NodeStatus,
    pub node_ref: String,
    pub txn_id: i64,
}

impl TransactionNode {
    /// The UUID used as the search document id: the trailing segment of
    /// `nodeRef` after the final `/`, matched via `.+://.+/(.+)`.
    pub fn uuid(&self) -> Result<&str, BridgeError> {
        extract_uuid(&self.node_ref)
    }
}

/// Extracts the trailing UUID segment from a `<protocol>://<store>/<uuid>`
/// reference. A `nodeRef` that doesn't match the shape is a Parse error.
pub fn extract_uuid(node_ref: &str) -> Result<&str, BridgeError> {
    let after_scheme = node_ref
        .split_once("://")
        .map(|(_, rest)| rest)
        .ok_or_else(|| BridgeError::parse(format!("nodeRef {node_ref:?} has no scheme separator")))?;
    match after_scheme.rsplit_once('/') {
        Some((_, uuid)) if !uuid.is_empty() => Ok(&node_ref[node_ref.len() - uuid.len()..]),
        _ => Err(BridgeError::parse(format!(
            "nodeRef {node_ref:?} has no trailing UUID segment"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_uuid_from_well_formed_node_ref() {
        assert_eq!(
            extract_uuid("workspace://SpacesStore/abc-123").unwrap(),
            "abc-123"
        );
    }

    #[test]
    fn rejects_node_ref_without_scheme() {
        assert!(extract_uuid("abc-123").is_err());
    }

    #[test]
    fn rejects_node_ref_with_empty_trailing_segment() {
        assert!(extract_uuid("workspace://SpacesStore/").is_err());
    }

    #[test]
    fn node_status_round_trips_through_json() {
        let updated: NodeStatus = serde_json::from_str("\"u\"").unwrap();
        assert_eq!(updated, NodeStatus::Updated);
        assert_eq!(serde_json::to_string(&NodeStatus::Deleted).unwrap(), "\"d\"");
    }

    #[test]
    fn unknown_node_status_is_a_schema_error() {
        let err = NodeStatus::parse("x").unwrap_err();
        assert_eq!(err.kind, errors::BridgeErrorKind::Schema);
    }
}
