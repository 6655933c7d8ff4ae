//! Translates a resolved node into index fields plus a monotonic merge
//! script, and builds the bulk upsert operation for it (§4.6).
//!
//! This is the most intricate component in the pipeline: it owns the field
//! extraction rules, the value-normalization rules, and the compatibility-
//! significant server-side script contract. Keep changes here conservative
//! — the script text is read by the search engine on every write and its
//! semantics (§9) must not drift.

use std::collections::{
    BTreeMap,
    BTreeSet,
};

use errors::BridgeError;
use model::{
    encoding::encode_field_key,
    transaction::extract_uuid,
    Node,
};
use search_client::BulkOperation;
use serde_json::{
    json,
    Map,
    Value,
};

const PROP_NAME: &str = "cm:name";
const PROP_OWNER: &str = "cm:owner";
const PROP_MODIFIER: &str = "cm:modifier";
const PROP_CREATOR: &str = "cm:creator";
const PROP_CREATED: &str = "cm:created";
const PROP_MODIFIED: &str = "cm:modified";
const PROP_CONTENT: &str = "cm:content";
const PROP_CONTENT_TR_STATUS: &str = "cm:content.tr_status";

const FIELD_TYPE: &str = "TYPE";
const FIELD_PRIMARY_PARENT: &str = "PRIMARY_PARENT";
const FIELD_PARENT: &str = "PARENT";
const FIELD_READER: &str = "READER";
const FIELD_METADATA_INDEXING_LAST_UPDATE: &str = "METADATA_INDEXING_LAST_UPDATE";
const FIELD_USER_CREATOR: &str = "USER_CREATOR";
const FIELD_USER_MODIFIER: &str = "USER_MODIFIER";
const FIELD_CREATION_DATE: &str = "CREATION_DATE_FIELD";
const FIELD_MODIFICATION_DATE: &str = "MODIFICATION_DATE_FIELD";
const FIELD_NAME: &str = "NAME";
const FIELD_OWNER: &str = "OWNER";
const FIELD_PROPERTIES: &str = "PROPERTIES";
const FIELD_ASPECT: &str = "ASPECT";
const FIELD_TAG: &str = "TAG";
const FIELD_CONTENT_MIME_TYPE: &str = "CONTENT_MIME_TYPE";
const FIELD_CONTENT_SIZE: &str = "CONTENT_SIZE";
const FIELD_CONTENT_ENCODING: &str = "CONTENT_ENCODING";
const FIELD_ALIVE: &str = "ALIVE";

/// Builds the logical (pre-encoding) field map for one node, given the
/// commit time of the transaction window being indexed.
pub fn extract_fields(node: &Node, max_txn_commit_time: i64) -> BTreeMap<&'static str, Value> {
    let mut fields: BTreeMap<&'static str, Value> = BTreeMap::new();

    fields.insert(FIELD_TYPE, json!(node.node_type));

    if let Some(primary_parent) = node.ancestors.first() {
        fields.insert(FIELD_PRIMARY_PARENT, json!(primary_parent));
    }
    if !node.ancestors.is_empty() {
        fields.insert(FIELD_PARENT, json!(node.ancestors));
    }

    fields.insert(FIELD_READER, json!(node.readers));
    fields.insert(FIELD_METADATA_INDEXING_LAST_UPDATE, json!(max_txn_commit_time));

    if let Some(value) = node.property(PROP_CREATOR) {
        fields.insert(FIELD_USER_CREATOR, normalize_value(value));
    }
    if let Some(value) = node.property(PROP_MODIFIER) {
        fields.insert(FIELD_USER_MODIFIER, normalize_value(value));
    }
    if let Some(value) = node.property(PROP_CREATED) {
        fields.insert(FIELD_CREATION_DATE, normalize_value(value));
    }
    if let Some(value) = node.property(PROP_MODIFIED) {
        fields.insert(FIELD_MODIFICATION_DATE, normalize_value(value));
    }
    if let Some(value) = node.property(PROP_NAME) {
        fields.insert(FIELD_NAME, normalize_value(value));
    }

    let owner = node.property(PROP_OWNER).or_else(|| node.property(PROP_MODIFIER));
    if let Some(value) = owner {
        fields.insert(FIELD_OWNER, normalize_value(value));
    }

    fields.insert(FIELD_ASPECT, json!(node.aspects));

    let tags: Vec<String> = node
        .name_paths
        .iter()
        .filter(|segments| segments.first().map(String::as_str) == Some("Tags"))
        .filter_map(|segments| segments.get(1).cloned())
        .collect();
    if !tags.is_empty() {
        fields.insert(FIELD_TAG, json!(tags));
    }

    if let Some(Value::Object(content)) = node.property(PROP_CONTENT) {
        if let Some(mimetype) = content.get("mimetype") {
            fields.insert(FIELD_CONTENT_MIME_TYPE, mimetype.clone());
        }
        if let Some(size) = content.get("size") {
            fields.insert(FIELD_CONTENT_SIZE, size.clone());
        }
        if let Some(encoding) = content.get("encoding") {
            fields.insert(FIELD_CONTENT_ENCODING, encoding.clone());
        }
    }

    fields.insert(FIELD_ALIVE, json!(true));

    fields
}

/// Copies every remaining property (excluding the ones already consumed
/// above, `cm:content`, and `cm:content.tr_status`) onto the field map under
/// its own prefixed key, and records which keys were written under
/// `PROPERTIES`.
fn write_remaining_properties(node: &Node, fields: &mut Map<String, Value>) {
    let mut written = BTreeSet::new();
    for (key, value) in &node.properties {
        if key == PROP_CONTENT || key == PROP_CONTENT_TR_STATUS {
            continue;
        }
        fields.insert(encode_field_key(key), normalize_value(value));
        written.insert(key.clone());
    }
    fields.insert(encode_field_key(FIELD_PROPERTIES), json!(written));
}

/// Normalizes a raw property value into its stored shape (§4.6, invariant 7):
/// - a list of locale-maps collapses to the `value` of the first entry
///   (empty string when it carries no `value` key);
/// - any other list is normalized element-wise, preserving shape;
/// - a map carrying an `id` key flattens to that id (entity-reference
///   flattening);
/// - everything else passes through unchanged.
pub fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Array(items) => {
            if let Some(flattened) = try_flatten_locale_list(items) {
                flattened
            } else {
                Value::Array(items.iter().map(normalize_scalar).collect())
            }
        },
        other => normalize_scalar(other),
    }
}

fn normalize_scalar(value: &Value) -> Value {
    match value {
        Value::Object(map) => map.get("id").cloned().unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

fn try_flatten_locale_list(items: &[Value]) -> Option<Value> {
    let first = items.first()?.as_object()?;
    let is_locale_shape = first.contains_key("locale")
        && (first.len() == 1 || (first.len() == 2 && first.contains_key("value")));
    if !is_locale_shape {
        return None;
    }
    Some(first.get("value").cloned().unwrap_or_else(|| json!("")))
}

/// Encodes every field key per §6 and returns the JSON object used as both
/// the merge script's `params` and the upsert document.
pub fn build_encoded_document(node: &Node, max_txn_commit_time: i64) -> Value {
    let logical = extract_fields(node, max_txn_commit_time);
    let mut encoded = Map::new();
    for (key, value) in logical {
        encoded.insert(encode_field_key(key), value);
    }
    write_remaining_properties(node, &mut encoded);
    Value::Object(encoded)
}

/// The server-side merge script text, parameterized only by the encoded
/// name of `METADATA_INDEXING_LAST_UPDATE` so the script itself never
/// embeds node data. Semantics (§9): newer commit time always wins; a
/// losing write is a complete no-op, never a partial overwrite.
pub fn merge_script_source() -> String {
    let key = encode_field_key(FIELD_METADATA_INDEXING_LAST_UPDATE);
    format!(
        "if (ctx._source.containsKey('{key}') && ctx._source['{key}'] > params['{key}']) {{ ctx.op = 'none'; }} \
         else {{ for (entry in params.entrySet()) {{ ctx._source[entry.getKey()] = entry.getValue(); }} }}"
    )
}

/// Builds the scripted upsert for one updated node, duplicating the encoded
/// document as both `params` and `upsert` so first-time inserts materialize
/// every field. Sets `retry_on_conflict = 5` to tolerate concurrent updates
/// to the same document within a bulk window.
pub fn build_upsert(node: &Node, max_txn_commit_time: i64) -> Result<BulkOperation, BridgeError> {
    let id = extract_uuid(&node.node_ref)?.to_string();
    let document = build_encoded_document(node, max_txn_commit_time);
    Ok(BulkOperation::Upsert {
        id,
        script_source: merge_script_source(),
        script_params: document.clone(),
        upsert_doc: document,
        retry_on_conflict: 5,
    })
}

/// The document id used by the delete path (§4.6): the UUID extracted from
/// `nodeRef`, matched against field `id` (not `_id`) via delete-by-query.
pub fn delete_document_id(node_ref: &str) -> Result<String, BridgeError> {
    extract_uuid(node_ref).map(str::to_string)
}
