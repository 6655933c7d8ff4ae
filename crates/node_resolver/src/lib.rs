//! Resolves full metadata + ACL readers for a batch of updated nodes
//! (§4.5).

use std::collections::BTreeSet;

use model::{
    namespace::split_qname,
    NamespaceMapping,
    Node,
    NodeStatus,
    TransactionNode,
};
use repo_client::RepoClient;

/// Fetches metadata for every node marked `"u"` in `txn_nodes`, rewrites
/// property keys through `namespace`, then attaches ACL readers in one
/// batched call per distinct ACL id.
pub async fn resolve_updated_nodes(
    repo: &RepoClient,
    txn_nodes: &[TransactionNode],
    namespace: &NamespaceMapping,
) -> anyhow::Result<Vec<Node>> {
    let mut nodes = Vec::new();
    for txn_node in txn_nodes.iter().filter(|n| n.status == NodeStatus::Updated) {
        let response = repo.get_metadata(txn_node.id).await?;
        nodes.extend(response.nodes);
    }

    for node in &mut nodes {
        rewrite_property_keys(node, namespace);
    }

    let acl_ids: Vec<i64> = nodes.iter().map(|n| n.acl_id).collect::<BTreeSet<_>>().into_iter().collect();
    if acl_ids.is_empty() {
        return Ok(nodes);
    }
    let acls_readers = repo.get_acls_readers(&acl_ids).await?;

    for node in &mut nodes {
        node.readers = acls_readers
            .acls_readers
            .iter()
            .find(|a| a.acl_id == node.acl_id)
            .map(|a| a.readers.clone())
            .unwrap_or_default();
    }

    Ok(nodes)
}

/// Rewrites every `{uri}local` property key to `prefix:local`. Keys whose
/// URI has no known prefix are logged and kept in their raw `{uri}local`
/// form (§4.5) so correctness is preserved even when a custom model isn't
/// deployed yet.
fn rewrite_property_keys(node: &mut Node, namespace: &NamespaceMapping) {
    let keys: Vec<String> = node.properties.keys().cloned().collect();
    for qname in keys {
        let Some((uri, local)) = split_qname(&qname) else {
            continue;
        };
        let rewritten = match namespace.resolve(&qname) {
            Some((prefix, local)) => format!("{prefix}:{local}"),
            None => {
                tracing::warn!(uri, local, "no namespace prefix known for property key, keeping raw QName");
                qname.clone()
            },
        };
        if rewritten != qname {
            if let Some(value) = node.properties.remove(&qname) {
                node.properties.insert(rewritten, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use http_client::{
        AuthMode,
        Transport,
    };
    use serde_json::json;
    use wiremock::{
        matchers::{
            method,
            path,
        },
        Mock,
        MockServer,
        ResponseTemplate,
    };

    use super::*;

    fn txn_node(id: i64, status: &str) -> TransactionNode {
        let node_status = model::NodeStatus::parse(status).unwrap();
        TransactionNode {
            id,
            status: node_status,
            node_ref: format!("workspace://SpacesStore/node-{id}"),
            txn_id: 1,
        }
    }

    #[tokio::test]
    async fn skips_nodes_not_marked_updated() {
        let server = MockServer::start().await;
        let transport = Transport::new(server.uri(), AuthMode::MutualTls).unwrap();
        let repo = RepoClient::new(transport, "solr");
        let nodes = resolve_updated_nodes(&repo, &[txn_node(1, "d")], &NamespaceMapping::new())
            .await
            .unwrap();
        assert!(nodes.is_empty());
    }

    #[tokio::test]
    async fn rewrites_known_property_prefix_and_fills_readers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/solr/metadata"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "nodes": [{
                    "id": 1,
                    "tenantDomain": "default",
                    "nodeRef": "workspace://SpacesStore/node-1",
                    "type": "cm:content",
                    "aclId": 7,
                    "txnId": 1,
                    "properties": { "{http://www.alfresco.org/model/content/1.0}name": "report.pdf" },
                }],
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/solr/aclsReaders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "aclsReaders": [{ "aclId": 7, "readers": ["GROUP_EVERYONE"], "denied": [], "tenantDomain": "default" }],
            })))
            .mount(&server)
            .await;

        let transport = Transport::new(server.uri(), AuthMode::MutualTls).unwrap();
        let repo = RepoClient::new(transport, "solr");
        let mut namespace = NamespaceMapping::new();
        namespace.insert("{http://www.alfresco.org/model/content/1.0}".to_string(), "cm".to_string());

        let nodes = resolve_updated_nodes(&repo, &[txn_node(1, "u")], &namespace).await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].property("cm:name").unwrap(), "report.pdf");
        assert_eq!(nodes[0].readers, vec!["GROUP_EVERYONE".to_string()]);
    }

    #[tokio::test]
    async fn missing_acl_resolves_to_empty_readers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/solr/metadata"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "nodes": [{
                    "id": 1, "tenantDomain": "default", "nodeRef": "workspace://SpacesStore/node-1",
                    "type": "cm:content", "aclId": 9, "txnId": 1,
                }],
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/solr/aclsReaders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "aclsReaders": [] })))
            .mount(&server)
            .await;

        let transport = Transport::new(server.uri(), AuthMode::MutualTls).unwrap();
        let repo = RepoClient::new(transport, "solr");
        let nodes = resolve_updated_nodes(&repo, &[txn_node(1, "u")], &NamespaceMapping::new())
            .await
            .unwrap();
        assert!(nodes[0].readers.is_empty());
    }
}
