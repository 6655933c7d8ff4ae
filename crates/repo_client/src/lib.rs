//! Client for the content-repository's admin REST surface (§4.1).
//!
//! A thin typed layer over `http_client::Transport`: every method here is a
//! single GET or POST with a fixed envelope shape, mirroring the teacher's
//! `application_client` style of one method per endpoint rather than a
//! generic request-builder surface.

use http_client::{
    Transport,
    TransportError,
};
use model::{
    AclReaders,
    Node,
    Transaction,
    TransactionNode,
};
use percent_encoding::{
    utf8_percent_encode,
    NON_ALPHANUMERIC,
};
use serde::{
    Deserialize,
    Serialize,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsResponse {
    pub transactions: Vec<Transaction>,
    pub max_txn_id: i64,
    pub max_txn_commit_time: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodesResponse {
    pub nodes: Vec<TransactionNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataResponse {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclsReadersResponse {
    pub acls_readers: Vec<AclReaders>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDiff {
    pub name: String,
    #[serde(rename = "type")]
    pub diff_type: String,
    #[serde(default)]
    pub old_checksum: Option<String>,
    #[serde(default)]
    pub new_checksum: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsDiffResponse {
    pub diffs: Vec<ModelDiff>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct MetadataRequest<'a> {
    node_ids: &'a [i64],
    include_acl_id: bool,
    include_owner: bool,
    include_paths: bool,
    include_parent_associations: bool,
    include_child_ids: bool,
    include_child_associations: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct NodesRequest {
    from_txn_id: i64,
    to_txn_id: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct AclsReadersRequest<'a> {
    acl_ids: &'a [i64],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModelsDiffRequest {
    models: Vec<String>,
}

/// Typed view over the six repository endpoints the pipeline depends on.
pub struct RepoClient {
    transport: Transport,
    solr_path: String,
}

impl RepoClient {
    pub fn new(transport: Transport, solr_path: impl Into<String>) -> Self {
        Self {
            transport,
            solr_path: solr_path.into(),
        }
    }

    fn path(&self, suffix: &str) -> String {
        format!("{}/{}", self.solr_path.trim_matches('/'), suffix.trim_start_matches('/'))
    }

    pub async fn get_transactions(
        &self,
        min_txn_id: i64,
        max_results: u32,
    ) -> Result<TransactionsResponse, TransportError> {
        let path = self.path(&format!("transactions?minTxnId={min_txn_id}&maxResults={max_results}"));
        self.transport.get_json(&path).await
    }

    pub async fn get_nodes(&self, from_txn_id: i64, to_txn_id: i64) -> Result<NodesResponse, TransportError> {
        let body = NodesRequest { from_txn_id, to_txn_id };
        self.transport.post_json(&self.path("nodes"), &body).await
    }

    /// Fetches metadata for one node. The reference behavior issues one
    /// request per node id; the resolver above this client chooses how many
    /// to run concurrently.
    pub async fn get_metadata(&self, node_id: i64) -> Result<MetadataResponse, TransportError> {
        let node_ids = [node_id];
        let body = MetadataRequest {
            node_ids: &node_ids,
            include_acl_id: true,
            include_owner: true,
            include_paths: true,
            include_parent_associations: true,
            include_child_ids: false,
            include_child_associations: false,
        };
        self.transport.post_json(&self.path("metadata"), &body).await
    }

    pub async fn get_acls_readers(&self, acl_ids: &[i64]) -> Result<AclsReadersResponse, TransportError> {
        let body = AclsReadersRequest { acl_ids };
        self.transport.post_json(&self.path("aclsReaders"), &body).await
    }

    /// Passing an empty `models` list asks the repository for the full
    /// current model list (§4.4).
    pub async fn get_models_diff(&self) -> Result<ModelsDiffResponse, TransportError> {
        let body = ModelsDiffRequest { models: Vec::new() };
        self.transport.post_json(&self.path("modelsdiff"), &body).await
    }

    /// Fetches one content model's XML definition by its `{uri}localName`
    /// QName.
    pub async fn get_model(&self, model_qname: &str) -> Result<Vec<u8>, TransportError> {
        let encoded: String = utf8_percent_encode(model_qname, NON_ALPHANUMERIC).to_string();
        let path = self.path(&format!("model?modelQName={encoded}"));
        self.transport.get_bytes(&path).await
    }

    pub async fn get_text_content(&self, node_id: i64) -> Result<String, TransportError> {
        let path = self.path(&format!("textContent?nodeId={node_id}"));
        let bytes = self.transport.get_bytes(&path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use http_client::AuthMode;
    use serde_json::json;
    use wiremock::{
        matchers::{
            method,
            path,
            query_param,
        },
        Mock,
        MockServer,
        ResponseTemplate,
    };

    use super::*;

    async fn client(server: &MockServer) -> RepoClient {
        let transport = Transport::new(server.uri(), AuthMode::MutualTls).unwrap();
        RepoClient::new(transport, "solr")
    }

    #[tokio::test]
    async fn fetches_transactions_with_window_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/solr/transactions"))
            .and(query_param("minTxnId", "5"))
            .and(query_param("maxResults", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transactions": [{"id": 6, "commitTimeMs": 1000, "updates": 1, "deletes": 0}],
                "maxTxnId": 6,
                "maxTxnCommitTime": 1000,
            })))
            .mount(&server)
            .await;

        let response = client(&server).await.get_transactions(5, 100).await.unwrap();
        assert_eq!(response.transactions.len(), 1);
        assert_eq!(response.max_txn_id, 6);
    }

    #[tokio::test]
    async fn requests_full_metadata_flags() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/solr/metadata"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"nodes": []})))
            .mount(&server)
            .await;

        let response = client(&server).await.get_metadata(42).await.unwrap();
        assert!(response.nodes.is_empty());
    }

    #[tokio::test]
    async fn empty_models_list_requests_full_diff() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/solr/modelsdiff"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "diffs": [{"name": "{http://x}m", "type": "CREATED"}],
            })))
            .mount(&server)
            .await;

        let response = client(&server).await.get_models_diff().await.unwrap();
        assert_eq!(response.diffs.len(), 1);
    }
}
