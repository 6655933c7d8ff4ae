//! Creates and maintains the two indices the bridge depends on (§4.3): the
//! data index holding one document per node, and a single-document control
//! index holding the durable cursor.

use http_client::{
    Transport,
    TransportError,
};
use model::Cursor;
use search_client::{
    BulkOperation,
    SearchClient,
};
use serde_json::{
    json,
    Value,
};

/// Fixed document id under which the cursor is stored in the control index.
const CURSOR_DOC_ID: &str = "1";

/// Minimum mapping the data index must carry (§4.3); callers may extend it.
pub fn default_data_mapping() -> Value {
    json!({
        "id": { "type": "text" },
        "dbid": { "type": "long" },
        "contentId": { "type": "long" },
        "name": { "type": "text" },
        "text": { "type": "text" },
    })
}

fn control_mapping() -> Value {
    json!({ "lastTransactionId": { "type": "long" } })
}

pub struct IndexManager {
    data: SearchClient,
    control: SearchClient,
}

impl IndexManager {
    pub fn new(transport: Transport, data_index: impl Into<String>, control_index: impl Into<String>) -> Self {
        Self {
            data: SearchClient::new(transport.clone(), data_index),
            control: SearchClient::new(transport, control_index),
        }
    }

    /// Ensures the data index exists, creating it with `mapping` merged over
    /// `default_data_mapping()` if it's missing.
    pub async fn ensure_data_index(&self, extra_mapping: &Value) -> Result<(), TransportError> {
        if self.data.exists().await? {
            return Ok(());
        }
        let mut mapping = default_data_mapping();
        if let (Some(base), Some(extra)) = (mapping.as_object_mut(), extra_mapping.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
        self.data.create_index(&mapping).await
    }

    pub async fn ensure_control_index(&self) -> Result<(), TransportError> {
        if self.control.exists().await? {
            return Ok(());
        }
        self.control.create_index(&control_mapping()).await
    }

    /// Returns `0` when the control document doesn't exist yet, matching the
    /// "next fetch starts at transaction 1" contract.
    pub async fn read_cursor(&self) -> Result<i64, TransportError> {
        match self.control.get(CURSOR_DOC_ID).await? {
            Some(doc) => Ok(doc
                .get("lastTransactionId")
                .and_then(Value::as_i64)
                .unwrap_or(Cursor::ABSENT.last_transaction_id)),
            None => Ok(Cursor::ABSENT.last_transaction_id),
        }
    }

    /// Overwrites the single cursor document, creating it on the first
    /// write. Called at most once per successful cycle (§5).
    pub async fn write_cursor(&self, last_transaction_id: i64) -> Result<(), TransportError> {
        let cursor = Cursor::new(last_transaction_id);
        let ops = [BulkOperation::Upsert {
            id: CURSOR_DOC_ID.to_string(),
            script_source: "ctx._source.lastTransactionId = params.lastTransactionId".to_string(),
            script_params: json!({ "lastTransactionId": cursor.last_transaction_id }),
            upsert_doc: json!({ "lastTransactionId": cursor.last_transaction_id }),
            retry_on_conflict: 0,
        }];
        self.control.bulk(&ops).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use http_client::AuthMode;
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

    async fn manager(server: &MockServer) -> IndexManager {
        let transport = Transport::new(server.uri(), AuthMode::MutualTls).unwrap();
        IndexManager::new(transport, "alfresco", "alfresco-control")
    }

    #[tokio::test]
    async fn read_cursor_returns_zero_when_document_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alfresco-control/_doc/1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let cursor = manager(&server).await.read_cursor().await.unwrap();
        assert_eq!(cursor, 0);
    }

    #[tokio::test]
    async fn read_cursor_reads_existing_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alfresco-control/_doc/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lastTransactionId": 42})))
            .mount(&server)
            .await;

        let cursor = manager(&server).await.read_cursor().await.unwrap();
        assert_eq!(cursor, 42);
    }

    #[tokio::test]
    async fn ensure_data_index_skips_creation_when_present() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/alfresco"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        manager(&server).await.ensure_data_index(&json!({})).await.unwrap();
    }
}
