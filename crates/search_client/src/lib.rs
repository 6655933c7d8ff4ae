//! Thin client over the target search engine's REST and bulk API (§4.2).
//!
//! Mirrors the shape of the repository client: one method per operation,
//! built on the same pooled `Transport`. The bulk endpoint is the one place
//! that needs a raw (newline-delimited JSON) body instead of a single JSON
//! document, so it goes through `Transport::post_raw`.

use http_client::{
    Transport,
    TransportError,
};
use serde::Serialize;
use serde_json::{
    json,
    Value,
};

/// One operation inside a bulk request. The pipeline only ever needs the
/// scripted-upsert shape (§4.2, §4.6); deletes go through the dedicated
/// `delete_by_query` call instead, since §4.6's delete path is keyed by the
/// `id` field's value, not by a document id known to match `_id`.
pub enum BulkOperation {
    /// A scripted upsert: applies `script` against an existing document, or
    /// materializes `upsert_doc` if the document doesn't exist yet.
    Upsert {
        id: String,
        script_source: String,
        script_params: Value,
        upsert_doc: Value,
        retry_on_conflict: u32,
    },
}

/// Outcome of one item inside a bulk response.
#[derive(Debug, Clone)]
pub struct BulkItemFailure {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct BulkOutcome {
    pub failures: Vec<BulkItemFailure>,
}

impl BulkOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A client bound to one data index.
pub struct SearchClient {
    transport: Transport,
    index: String,
}

impl SearchClient {
    pub fn new(transport: Transport, index: impl Into<String>) -> Self {
        Self {
            transport,
            index: index.into(),
        }
    }

    fn doc_path(&self, id: &str) -> String {
        format!("{}/_doc/{id}", self.index)
    }

    pub async fn bulk(&self, ops: &[BulkOperation]) -> Result<BulkOutcome, TransportError> {
        let mut body = Vec::new();
        for op in ops {
            match op {
                BulkOperation::Upsert {
                    id,
                    script_source,
                    script_params,
                    upsert_doc,
                    retry_on_conflict,
                } => {
                    append_line(
                        &mut body,
                        &json!({ "update": { "_index": self.index, "_id": id, "retry_on_conflict": retry_on_conflict } }),
                    );
                    append_line(
                        &mut body,
                        &json!({
                            "scripted_upsert": true,
                            "script": { "source": script_source, "params": script_params },
                            "upsert": upsert_doc,
                        }),
                    );
                },
            }
        }

        let response: Value = self.transport.post_raw("_bulk", "application/x-ndjson", body).await?;
        Ok(parse_bulk_outcome(&response))
    }

    /// Issues a single scripted update outside of a bulk batch, used by the
    /// content worker pool's per-node content patch.
    pub async fn update(&self, id: &str, script_source: &str, script_params: Value) -> Result<(), TransportError> {
        let body = json!({ "script": { "source": script_source, "params": script_params } });
        let _: Value = self.transport.post_json(&format!("{}/_update", self.doc_path(id)), &body).await?;
        Ok(())
    }

    /// Deletes every document where `field == value`. Returns the number of
    /// documents deleted.
    pub async fn delete_by_query(&self, field: &str, value: &str) -> Result<u64, TransportError> {
        let body = json!({ "query": { "term": { field: value } } });
        let response: Value = self
            .transport
            .post_json(&format!("{}/_delete_by_query", self.index), &body)
            .await?;
        Ok(response.get("deleted").and_then(Value::as_u64).unwrap_or(0))
    }

    pub async fn exists(&self) -> Result<bool, TransportError> {
        self.transport.head_ok(&self.index).await
    }

    /// Fetches one document's `_source` by id. `Ok(None)` on a 404; other
    /// non-2xx statuses surface as a `TransportError`.
    pub async fn get(&self, id: &str) -> Result<Option<Value>, TransportError> {
        match self.transport.get_json::<Value>(&self.doc_path(id)).await {
            Ok(envelope) => Ok(Some(envelope.get("_source").cloned().unwrap_or(envelope))),
            Err(err) if err.to_string().contains("404") => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn create_index(&self, mapping: &Value) -> Result<(), TransportError> {
        let body = json!({ "mappings": { "properties": mapping } });
        let _: Value = self.transport.put_json(&self.index, &body).await?;
        Ok(())
    }
}

fn append_line<T: Serialize>(buf: &mut Vec<u8>, value: &T) {
    serde_json::to_writer(&mut *buf, value).expect("serializing a bulk line never fails");
    buf.push(b'\n');
}

fn parse_bulk_outcome(response: &Value) -> BulkOutcome {
    let mut outcome = BulkOutcome::default();
    let Some(items) = response.get("items").and_then(Value::as_array) else {
        return outcome;
    };
    for item in items {
        let Some((_, result)) = item.as_object().and_then(|o| o.iter().next()) else {
            continue;
        };
        if let Some(error) = result.get("error") {
            let id = result.get("_id").and_then(Value::as_str).unwrap_or("<unknown>").to_string();
            let reason = error
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("unknown bulk item error")
                .to_string();
            outcome.failures.push(BulkItemFailure { id, reason });
        }
    }
    outcome
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

    async fn client(server: &MockServer) -> SearchClient {
        let transport = Transport::new(server.uri(), AuthMode::MutualTls).unwrap();
        SearchClient::new(transport, "alfresco")
    }

    #[tokio::test]
    async fn bulk_with_no_errors_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"update": {"_id": "abc", "result": "updated"}}],
            })))
            .mount(&server)
            .await;

        let ops = vec![BulkOperation::Upsert {
            id: "abc".to_string(),
            script_source: "noop".to_string(),
            script_params: json!({}),
            upsert_doc: json!({}),
            retry_on_conflict: 5,
        }];
        let outcome = client(&server).await.bulk(&ops).await.unwrap();
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn bulk_item_error_surfaces_as_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"update": {"_id": "abc", "error": {"reason": "conflict"}}}],
            })))
            .mount(&server)
            .await;

        let ops = vec![BulkOperation::Upsert {
            id: "abc".to_string(),
            script_source: "noop".to_string(),
            script_params: json!({}),
            upsert_doc: json!({}),
            retry_on_conflict: 5,
        }];
        let outcome = client(&server).await.bulk(&ops).await.unwrap();
        assert!(!outcome.is_success());
        assert_eq!(outcome.failures[0].reason, "conflict");
    }

    #[tokio::test]
    async fn delete_by_query_reads_deleted_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/alfresco/_delete_by_query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"deleted": 1})))
            .mount(&server)
            .await;

        let deleted = client(&server).await.delete_by_query("id", "abc-123").await.unwrap();
        assert_eq!(deleted, 1);
    }
}
