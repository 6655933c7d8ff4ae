//! Fixed-size concurrent pool that opportunistically fetches and attaches
//! text content after a metadata bulk succeeds (§4.7).
//!
//! Modeled as a bounded `tokio::sync::mpsc` channel feeding a fixed set of
//! worker tasks, the idiomatic-async equivalent of the design notes' "bounded
//! worker pool with a submission queue; do not use unbounded task-spawn."
//! The channel's bounded capacity provides the back-pressure the design
//! notes ask for: `dispatch` blocks the caller once the queue is full
//! instead of spawning a task per node.

use std::sync::Arc;

use model::{
    encoding::encode_field_key,
    transaction::extract_uuid,
    Node,
};
use repo_client::RepoClient;
use search_client::SearchClient;
use serde_json::{
    json,
    Value,
};
use tokio::sync::{
    mpsc,
    Mutex,
};

const PROP_CONTENT: &str = "cm:content";
const PROP_STORE_IDENTIFIER: &str = "sys:store-identifier";
const SPACES_STORE: &str = "SpacesStore";

pub struct ContentWorkPool {
    sender: mpsc::Sender<Node>,
}

impl ContentWorkPool {
    /// Spawns `worker_count` tasks sharing one bounded channel of capacity
    /// `queue_capacity`.
    pub fn new(worker_count: usize, queue_capacity: usize, repo: RepoClient, search: SearchClient) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let repo = Arc::new(repo);
        let search = Arc::new(search);
        for _ in 0..worker_count.max(1) {
            let receiver = receiver.clone();
            let repo = repo.clone();
            let search = search.clone();
            tokio::spawn(async move {
                loop {
                    let node = receiver.lock().await.recv().await;
                    match node {
                        Some(node) => process_node(&repo, &search, node).await,
                        None => break,
                    }
                }
            });
        }
        Self { sender }
    }

    /// Enqueues every node worth considering for a content refresh. Errors
    /// inside a worker are isolated per node (§4.7): a failed fetch is
    /// logged and skipped, never surfaced to the caller, since the next
    /// metadata update for the same node will retry.
    pub async fn dispatch(&self, nodes: Vec<Node>) {
        for node in nodes {
            if should_consider(&node) {
                if self.sender.send(node).await.is_err() {
                    tracing::warn!("content worker pool is shut down, dropping pending dispatch");
                    break;
                }
            }
        }
    }
}

fn should_consider(node: &Node) -> bool {
    let in_spaces_store = node.property(PROP_STORE_IDENTIFIER).and_then(Value::as_str) == Some(SPACES_STORE);
    in_spaces_store && content_id(node).is_some()
}

fn content_id(node: &Node) -> Option<Value> {
    node.property(PROP_CONTENT)?.as_object()?.get("contentId").filter(|v| !v.is_null()).cloned()
}

fn content_id_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

async fn process_node(repo: &RepoClient, search: &SearchClient, node: Node) {
    let node_id = node.id;
    if let Err(err) = try_process_node(repo, search, &node).await {
        tracing::warn!(node_id, error = %err, "content worker failed for node, will retry on next metadata update");
    }
}

async fn try_process_node(repo: &RepoClient, search: &SearchClient, node: &Node) -> anyhow::Result<()> {
    let Some(current_content_id) = content_id(node) else {
        return Ok(());
    };
    let doc_id = extract_uuid(&node.node_ref)?;

    let stored_content_id = search
        .get(doc_id)
        .await?
        .and_then(|doc| doc.get(&encode_field_key("contentId")).map(content_id_as_text))
        .unwrap_or_default();
    if stored_content_id == content_id_as_text(&current_content_id) {
        return Ok(());
    }

    let text = repo.get_text_content(node.id).await?;
    let script_source = format!(
        "ctx._source['{content_key}'] = params.text; ctx._source['{content_id_key}'] = params.contentId;",
        content_key = encode_field_key(PROP_CONTENT),
        content_id_key = encode_field_key("contentId"),
    );
    search
        .update(doc_id, &script_source, json!({ "text": text, "contentId": current_content_id }))
        .await?;
    Ok(())
}
