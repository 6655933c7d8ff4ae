//! Scheduled orchestrator tying every other component into one cycle
//! (§4.8). Mirrors the teacher's scheduler-thread-plus-worker-pool shape:
//! one task drives cycles on a cron-style cadence, cycles never overlap,
//! and the async content phase is handed off once a cycle's bulk write
//! lands successfully.

use std::{
    sync::atomic::{
        AtomicBool,
        Ordering,
    },
    time::Duration,
};

use chrono::Utc;
use content_workers::ContentWorkPool;
use errors::BridgeError;
use index_manager::IndexManager;
use model::NodeStatus;
use namespace_mapper::NamespaceMapper;
use repo_client::RepoClient;
use saffron::Cron;
use search_client::SearchClient;

/// Number of attempts the delete path makes before giving up on one
/// `delete-by-query` (§4.6): the call is retried up to three times with a
/// five-second back-off, exiting as soon as a match is reported deleted.
const DELETE_RETRY_ATTEMPTS: u32 = 3;
const DELETE_RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct PipelineController {
    repo: RepoClient,
    search: SearchClient,
    index_manager: IndexManager,
    namespace_mapper: NamespaceMapper,
    content_pool: ContentWorkPool,
    max_results: u32,
    cron: Cron,
    /// Guards the at-most-one-concurrent-cycle invariant (§5). A tick that
    /// arrives while this is held is dropped rather than queued.
    cycle_in_flight: AtomicBool,
}

impl PipelineController {
    pub fn new(
        cron_expr: &str,
        max_results: u32,
        repo: RepoClient,
        search: SearchClient,
        index_manager: IndexManager,
        namespace_mapper: NamespaceMapper,
        content_pool: ContentWorkPool,
    ) -> anyhow::Result<Self> {
        let cron: Cron = cron_expr
            .parse()
            .map_err(|e| anyhow::anyhow!("parsing indexer.cron {cron_expr:?}: {e}"))?;
        Ok(Self {
            repo,
            search,
            index_manager,
            namespace_mapper,
            content_pool,
            max_results,
            cron,
            cycle_in_flight: AtomicBool::new(false),
        })
    }

    /// Drives cycles forever on the configured cron cadence. Never returns
    /// under normal operation; cycle failures are logged and the process
    /// keeps running so the next scheduled tick can retry (§7).
    pub async fn run_forever(&self) {
        loop {
            let now = Utc::now();
            let Some(next) = self.cron.next_after(now) else {
                tracing::error!("cron schedule has no further occurrences, stopping scheduler");
                return;
            };
            let sleep_for = (next - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(sleep_for).await;
            self.tick().await;
        }
    }

    /// Runs one cycle unless the previous one is still in flight, in which
    /// case this tick is dropped (§4.8, §5).
    pub async fn tick(&self) {
        if self.cycle_in_flight.swap(true, Ordering::SeqCst) {
            tracing::warn!("previous cycle still running, dropping this tick");
            return;
        }
        let result = self.run_cycle().await;
        self.cycle_in_flight.store(false, Ordering::SeqCst);
        if let Err(err) = result {
            match BridgeError::find_in(&err) {
                Some(tagged) => {
                    tracing::error!(kind = %tagged.kind, error = %err, "cycle failed, cursor left unchanged");
                },
                None => tracing::error!(error = %err, "cycle failed, cursor left unchanged"),
            }
        }
    }

    async fn run_cycle(&self) -> anyhow::Result<()> {
        self.namespace_mapper.sync().await?;
        let namespace = self.namespace_mapper.current();

        let cursor = self.index_manager.read_cursor().await?;
        let txns = self.repo.get_transactions(cursor + 1, self.max_results).await?;
        if txns.transactions.is_empty() {
            return Ok(());
        }

        let window_min_txn_id = txns.transactions.iter().map(|t| t.id).min().expect("non-empty checked above");
        let window_max_txn_id = txns.transactions.iter().map(|t| t.id).max().expect("non-empty checked above");
        let window_max_commit_time = txns
            .transactions
            .iter()
            .map(|t| t.commit_time_ms)
            .max()
            .expect("non-empty checked above");

        let nodes = self.repo.get_nodes(window_min_txn_id, window_max_txn_id).await?;

        let resolved = node_resolver::resolve_updated_nodes(&self.repo, &nodes.nodes, &namespace).await?;

        let mut ops = Vec::with_capacity(resolved.len());
        for node in &resolved {
            ops.push(request_builder::build_upsert(node, window_max_commit_time)?);
        }
        if !ops.is_empty() {
            let outcome = self.search.bulk(&ops).await?;
            if !outcome.is_success() {
                return Err(BridgeError::consistency(format!(
                    "bulk index had {} item failure(s), e.g. {}: {}",
                    outcome.failures.len(),
                    outcome.failures[0].id,
                    outcome.failures[0].reason,
                ))
                .into());
            }
        }

        for txn_node in nodes.nodes.iter().filter(|n| n.status == NodeStatus::Deleted) {
            self.delete_with_retry(&txn_node.node_ref).await?;
        }

        self.index_manager.write_cursor(window_max_txn_id).await?;

        self.content_pool.dispatch(resolved).await;

        Ok(())
    }

    async fn delete_with_retry(&self, node_ref: &str) -> anyhow::Result<()> {
        let uuid = request_builder::delete_document_id(node_ref)?;
        for attempt in 1..=DELETE_RETRY_ATTEMPTS {
            let deleted = self.search.delete_by_query("id", &uuid).await?;
            if deleted > 0 {
                return Ok(());
            }
            if attempt < DELETE_RETRY_ATTEMPTS {
                tokio::time::sleep(DELETE_RETRY_DELAY).await;
            }
        }
        tracing::warn!(uuid, "delete-by-query reported no match after all retries");
        Ok(())
    }
}
