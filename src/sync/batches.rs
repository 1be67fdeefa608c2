use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db::entity::sync_job;
use crate::enums::SyncJobKind;
use crate::error::Result;

/// Name under which the catalog sync chain is enqueued. At most one live
/// chain exists per name.
pub const CATALOG_CHAIN: &str = "token-catalog-sync";

/// Inclusive page range a single background job covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

/// Row blueprint handed to the queue when a chain is enqueued.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub seq: i32,
    pub kind: SyncJobKind,
    pub start_page: u32,
    pub end_page: u32,
}

/// Aggregate job counts for a chain, served by the sync status endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChainProgress {
    pub total: u64,
    pub queued: u64,
    pub running: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl ChainProgress {
    pub fn is_active(&self) -> bool {
        self.queued > 0 || self.running > 0
    }
}

/// Durable queue backing the background sync chain.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Whether any queued or running job exists under `chain_name`.
    async fn chain_active(&self, chain_name: &str) -> Result<bool>;

    /// Inserts a fresh chain unless one is still live; a live chain is
    /// kept untouched and `false` is returned.
    async fn enqueue_chain(
        &self,
        chain_name: &str,
        generation: i64,
        specs: &[JobSpec],
    ) -> Result<bool>;

    /// The chain's head job, if it is ready to run right now.
    async fn next_runnable(
        &self,
        chain_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<sync_job::Model>>;

    async fn mark_running(&self, id: Uuid) -> Result<bool>;

    async fn mark_succeeded(&self, id: Uuid) -> Result<bool>;

    /// Requeues a failed run with a backoff deadline.
    async fn mark_retry(&self, id: Uuid, error: &str, retry_at: DateTime<Utc>) -> Result<bool>;

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<bool>;

    /// Cancels every live job of the chain; returns how many were hit.
    async fn cancel_chain(&self, chain_name: &str) -> Result<u64>;

    /// Requeues jobs left `running` by a crash.
    async fn recover_orphans(&self) -> Result<u64>;

    async fn chain_progress(&self, chain_name: &str) -> Result<ChainProgress>;
}

/// Splits `[start, end]` into contiguous ascending ranges of at most
/// `pages_per_batch` pages. Every page lands in exactly one range.
pub fn plan_batches(start: u32, end: u32, pages_per_batch: u32) -> Vec<PageRange> {
    if start > end || pages_per_batch == 0 {
        return Vec::new();
    }

    let mut batches = Vec::new();
    let mut current = start;
    while current <= end {
        let batch_end = current.saturating_add(pages_per_batch - 1).min(end);
        batches.push(PageRange { start: current, end: batch_end });
        match batch_end.checked_add(1) {
            Some(next) => current = next,
            None => break,
        }
    }
    batches
}

/// What `enqueue_sync_chain` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued { jobs: usize },
    KeptExisting,
}

/// Turns a page range into a persisted job chain: a zero-work placeholder
/// at seq 0 (an unconditional head), then one page-batch job per planned
/// range at seq 1..n.
pub struct WorkerChainBuilder {
    queue: Arc<dyn JobQueue>,
    pages_per_batch: u32,
}

impl WorkerChainBuilder {
    pub fn new(queue: Arc<dyn JobQueue>, pages_per_batch: u32) -> Self {
        Self { queue, pages_per_batch }
    }

    pub fn chain_specs(&self, range: PageRange) -> Vec<JobSpec> {
        let mut specs = vec![JobSpec {
            seq: 0,
            kind: SyncJobKind::Placeholder,
            start_page: 0,
            end_page: 0,
        }];

        for (i, batch) in plan_batches(range.start, range.end, self.pages_per_batch)
            .into_iter()
            .enumerate()
        {
            specs.push(JobSpec {
                seq: (i + 1) as i32,
                kind: SyncJobKind::PageBatch,
                start_page: batch.start,
                end_page: batch.end,
            });
        }
        specs
    }

    pub async fn enqueue_sync_chain(
        &self,
        range: PageRange,
        generation: i64,
    ) -> Result<EnqueueOutcome> {
        let specs = self.chain_specs(range);
        let inserted = self
            .queue
            .enqueue_chain(CATALOG_CHAIN, generation, &specs)
            .await?;
        Ok(if inserted {
            EnqueueOutcome::Enqueued { jobs: specs.len() }
        } else {
            EnqueueOutcome::KeptExisting
        })
    }
}
