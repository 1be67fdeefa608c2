use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::catalog::{CatalogToken, TokenSource};
use crate::config::SyncSettings;
use crate::db::entity::sync_job;
use crate::enums::SyncJobKind;
use crate::error::{AppError, Result};
use crate::sync::batches::{JobQueue, CATALOG_CHAIN};
use crate::sync::checkpoint::CheckpointStore;
use crate::sync::store::TokenStore;

/// Exponential backoff: base, 2x base, 4x base and so on per failure.
fn retry_delay_secs(base_secs: u64, failure_count: u32) -> u64 {
    let exponent = failure_count.saturating_sub(1).min(32);
    base_secs.saturating_mul(1u64 << exponent)
}

/// Polls the persisted job chain and executes runnable jobs in seq order.
/// Survives restarts: claimed-but-unfinished jobs are requeued at boot and
/// failures reschedule themselves with backoff.
pub struct SyncJobRunner {
    settings: SyncSettings,
    source: Arc<dyn TokenSource>,
    store: Arc<dyn TokenStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    queue: Arc<dyn JobQueue>,
}

impl SyncJobRunner {
    pub fn new(
        settings: SyncSettings,
        source: Arc<dyn TokenSource>,
        store: Arc<dyn TokenStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self { settings, source, store, checkpoints, queue }
    }

    /// Requeues jobs left in `running` by a crashed process. Call once at
    /// boot, before the poll loop starts.
    pub async fn recover_orphans(&self) -> Result<u64> {
        let requeued = self.queue.recover_orphans().await?;
        if requeued > 0 {
            info!("requeued {} orphaned sync jobs", requeued);
        }
        Ok(requeued)
    }

    pub async fn start(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_secs(self.settings.job_poll_secs));
        info!(
            "sync job runner started, polling every {}s",
            self.settings.job_poll_secs
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_due_jobs().await {
                        Ok(processed) if processed > 0 => {
                            debug!("job runner pass processed {} jobs", processed);
                        }
                        Ok(_) => {}
                        Err(e) => error!("job runner pass failed: {}", e),
                    }
                }
                _ = shutdown.changed() => {
                    info!("sync job runner stopping");
                    break;
                }
            }
        }
    }

    /// Claims and executes runnable jobs until the chain is drained or the
    /// head job is waiting on its backoff. Jobs always run lowest-seq
    /// first, so a failed batch blocks everything behind it.
    pub async fn run_due_jobs(&self) -> Result<usize> {
        let mut processed = 0;
        while let Some(job) = self.queue.next_runnable(CATALOG_CHAIN, Utc::now()).await? {
            if !self.queue.mark_running(job.id).await? {
                // Lost the claim, re-check the chain
                continue;
            }
            self.execute(&job).await?;
            processed += 1;
        }
        Ok(processed)
    }

    async fn execute(&self, job: &sync_job::Model) -> Result<()> {
        match job.kind.parse::<SyncJobKind>() {
            Ok(SyncJobKind::Placeholder) => {
                // Zero-work chain head
                self.queue.mark_succeeded(job.id).await?;
                Ok(())
            }
            Ok(SyncJobKind::PageBatch) => match self.fetch_batch(job).await {
                Ok(staged) => self.complete_batch(job, staged).await,
                Err(e) => self.handle_failure(job, &e).await,
            },
            Err(e) => {
                // A row this process cannot interpret is never retried
                self.queue.mark_failed(job.id, &e.to_string()).await?;
                Ok(())
            }
        }
    }

    /// Fetches the job's pages sequentially. Any page failure aborts the
    /// attempt; the retry refetches the whole batch, which the upsert
    /// makes harmless.
    async fn fetch_batch(&self, job: &sync_job::Model) -> Result<Vec<CatalogToken>> {
        let start = job.start_page as u32;
        let end = job.end_page as u32;
        let mut staged: Vec<CatalogToken> = Vec::new();

        for page in start..=end {
            let fetched = self.source.fetch_page(page, self.settings.page_size).await?;
            staged.extend(fetched.tokens.into_iter().filter(CatalogToken::is_usable));

            if page < end && self.settings.page_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.settings.page_delay_ms)).await;
            }
        }

        Ok(staged)
    }

    async fn complete_batch(&self, job: &sync_job::Model, staged: Vec<CatalogToken>) -> Result<()> {
        let written = self.store.upsert_batch(&staged, job.generation).await?;

        let mut checkpoint = self.checkpoints.load().await?;
        let end_page = job.end_page as u32;
        if end_page > checkpoint.last_page_synced {
            checkpoint.last_page_synced = end_page;
        }
        checkpoint.current_batch = job.seq as u32;
        checkpoint.total_tokens_cached = self.store.count().await?;
        self.checkpoints.save(&checkpoint).await?;

        if self.queue.mark_succeeded(job.id).await? {
            info!(
                "page batch {}..={} wrote {} tokens",
                job.start_page, job.end_page, written
            );
        } else {
            warn!("page batch {}..={} finished after its chain was cancelled", job.start_page, job.end_page);
        }
        Ok(())
    }

    async fn handle_failure(&self, job: &sync_job::Model, err: &AppError) -> Result<()> {
        let failures = job.attempts as u32 + 1;
        if failures >= self.settings.max_attempts {
            warn!(
                "page batch {}..={} failed permanently after {} attempts: {}",
                job.start_page, job.end_page, failures, err
            );
            self.queue.mark_failed(job.id, &err.to_string()).await?;
        } else {
            let delay = retry_delay_secs(self.settings.retry_base_secs, failures);
            let next_run = Utc::now() + chrono::Duration::seconds(delay as i64);
            warn!(
                "page batch {}..={} attempt {} failed, retrying in {}s: {}",
                job.start_page, job.end_page, failures, delay, err
            );
            self.queue.mark_retry(job.id, &err.to_string(), next_run).await?;
        }
        Ok(())
    }
}
