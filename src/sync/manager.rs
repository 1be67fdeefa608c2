use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::catalog::{CatalogToken, TokenSource};
use crate::config::SyncSettings;
use crate::error::{AppError, Result};
use crate::sync::batches::{
    ChainProgress, EnqueueOutcome, JobQueue, PageRange, WorkerChainBuilder, CATALOG_CHAIN,
};
use crate::sync::checkpoint::{CheckpointStore, SyncCheckpoint};
use crate::sync::store::TokenStore;

/// Observable phase of the sync pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Syncing {
        current_page: u32,
        total_pages: u32,
        tokens_fetched: u64,
    },
}

/// Snapshot served by the sync status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SyncProgress {
    pub cached_tokens: u64,
    pub checkpoint: SyncCheckpoint,
    pub background_active: bool,
    pub chain: ChainProgress,
    pub phase: SyncPhase,
}

/// Drives catalog syncs: a bounded foreground fetch of the first pages,
/// then a durable background chain for the rest. At most one sync session
/// runs at a time.
pub struct TokenSyncManager {
    settings: SyncSettings,
    source: Arc<dyn TokenSource>,
    store: Arc<dyn TokenStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    queue: Arc<dyn JobQueue>,
    builder: WorkerChainBuilder,
    sync_lock: Mutex<()>,
    phase_tx: watch::Sender<SyncPhase>,
    // Kept so the channel always has a receiver and sends cannot fail
    phase_rx: watch::Receiver<SyncPhase>,
}

/// Strictly-older-than check; a checkpoint exactly `ttl_secs` old is
/// still fresh.
fn is_stale(last_sync: DateTime<Utc>, now: DateTime<Utc>, ttl_secs: i64) -> bool {
    now - last_sync > chrono::Duration::seconds(ttl_secs)
}

impl TokenSyncManager {
    pub fn new(
        settings: SyncSettings,
        source: Arc<dyn TokenSource>,
        store: Arc<dyn TokenStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        let builder = WorkerChainBuilder::new(queue.clone(), settings.pages_per_batch);
        let (phase_tx, phase_rx) = watch::channel(SyncPhase::Idle);
        Self {
            settings,
            source,
            store,
            checkpoints,
            queue,
            builder,
            sync_lock: Mutex::new(()),
            phase_tx,
            phase_rx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase_rx.clone()
    }

    /// True when the cache is empty or the last sync is older than the TTL.
    pub async fn should_sync(&self) -> Result<bool> {
        if self.store.count().await? == 0 {
            return Ok(true);
        }
        let checkpoint = self.checkpoints.load().await?;
        Ok(match checkpoint.last_sync_timestamp {
            Some(at) => is_stale(at, Utc::now(), self.settings.ttl_secs),
            None => true,
        })
    }

    /// Runs a sync session iff the cache is missing or stale. Returns
    /// whether a session ran.
    pub async fn check_and_start_sync(&self) -> Result<bool> {
        if !self.should_sync().await? {
            debug!("token cache fresh, skipping sync");
            return Ok(false);
        }
        match self.run_sync(false).await {
            Ok(()) => Ok(true),
            // Another session is already doing the work
            Err(AppError::SyncInProgress) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Unconditional resync: cancels the background chain, resets the
    /// checkpoint, bumps the generation and reaps rows of older ones.
    pub async fn force_sync(&self) -> Result<()> {
        self.run_sync(true).await
    }

    pub async fn progress(&self) -> Result<SyncProgress> {
        let checkpoint = self.checkpoints.load().await?;
        let chain = self.queue.chain_progress(CATALOG_CHAIN).await?;
        Ok(SyncProgress {
            cached_tokens: self.store.count().await?,
            background_active: chain.is_active(),
            chain,
            checkpoint,
            phase: self.phase_rx.borrow().clone(),
        })
    }

    async fn run_sync(&self, force: bool) -> Result<()> {
        let _guard = self.sync_lock.try_lock().map_err(|_| AppError::SyncInProgress)?;

        let result = self.run_sync_inner(force).await;
        let _ = self.phase_tx.send(SyncPhase::Idle);
        result
    }

    async fn run_sync_inner(&self, force: bool) -> Result<()> {
        if force {
            let cancelled = self.queue.cancel_chain(CATALOG_CHAIN).await?;
            if cancelled > 0 {
                info!("force sync cancelled {} background jobs", cancelled);
            }
            self.checkpoints.reset().await?;
        }
        let generation = self.checkpoints.increment_generation().await?;
        info!("starting catalog sync, generation {}", generation);

        // Phase 1: foreground pages, bounded so a slow catalog cannot
        // hold the caller hostage. A timeout here drops the staged rows
        // but never blocks phase 2.
        let timeout = Duration::from_secs(self.settings.foreground_timeout_secs);
        match tokio::time::timeout(timeout, self.fetch_foreground()).await {
            Ok((staged, total_pages)) => {
                let written = self.store.upsert_batch(&staged, generation).await?;
                info!(
                    "foreground sync wrote {} tokens over {} pages",
                    written, self.settings.foreground_pages
                );

                let mut checkpoint = self.checkpoints.load().await?;
                checkpoint.last_page_synced = self.settings.foreground_pages;
                checkpoint.current_batch = 0;
                checkpoint.total_pages = Some(total_pages);
                checkpoint.last_sync_timestamp = Some(Utc::now());
                checkpoint.total_tokens_cached = self.store.count().await?;
                self.checkpoints.save(&checkpoint).await?;

                if force {
                    let reaped = self.store.delete_generations_before(generation).await?;
                    if reaped > 0 {
                        debug!("reaped {} stale-generation rows", reaped);
                    }
                }
            }
            Err(_) => {
                warn!(
                    "foreground sync timed out after {}s, handing off to the background chain",
                    self.settings.foreground_timeout_secs
                );
            }
        }

        // Phase 2: the remaining pages become a durable job chain.
        let start = self.settings.foreground_pages + 1;
        let end = self.settings.background_max_page;
        if start <= end {
            let range = PageRange { start, end };
            match self.builder.enqueue_sync_chain(range, generation).await? {
                EnqueueOutcome::Enqueued { jobs } => {
                    info!(
                        "enqueued background chain: {} jobs for pages {}..={}",
                        jobs, start, end
                    );
                }
                EnqueueOutcome::KeptExisting => {
                    info!("background chain already live, keeping it");
                }
            }
        }

        Ok(())
    }

    /// Sequential page fetch with a fixed inter-request delay. A failed
    /// page is logged and skipped; later pages are still attempted.
    async fn fetch_foreground(&self) -> (Vec<CatalogToken>, u32) {
        let mut staged: Vec<CatalogToken> = Vec::new();
        let mut total_pages = self.settings.total_pages;
        let last = self.settings.foreground_pages;

        for page in 1..=last {
            match self.source.fetch_page(page, self.settings.page_size).await {
                Ok(fetched) => {
                    if let Some(reported) = fetched.total_pages {
                        total_pages = reported;
                    }
                    staged.extend(fetched.tokens.into_iter().filter(CatalogToken::is_usable));
                    let _ = self.phase_tx.send(SyncPhase::Syncing {
                        current_page: page,
                        total_pages,
                        tokens_fetched: staged.len() as u64,
                    });
                }
                Err(e) => {
                    warn!("catalog page {} failed, skipping: {}", page, e);
                }
            }

            if page < last && self.settings.page_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.settings.page_delay_ms)).await;
            }
        }

        (staged, total_pages)
    }
}
