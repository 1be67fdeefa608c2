use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

/// Durable sync progress. Survives restarts so a resumed service picks up
/// where the last background batch left off.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncCheckpoint {
    /// Highest catalog page fully written to the cache (0 = none yet).
    pub last_page_synced: u32,
    /// Page count reported by the catalog, once discovered.
    pub total_pages: Option<u32>,
    /// Batch index the background chain is working on.
    pub current_batch: u32,
    pub last_sync_timestamp: Option<DateTime<Utc>>,
    /// Monotonic sync session counter; rows are tagged with it.
    pub sync_generation: i64,
    pub total_tokens_cached: u64,
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self) -> Result<SyncCheckpoint>;

    async fn save(&self, checkpoint: &SyncCheckpoint) -> Result<()>;

    /// Zeroes the paging fields. The generation counter is never reset so
    /// its monotonicity survives a forced resync.
    async fn reset(&self) -> Result<()>;

    /// Bumps the generation and returns the new value.
    async fn increment_generation(&self) -> Result<i64>;
}
