use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue, DatabaseConnection, EntityTrait};

use crate::db::entity::sync_state;
use crate::error::Result;
use crate::sync::checkpoint::{CheckpointStore, SyncCheckpoint};

const KEY_LAST_PAGE_SYNCED: &str = "last_page_synced";
const KEY_TOTAL_PAGES: &str = "total_pages";
const KEY_CURRENT_BATCH: &str = "current_batch";
const KEY_LAST_SYNC_TIMESTAMP: &str = "last_sync_timestamp";
const KEY_SYNC_GENERATION: &str = "sync_generation";
const KEY_TOTAL_TOKENS_CACHED: &str = "total_tokens_cached";

/// Checkpoint persistence over the `sync_state` key-value table. One row
/// per field; absent or unparseable rows fall back to the field default.
#[derive(Clone)]
pub struct SyncStateRepository {
    db: DatabaseConnection,
}

impl SyncStateRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn write_all(&self, entries: &[(&str, String)]) -> Result<()> {
        let now = Utc::now();
        let models: Vec<sync_state::ActiveModel> = entries
            .iter()
            .map(|(key, value)| sync_state::ActiveModel {
                key: ActiveValue::Set(key.to_string()),
                value: ActiveValue::Set(value.clone()),
                updated_at: ActiveValue::Set(now),
            })
            .collect();

        sync_state::Entity::insert_many(models)
            .on_conflict(
                OnConflict::column(sync_state::Column::Key)
                    .update_columns([sync_state::Column::Value, sync_state::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    fn entries_for(checkpoint: &SyncCheckpoint) -> Vec<(&'static str, String)> {
        vec![
            (KEY_LAST_PAGE_SYNCED, checkpoint.last_page_synced.to_string()),
            (
                KEY_TOTAL_PAGES,
                checkpoint.total_pages.map(|p| p.to_string()).unwrap_or_default(),
            ),
            (KEY_CURRENT_BATCH, checkpoint.current_batch.to_string()),
            (
                KEY_LAST_SYNC_TIMESTAMP,
                checkpoint
                    .last_sync_timestamp
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
            ),
            (KEY_SYNC_GENERATION, checkpoint.sync_generation.to_string()),
            (KEY_TOTAL_TOKENS_CACHED, checkpoint.total_tokens_cached.to_string()),
        ]
    }
}

#[async_trait]
impl CheckpointStore for SyncStateRepository {
    async fn load(&self) -> Result<SyncCheckpoint> {
        let rows = sync_state::Entity::find().all(&self.db).await?;
        let map: HashMap<String, String> =
            rows.into_iter().map(|r| (r.key, r.value)).collect();

        let parse_u32 = |key: &str| map.get(key).and_then(|v| v.parse::<u32>().ok());

        Ok(SyncCheckpoint {
            last_page_synced: parse_u32(KEY_LAST_PAGE_SYNCED).unwrap_or(0),
            total_pages: parse_u32(KEY_TOTAL_PAGES),
            current_batch: parse_u32(KEY_CURRENT_BATCH).unwrap_or(0),
            last_sync_timestamp: map
                .get(KEY_LAST_SYNC_TIMESTAMP)
                .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                .map(|t| t.with_timezone(&Utc)),
            sync_generation: map
                .get(KEY_SYNC_GENERATION)
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(0),
            total_tokens_cached: map
                .get(KEY_TOTAL_TOKENS_CACHED)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0),
        })
    }

    async fn save(&self, checkpoint: &SyncCheckpoint) -> Result<()> {
        self.write_all(&Self::entries_for(checkpoint)).await
    }

    async fn reset(&self) -> Result<()> {
        let mut checkpoint = self.load().await?;
        checkpoint.last_page_synced = 0;
        checkpoint.current_batch = 0;
        checkpoint.last_sync_timestamp = None;
        checkpoint.total_tokens_cached = 0;
        self.save(&checkpoint).await
    }

    async fn increment_generation(&self) -> Result<i64> {
        let mut checkpoint = self.load().await?;
        checkpoint.sync_generation += 1;
        self.save(&checkpoint).await?;
        Ok(checkpoint.sync_generation)
    }
}
