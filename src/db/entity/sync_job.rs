use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One job in a named catalog sync chain. Jobs run in `seq` order; a chain
/// survives restarts because this table is the source of truth.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub chain_name: String,
    pub seq: i32,
    pub kind: String,
    pub start_page: i32,
    pub end_page: i32,
    /// Sync generation this job writes under.
    pub generation: i64,
    pub status: String,
    pub attempts: i32,
    /// Earliest time a failed job may retry; None means run now.
    pub next_run_at: Option<DateTimeUtc>,
    pub last_error: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
