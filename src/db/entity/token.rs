use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One row of the trading catalog. Address is the checksummed hex string
/// exactly as the catalog API returns it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: i16,
    pub is_verified: bool,
    pub is_whitelisted: bool,
    pub is_honeypot: bool,
    pub has_transfer_fee: bool,
    pub tax: Option<Decimal>,
    pub total_tvl: Option<Decimal>,
    pub pool_count: i32,
    pub rank: Option<i32>,
    pub volume_rank: Option<i32>,
    pub logo_url: Option<String>,
    pub cached_at: DateTimeUtc,
    /// Tag of the sync run that last wrote this row.
    pub sync_generation: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
