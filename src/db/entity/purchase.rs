use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A buy that will be sold back automatically once its hold window passes.
/// Keyed by the buy transaction hash; amounts are base-unit integers stored
/// as decimal strings.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub tx_hash: String,
    pub wallet_address: String,
    pub token_address: String,
    pub token_symbol: String,
    pub stable_address: String,
    pub stable_symbol: String,
    /// Stable spent on the buy.
    pub amount_in: String,
    /// Tokens received, updated from the quote at buy time.
    pub amount_out: String,
    pub chain_id: i64,
    pub status: String,
    pub purchase_time: DateTimeUtc,
    pub auto_sell_time: DateTimeUtc,
    pub sell_tx_hash: Option<String>,
    /// Set while an auto-sell worker holds the claim on this row.
    pub worker_id: Option<Uuid>,
    pub error_message: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
