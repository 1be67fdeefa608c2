use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Pagination bookkeeping for the token list mediator: which catalog page
/// a cached token came from, and its neighbours.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "token_remote_keys")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub token_address: String,
    pub prev_page: Option<i32>,
    pub next_page: Option<i32>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
