use async_trait::async_trait;
use chrono::Utc;
use sea_orm::entity::prelude::Decimal;
use sea_orm::sea_query::{Expr, Func, OnConflict};
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};

use crate::catalog::CatalogToken;
use crate::db::entity::{token, token_remote_key};
use crate::error::Result;
use crate::services::portfolio_service::TokenReader;
use crate::sync::store::{PageKey, TokenStore};

#[derive(Clone)]
pub struct TokenRepository {
    db: DatabaseConnection,
}

impl TokenRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Catalog page in rank order. Unranked tokens sort last.
    pub async fn list_paged(&self, limit: u64, offset: u64) -> Result<Vec<token::Model>> {
        let results = token::Entity::find()
            .order_by_asc(token::Column::Rank)
            .order_by_asc(token::Column::Address)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;
        Ok(results)
    }

    fn to_active_model(t: &CatalogToken, generation: i64) -> token::ActiveModel {
        token::ActiveModel {
            address: ActiveValue::Set(t.address.clone()),
            name: ActiveValue::Set(t.name.clone()),
            symbol: ActiveValue::Set(t.symbol.clone()),
            decimals: ActiveValue::Set(t.decimals as i16),
            is_verified: ActiveValue::Set(t.is_verified),
            is_whitelisted: ActiveValue::Set(t.is_whitelisted),
            is_honeypot: ActiveValue::Set(t.is_honeypot),
            has_transfer_fee: ActiveValue::Set(t.has_transfer_fee),
            tax: ActiveValue::Set(t.tax.and_then(Decimal::from_f64_retain)),
            total_tvl: ActiveValue::Set(t.total_tvl.and_then(Decimal::from_f64_retain)),
            pool_count: ActiveValue::Set(t.pool_count),
            rank: ActiveValue::Set(t.rank),
            volume_rank: ActiveValue::Set(t.volume_rank),
            logo_url: ActiveValue::Set(t.logo_url.clone()),
            cached_at: ActiveValue::Set(Utc::now()),
            sync_generation: ActiveValue::Set(generation),
        }
    }

    fn upsert_conflict() -> OnConflict {
        OnConflict::column(token::Column::Address)
            .update_columns([
                token::Column::Name,
                token::Column::Symbol,
                token::Column::Decimals,
                token::Column::IsVerified,
                token::Column::IsWhitelisted,
                token::Column::IsHoneypot,
                token::Column::HasTransferFee,
                token::Column::Tax,
                token::Column::TotalTvl,
                token::Column::PoolCount,
                token::Column::Rank,
                token::Column::VolumeRank,
                token::Column::LogoUrl,
                token::Column::CachedAt,
                token::Column::SyncGeneration,
            ])
            .to_owned()
    }

    fn page_key_models(
        tokens: &[CatalogToken],
        prev_page: Option<u32>,
        next_page: Option<u32>,
    ) -> Vec<token_remote_key::ActiveModel> {
        let now = Utc::now();
        tokens
            .iter()
            .map(|t| token_remote_key::ActiveModel {
                token_address: ActiveValue::Set(t.address.clone()),
                prev_page: ActiveValue::Set(prev_page.map(|p| p as i32)),
                next_page: ActiveValue::Set(next_page.map(|p| p as i32)),
                created_at: ActiveValue::Set(now),
            })
            .collect()
    }

    async fn key_for_token(&self, address: &str) -> Result<Option<token_remote_key::Model>> {
        let key = token_remote_key::Entity::find_by_id(address.to_string())
            .one(&self.db)
            .await?;
        Ok(key)
    }
}

#[async_trait]
impl TokenStore for TokenRepository {
    async fn upsert_batch(&self, tokens: &[CatalogToken], generation: i64) -> Result<u64> {
        if tokens.is_empty() {
            return Ok(0);
        }

        let models: Vec<token::ActiveModel> =
            tokens.iter().map(|t| Self::to_active_model(t, generation)).collect();

        let rows = token::Entity::insert_many(models)
            .on_conflict(Self::upsert_conflict())
            .exec_without_returning(&self.db)
            .await?;
        Ok(rows)
    }

    async fn replace_all(
        &self,
        tokens: &[CatalogToken],
        prev_page: Option<u32>,
        next_page: Option<u32>,
        generation: i64,
    ) -> Result<()> {
        let txn = self.db.begin().await?;

        token_remote_key::Entity::delete_many().exec(&txn).await?;
        token::Entity::delete_many().exec(&txn).await?;

        if !tokens.is_empty() {
            let models: Vec<token::ActiveModel> =
                tokens.iter().map(|t| Self::to_active_model(t, generation)).collect();
            token::Entity::insert_many(models).exec_without_returning(&txn).await?;

            token_remote_key::Entity::insert_many(Self::page_key_models(tokens, prev_page, next_page))
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn insert_page(
        &self,
        tokens: &[CatalogToken],
        prev_page: Option<u32>,
        next_page: Option<u32>,
        generation: i64,
    ) -> Result<()> {
        if tokens.is_empty() {
            return Ok(());
        }

        let txn = self.db.begin().await?;

        let models: Vec<token::ActiveModel> =
            tokens.iter().map(|t| Self::to_active_model(t, generation)).collect();
        token::Entity::insert_many(models)
            .on_conflict(Self::upsert_conflict())
            .exec_without_returning(&txn)
            .await?;

        token_remote_key::Entity::insert_many(Self::page_key_models(tokens, prev_page, next_page))
            .on_conflict(
                OnConflict::column(token_remote_key::Column::TokenAddress)
                    .update_columns([
                        token_remote_key::Column::PrevPage,
                        token_remote_key::Column::NextPage,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;

        txn.commit().await?;
        Ok(())
    }

    async fn first_page_key(&self) -> Result<Option<PageKey>> {
        let first = token::Entity::find()
            .order_by_asc(token::Column::Rank)
            .order_by_asc(token::Column::Address)
            .one(&self.db)
            .await?;

        match first {
            Some(t) => Ok(self.key_for_token(&t.address).await?.map(|k| PageKey {
                prev_page: k.prev_page.map(|p| p as u32),
                next_page: k.next_page.map(|p| p as u32),
            })),
            None => Ok(None),
        }
    }

    async fn last_page_key(&self) -> Result<Option<PageKey>> {
        let last = token::Entity::find()
            .order_by_desc(token::Column::Rank)
            .order_by_desc(token::Column::Address)
            .one(&self.db)
            .await?;

        match last {
            Some(t) => Ok(self.key_for_token(&t.address).await?.map(|k| PageKey {
                prev_page: k.prev_page.map(|p| p as u32),
                next_page: k.next_page.map(|p| p as u32),
            })),
            None => Ok(None),
        }
    }

    async fn key_for(&self, address: &str) -> Result<Option<PageKey>> {
        Ok(self.key_for_token(address).await?.map(|k| PageKey {
            prev_page: k.prev_page.map(|p| p as u32),
            next_page: k.next_page.map(|p| p as u32),
        }))
    }

    async fn oldest_key_created_at(&self) -> Result<Option<chrono::DateTime<Utc>>> {
        let oldest = token_remote_key::Entity::find()
            .order_by_asc(token_remote_key::Column::CreatedAt)
            .one(&self.db)
            .await?;
        Ok(oldest.map(|k| k.created_at))
    }

    async fn count(&self) -> Result<u64> {
        let count = token::Entity::find().count(&self.db).await?;
        Ok(count)
    }

    async fn delete_generations_before(&self, generation: i64) -> Result<u64> {
        let result = token::Entity::delete_many()
            .filter(token::Column::SyncGeneration.lt(generation))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl TokenReader for TokenRepository {
    /// Addresses are stored checksummed but callers hand over whatever
    /// case the RPC gave them, so the match is on the lowered column.
    async fn token_by_address(&self, address: &str) -> Result<Option<token::Model>> {
        let result = token::Entity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(token::Column::Address)))
                    .eq(address.to_lowercase()),
            )
            .one(&self.db)
            .await?;
        Ok(result)
    }
}
