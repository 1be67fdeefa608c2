use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::catalog::CatalogToken;
use crate::error::Result;

/// Paging bookkeeping kept per cached token: the catalog pages before and
/// after the page the token arrived on. `None` marks the end of the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageKey {
    pub prev_page: Option<u32>,
    pub next_page: Option<u32>,
}

/// Write side of the token cache, shared by the sync pipeline and the
/// remote mediator.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Bulk upsert outside any paging context (sync pipeline writes).
    /// Returns the number of rows written.
    async fn upsert_batch(&self, tokens: &[CatalogToken], generation: i64) -> Result<u64>;

    /// Clears the cache AND the remote keys, then inserts the given page,
    /// all in one transaction. Used by a mediator refresh.
    async fn replace_all(
        &self,
        tokens: &[CatalogToken],
        prev_page: Option<u32>,
        next_page: Option<u32>,
        generation: i64,
    ) -> Result<()>;

    /// Upserts one page plus its remote keys in a single transaction.
    async fn insert_page(
        &self,
        tokens: &[CatalogToken],
        prev_page: Option<u32>,
        next_page: Option<u32>,
        generation: i64,
    ) -> Result<()>;

    /// Remote key of the first cached token in list order.
    async fn first_page_key(&self) -> Result<Option<PageKey>>;

    /// Remote key of the last cached token in list order.
    async fn last_page_key(&self) -> Result<Option<PageKey>>;

    async fn key_for(&self, address: &str) -> Result<Option<PageKey>>;

    /// Age probe for the mediator's initial-refresh decision.
    async fn oldest_key_created_at(&self) -> Result<Option<DateTime<Utc>>>;

    async fn count(&self) -> Result<u64>;

    /// Reaps cache rows tagged with a sync generation before `generation`.
    async fn delete_generations_before(&self, generation: i64) -> Result<u64>;
}
