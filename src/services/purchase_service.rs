use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::entity::purchase;
use crate::enums::PurchaseStatus;
use crate::error::{AppError, Result};

/// Row-creation payload. Status always starts at `pending`; the caller has
/// already resolved the auto-sell time from the hold window.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub tx_hash: String,
    pub wallet_address: String,
    pub token_address: String,
    pub token_symbol: String,
    pub stable_address: String,
    pub stable_symbol: String,
    pub amount_in: String,
    pub amount_out: String,
    pub chain_id: i64,
    pub purchase_time: DateTime<Utc>,
    pub auto_sell_time: DateTime<Utc>,
}

/// Persistence seam for the purchase lifecycle. Every transition is a
/// status-guarded update; the returned bool says whether the guard matched,
/// so racing workers can tell who won a claim.
#[async_trait]
pub trait PurchaseStore: Send + Sync {
    async fn insert(&self, new: NewPurchase) -> Result<purchase::Model>;

    async fn find(&self, tx_hash: &str) -> Result<Option<purchase::Model>>;

    async fn list_by_wallet(
        &self,
        wallet_address: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<purchase::Model>>;

    /// Rows whose buy transaction has not been confirmed yet.
    async fn pending_confirmations(&self) -> Result<Vec<purchase::Model>>;

    /// Held rows whose auto-sell time has passed.
    async fn due_auto_sells(&self, now: DateTime<Utc>) -> Result<Vec<purchase::Model>>;

    /// pending -> held, recording the confirmed output amount when known.
    async fn mark_held(&self, tx_hash: &str, amount_out: Option<String>) -> Result<bool>;

    /// held -> selling, stamping the claiming worker. At most one caller wins.
    async fn claim_for_sell(&self, tx_hash: &str, worker_id: Uuid) -> Result<bool>;

    /// selling -> held after a failed sell, so the next tick retries it.
    async fn release_claim(&self, tx_hash: &str, error: &str) -> Result<bool>;

    /// selling -> sold with the sell transaction hash.
    async fn mark_sold(&self, tx_hash: &str, sell_tx_hash: &str) -> Result<bool>;

    /// pending|held -> cancelled (reverted buy, or user request).
    async fn cancel(&self, tx_hash: &str, reason: &str) -> Result<bool>;
}

// ── Service ─────────────────────────────────────────────────────────

/// Read/cancel surface over the purchase store, used by the API handlers.
/// The workers talk to the store directly.
#[derive(Clone)]
pub struct PurchaseService {
    store: Arc<dyn PurchaseStore>,
}

impl PurchaseService {
    pub fn new(store: Arc<dyn PurchaseStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, tx_hash: &str) -> Result<purchase::Model> {
        self.store
            .find(tx_hash)
            .await?
            .ok_or(AppError::PurchaseNotFound)
    }

    pub async fn list_for_wallet(
        &self,
        wallet_address: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<purchase::Model>> {
        self.store.list_by_wallet(wallet_address, limit, offset).await
    }

    /// User-requested cancel. Only rows that have not started selling can
    /// still be cancelled; a row claimed mid-request loses gracefully.
    pub async fn cancel(&self, tx_hash: &str) -> Result<purchase::Model> {
        let row = self.get(tx_hash).await?;
        let status: PurchaseStatus = row.status.parse()?;
        if !status.can_transition(PurchaseStatus::Cancelled) {
            return Err(AppError::InvalidInput(format!(
                "Cannot cancel a purchase in status {}",
                status
            )));
        }

        let cancelled = self.store.cancel(tx_hash, "Cancelled by user").await?;
        if !cancelled {
            return Err(AppError::InvalidInput(
                "Purchase changed state, refresh and try again".to_string(),
            ));
        }
        self.get(tx_hash).await
    }
}

// ── In-memory store for tests ───────────────────────────────────────
