use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use crate::db::entity::purchase;
use crate::enums::PurchaseStatus;
use crate::error::Result;
use crate::services::purchase_service::{NewPurchase, PurchaseStore};

#[derive(Clone)]
pub struct PurchaseRepository {
    db: DatabaseConnection,
}

impl PurchaseRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Guarded status move: the filter on the current status makes the
    /// transition atomic, so two workers can never both win a claim.
    async fn transition(
        &self,
        tx_hash: &str,
        from: &[PurchaseStatus],
        to: PurchaseStatus,
        set_extra: impl FnOnce(sea_orm::UpdateMany<purchase::Entity>) -> sea_orm::UpdateMany<purchase::Entity>,
    ) -> Result<bool> {
        let allowed: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
        let update = purchase::Entity::update_many()
            .col_expr(purchase::Column::Status, Expr::value(to.as_str()))
            .col_expr(purchase::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(purchase::Column::TxHash.eq(tx_hash))
            .filter(purchase::Column::Status.is_in(allowed));

        let result = set_extra(update).exec(&self.db).await?;
        Ok(result.rows_affected == 1)
    }
}

#[async_trait]
impl PurchaseStore for PurchaseRepository {
    async fn insert(&self, new: NewPurchase) -> Result<purchase::Model> {
        let now = Utc::now();
        let model = purchase::ActiveModel {
            tx_hash: ActiveValue::Set(new.tx_hash),
            wallet_address: ActiveValue::Set(new.wallet_address),
            token_address: ActiveValue::Set(new.token_address),
            token_symbol: ActiveValue::Set(new.token_symbol),
            stable_address: ActiveValue::Set(new.stable_address),
            stable_symbol: ActiveValue::Set(new.stable_symbol),
            amount_in: ActiveValue::Set(new.amount_in),
            amount_out: ActiveValue::Set(new.amount_out),
            chain_id: ActiveValue::Set(new.chain_id),
            status: ActiveValue::Set(PurchaseStatus::Pending.as_str().to_string()),
            purchase_time: ActiveValue::Set(new.purchase_time),
            auto_sell_time: ActiveValue::Set(new.auto_sell_time),
            sell_tx_hash: ActiveValue::Set(None),
            worker_id: ActiveValue::Set(None),
            error_message: ActiveValue::Set(None),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };

        let inserted = purchase::Entity::insert(model)
            .exec_with_returning(&self.db)
            .await?;
        Ok(inserted)
    }

    async fn find(&self, tx_hash: &str) -> Result<Option<purchase::Model>> {
        let result = purchase::Entity::find_by_id(tx_hash.to_string())
            .one(&self.db)
            .await?;
        Ok(result)
    }

    async fn list_by_wallet(
        &self,
        wallet_address: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<purchase::Model>> {
        let results = purchase::Entity::find()
            .filter(purchase::Column::WalletAddress.eq(wallet_address))
            .order_by_desc(purchase::Column::PurchaseTime)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;
        Ok(results)
    }

    async fn pending_confirmations(&self) -> Result<Vec<purchase::Model>> {
        let results = purchase::Entity::find()
            .filter(purchase::Column::Status.eq(PurchaseStatus::Pending.as_str()))
            .order_by_asc(purchase::Column::PurchaseTime)
            .all(&self.db)
            .await?;
        Ok(results)
    }

    async fn due_auto_sells(&self, now: DateTime<Utc>) -> Result<Vec<purchase::Model>> {
        let results = purchase::Entity::find()
            .filter(purchase::Column::Status.eq(PurchaseStatus::Held.as_str()))
            .filter(purchase::Column::AutoSellTime.lte(now))
            .order_by_asc(purchase::Column::AutoSellTime)
            .all(&self.db)
            .await?;
        Ok(results)
    }

    async fn mark_held(&self, tx_hash: &str, amount_out: Option<String>) -> Result<bool> {
        self.transition(tx_hash, &[PurchaseStatus::Pending], PurchaseStatus::Held, |u| {
            match amount_out {
                Some(amount) => u.col_expr(purchase::Column::AmountOut, Expr::value(amount)),
                None => u,
            }
        })
        .await
    }

    async fn claim_for_sell(&self, tx_hash: &str, worker_id: Uuid) -> Result<bool> {
        self.transition(tx_hash, &[PurchaseStatus::Held], PurchaseStatus::Selling, |u| {
            u.col_expr(purchase::Column::WorkerId, Expr::value(worker_id))
        })
        .await
    }

    async fn release_claim(&self, tx_hash: &str, error: &str) -> Result<bool> {
        self.transition(tx_hash, &[PurchaseStatus::Selling], PurchaseStatus::Held, |u| {
            u.col_expr(purchase::Column::WorkerId, Expr::value(Option::<Uuid>::None))
                .col_expr(purchase::Column::ErrorMessage, Expr::value(error))
        })
        .await
    }

    async fn mark_sold(&self, tx_hash: &str, sell_tx_hash: &str) -> Result<bool> {
        self.transition(tx_hash, &[PurchaseStatus::Selling], PurchaseStatus::Sold, |u| {
            u.col_expr(purchase::Column::SellTxHash, Expr::value(sell_tx_hash))
        })
        .await
    }

    async fn cancel(&self, tx_hash: &str, reason: &str) -> Result<bool> {
        // A buy that reverted on-chain cancels from pending; a user request
        // cancels from held. Anything past held is committed to a sale.
        self.transition(
            tx_hash,
            &[PurchaseStatus::Pending, PurchaseStatus::Held],
            PurchaseStatus::Cancelled,
            |u| u.col_expr(purchase::Column::ErrorMessage, Expr::value(reason)),
        )
        .await
    }
}
