use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use uuid::Uuid;

use crate::db::entity::sync_job;
use crate::enums::SyncJobStatus;
use crate::error::Result;
use crate::sync::batches::{ChainProgress, JobQueue, JobSpec};

#[derive(Clone)]
pub struct SyncJobRepository {
    db: DatabaseConnection,
}

impl SyncJobRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn guarded_update(
        &self,
        id: Uuid,
        from: SyncJobStatus,
        to: SyncJobStatus,
        set_extra: impl FnOnce(sea_orm::UpdateMany<sync_job::Entity>) -> sea_orm::UpdateMany<sync_job::Entity>,
    ) -> Result<bool> {
        let update = sync_job::Entity::update_many()
            .col_expr(sync_job::Column::Status, Expr::value(to.as_str()))
            .col_expr(sync_job::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(sync_job::Column::Id.eq(id))
            .filter(sync_job::Column::Status.eq(from.as_str()));

        let result = set_extra(update).exec(&self.db).await?;
        Ok(result.rows_affected == 1)
    }
}

#[async_trait]
impl JobQueue for SyncJobRepository {
    async fn chain_active(&self, chain_name: &str) -> Result<bool> {
        let count = sync_job::Entity::find()
            .filter(sync_job::Column::ChainName.eq(chain_name))
            .filter(
                sync_job::Column::Status.is_in([
                    SyncJobStatus::Queued.as_str(),
                    SyncJobStatus::Running.as_str(),
                ]),
            )
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    /// Enqueue a fresh chain under `chain_name`, unless one is still live.
    /// A live chain is kept untouched and `false` is returned; finished or
    /// dead chains under the same name are swept out first.
    async fn enqueue_chain(
        &self,
        chain_name: &str,
        generation: i64,
        specs: &[JobSpec],
    ) -> Result<bool> {
        let txn = self.db.begin().await?;

        let live = sync_job::Entity::find()
            .filter(sync_job::Column::ChainName.eq(chain_name))
            .filter(
                sync_job::Column::Status.is_in([
                    SyncJobStatus::Queued.as_str(),
                    SyncJobStatus::Running.as_str(),
                ]),
            )
            .count(&txn)
            .await?;

        if live > 0 {
            txn.rollback().await?;
            return Ok(false);
        }

        sync_job::Entity::delete_many()
            .filter(sync_job::Column::ChainName.eq(chain_name))
            .exec(&txn)
            .await?;

        if !specs.is_empty() {
            let now = Utc::now();
            let models: Vec<sync_job::ActiveModel> = specs
                .iter()
                .map(|spec| sync_job::ActiveModel {
                    id: ActiveValue::Set(Uuid::new_v4()),
                    chain_name: ActiveValue::Set(chain_name.to_string()),
                    seq: ActiveValue::Set(spec.seq),
                    kind: ActiveValue::Set(spec.kind.as_str().to_string()),
                    start_page: ActiveValue::Set(spec.start_page as i32),
                    end_page: ActiveValue::Set(spec.end_page as i32),
                    generation: ActiveValue::Set(generation),
                    status: ActiveValue::Set(SyncJobStatus::Queued.as_str().to_string()),
                    attempts: ActiveValue::Set(0),
                    next_run_at: ActiveValue::Set(None),
                    last_error: ActiveValue::Set(None),
                    created_at: ActiveValue::Set(now),
                    updated_at: ActiveValue::Set(now),
                })
                .collect();

            sync_job::Entity::insert_many(models)
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(true)
    }

    /// Head-of-chain dispatch: jobs run strictly in `seq` order, so the only
    /// candidate is the lowest unfinished seq. It runs when queued and past
    /// its backoff window; a terminally failed head stalls the chain.
    async fn next_runnable(
        &self,
        chain_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<sync_job::Model>> {
        let head = sync_job::Entity::find()
            .filter(sync_job::Column::ChainName.eq(chain_name))
            .filter(sync_job::Column::Status.ne(SyncJobStatus::Succeeded.as_str()))
            .order_by_asc(sync_job::Column::Seq)
            .one(&self.db)
            .await?;

        match head {
            Some(job)
                if job.status == SyncJobStatus::Queued.as_str()
                    && job.next_run_at.map_or(true, |at| at <= now) =>
            {
                Ok(Some(job))
            }
            _ => Ok(None),
        }
    }

    async fn mark_running(&self, id: Uuid) -> Result<bool> {
        self.guarded_update(id, SyncJobStatus::Queued, SyncJobStatus::Running, |u| u)
            .await
    }

    async fn mark_succeeded(&self, id: Uuid) -> Result<bool> {
        self.guarded_update(id, SyncJobStatus::Running, SyncJobStatus::Succeeded, |u| u)
            .await
    }

    async fn mark_retry(&self, id: Uuid, error: &str, retry_at: DateTime<Utc>) -> Result<bool> {
        self.guarded_update(id, SyncJobStatus::Running, SyncJobStatus::Queued, |u| {
            u.col_expr(
                sync_job::Column::Attempts,
                Expr::col(sync_job::Column::Attempts).add(1),
            )
            .col_expr(sync_job::Column::NextRunAt, Expr::value(retry_at))
            .col_expr(sync_job::Column::LastError, Expr::value(error))
        })
        .await
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<bool> {
        self.guarded_update(id, SyncJobStatus::Running, SyncJobStatus::Failed, |u| {
            u.col_expr(
                sync_job::Column::Attempts,
                Expr::col(sync_job::Column::Attempts).add(1),
            )
            .col_expr(sync_job::Column::LastError, Expr::value(error))
        })
        .await
    }

    /// Marks every live job of the chain cancelled. Guarded completion
    /// writes make sure a cancelled job can never flip back to succeeded.
    async fn cancel_chain(&self, chain_name: &str) -> Result<u64> {
        let result = sync_job::Entity::update_many()
            .col_expr(
                sync_job::Column::Status,
                Expr::value(SyncJobStatus::Cancelled.as_str()),
            )
            .col_expr(sync_job::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(sync_job::Column::ChainName.eq(chain_name))
            .filter(
                sync_job::Column::Status.is_in([
                    SyncJobStatus::Queued.as_str(),
                    SyncJobStatus::Running.as_str(),
                ]),
            )
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Jobs left `running` by a crash are requeued for immediate pickup.
    async fn recover_orphans(&self) -> Result<u64> {
        let result = sync_job::Entity::update_many()
            .col_expr(
                sync_job::Column::Status,
                Expr::value(SyncJobStatus::Queued.as_str()),
            )
            .col_expr(sync_job::Column::NextRunAt, Expr::value(Option::<DateTime<Utc>>::None))
            .col_expr(sync_job::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(sync_job::Column::Status.eq(SyncJobStatus::Running.as_str()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn chain_progress(&self, chain_name: &str) -> Result<ChainProgress> {
        let jobs = sync_job::Entity::find()
            .filter(sync_job::Column::ChainName.eq(chain_name))
            .all(&self.db)
            .await?;

        let mut progress = ChainProgress::default();
        for job in &jobs {
            progress.total += 1;
            match job.status.parse::<SyncJobStatus>() {
                Ok(SyncJobStatus::Queued) => progress.queued += 1,
                Ok(SyncJobStatus::Running) => progress.running += 1,
                Ok(SyncJobStatus::Succeeded) => progress.succeeded += 1,
                Ok(SyncJobStatus::Cancelled) => progress.cancelled += 1,
                Ok(SyncJobStatus::Failed) | Err(_) => progress.failed += 1,
            }
        }
        Ok(progress)
    }
}
