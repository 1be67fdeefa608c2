use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncJobs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SyncJobs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(SyncJobs::ChainName).string().not_null())
                    .col(ColumnDef::new(SyncJobs::Seq).integer().not_null())
                    .col(ColumnDef::new(SyncJobs::Kind).string().not_null())
                    .col(ColumnDef::new(SyncJobs::StartPage).integer().not_null())
                    .col(ColumnDef::new(SyncJobs::EndPage).integer().not_null())
                    .col(
                        ColumnDef::new(SyncJobs::Generation)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SyncJobs::Status).string().not_null())
                    .col(ColumnDef::new(SyncJobs::Attempts).integer().not_null().default(0))
                    .col(ColumnDef::new(SyncJobs::NextRunAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(SyncJobs::LastError).string().null())
                    .col(
                        ColumnDef::new(SyncJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SyncJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // One position per chain; keep-if-exists depends on this
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_sync_jobs_chain_seq")
                    .table(SyncJobs::Table)
                    .col(SyncJobs::ChainName)
                    .col(SyncJobs::Seq)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_sync_jobs_chain_status")
                    .table(SyncJobs::Table)
                    .col(SyncJobs::ChainName)
                    .col(SyncJobs::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SyncJobs {
    Table,
    Id,
    ChainName,
    Seq,
    Kind,
    StartPage,
    EndPage,
    Generation,
    Status,
    Attempts,
    NextRunAt,
    LastError,
    CreatedAt,
    UpdatedAt,
}
