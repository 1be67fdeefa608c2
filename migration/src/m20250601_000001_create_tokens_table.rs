use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tokens::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tokens::Address).string().not_null().primary_key())
                    .col(ColumnDef::new(Tokens::Name).string().not_null())
                    .col(ColumnDef::new(Tokens::Symbol).string().not_null())
                    .col(ColumnDef::new(Tokens::Decimals).small_integer().not_null())
                    .col(
                        ColumnDef::new(Tokens::IsVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Tokens::IsWhitelisted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Tokens::IsHoneypot)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Tokens::HasTransferFee)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Tokens::Tax).decimal().null())
                    .col(ColumnDef::new(Tokens::TotalTvl).decimal().null())
                    .col(ColumnDef::new(Tokens::PoolCount).integer().not_null().default(0))
                    .col(ColumnDef::new(Tokens::Rank).integer().null())
                    .col(ColumnDef::new(Tokens::VolumeRank).integer().null())
                    .col(ColumnDef::new(Tokens::LogoUrl).string().null())
                    .col(
                        ColumnDef::new(Tokens::CachedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Tokens::SyncGeneration)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        // Rank ordering is the default list sort served to clients
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tokens_rank")
                    .table(Tokens::Table)
                    .col(Tokens::Rank)
                    .to_owned(),
            )
            .await?;

        // Stale-generation cleanup scans by generation
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tokens_sync_generation")
                    .table(Tokens::Table)
                    .col(Tokens::SyncGeneration)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tokens::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Tokens {
    Table,
    Address,
    Name,
    Symbol,
    Decimals,
    IsVerified,
    IsWhitelisted,
    IsHoneypot,
    HasTransferFee,
    Tax,
    TotalTvl,
    PoolCount,
    Rank,
    VolumeRank,
    LogoUrl,
    CachedAt,
    SyncGeneration,
}
