use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Purchases::Table)
                    .if_not_exists()
                    // A purchase is identified by its buy transaction hash
                    .col(ColumnDef::new(Purchases::TxHash).string().not_null().primary_key())
                    .col(ColumnDef::new(Purchases::WalletAddress).string().not_null())
                    .col(ColumnDef::new(Purchases::TokenAddress).string().not_null())
                    .col(ColumnDef::new(Purchases::TokenSymbol).string().not_null())
                    .col(ColumnDef::new(Purchases::StableAddress).string().not_null())
                    .col(ColumnDef::new(Purchases::StableSymbol).string().not_null())
                    .col(ColumnDef::new(Purchases::AmountIn).string().not_null())
                    .col(ColumnDef::new(Purchases::AmountOut).string().not_null())
                    .col(ColumnDef::new(Purchases::ChainId).big_integer().not_null())
                    .col(ColumnDef::new(Purchases::Status).string().not_null())
                    .col(
                        ColumnDef::new(Purchases::PurchaseTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Purchases::AutoSellTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Purchases::SellTxHash).string().null())
                    .col(ColumnDef::new(Purchases::WorkerId).uuid().null())
                    .col(ColumnDef::new(Purchases::ErrorMessage).string().null())
                    .col(
                        ColumnDef::new(Purchases::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Purchases::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Due-for-sale scan: status = 'held' AND auto_sell_time <= now
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_purchases_status_auto_sell_time")
                    .table(Purchases::Table)
                    .col(Purchases::Status)
                    .col(Purchases::AutoSellTime)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_purchases_wallet_address")
                    .table(Purchases::Table)
                    .col(Purchases::WalletAddress)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Purchases::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Purchases {
    Table,
    TxHash,
    WalletAddress,
    TokenAddress,
    TokenSymbol,
    StableAddress,
    StableSymbol,
    AmountIn,
    AmountOut,
    ChainId,
    Status,
    PurchaseTime,
    AutoSellTime,
    SellTxHash,
    WorkerId,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
}
