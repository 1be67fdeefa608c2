use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TokenRemoteKeys::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TokenRemoteKeys::TokenAddress)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TokenRemoteKeys::PrevPage).integer().null())
                    .col(ColumnDef::new(TokenRemoteKeys::NextPage).integer().null())
                    .col(
                        ColumnDef::new(TokenRemoteKeys::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TokenRemoteKeys::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TokenRemoteKeys {
    Table,
    TokenAddress,
    PrevPage,
    NextPage,
    CreatedAt,
}
