pub use sea_orm_migration::prelude::*;

mod m20250601_000001_create_tokens_table;
mod m20250601_000002_create_token_remote_keys_table;
mod m20250602_000001_create_purchases_table;
mod m20250603_000001_create_sync_jobs_table;
mod m20250603_000002_create_sync_state_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_tokens_table::Migration),
            Box::new(m20250601_000002_create_token_remote_keys_table::Migration),
            Box::new(m20250602_000001_create_purchases_table::Migration),
            Box::new(m20250603_000001_create_sync_jobs_table::Migration),
            Box::new(m20250603_000002_create_sync_state_table::Migration),
        ]
    }
}
