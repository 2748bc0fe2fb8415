pub use sea_orm_migration::prelude::*;

mod m20260101_000001_create_accounts_and_bots;
mod m20260101_000002_create_trades_and_signals;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_accounts_and_bots::Migration),
            Box::new(m20260101_000002_create_trades_and_signals::Migration),
        ]
    }
}
