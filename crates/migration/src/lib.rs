pub use sea_orm_migration::prelude::*;

mod m20260820_000001_ledger_entries;
mod m20260820_000002_contra_entries;
mod m20260820_000003_closing_snapshots;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260820_000001_ledger_entries::Migration),
            Box::new(m20260820_000002_contra_entries::Migration),
            Box::new(m20260820_000003_closing_snapshots::Migration),
        ]
    }
}
