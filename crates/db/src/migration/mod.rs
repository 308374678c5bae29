//! Database migrations.
//!
//! Migrations are managed using sea-orm-migration.

pub use sea_orm_migration::prelude::*;

mod m20260110_000001_tenant_ledgers;
mod m20260110_000002_tenant_ledger_locks;

/// Migrator for running database migrations.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260110_000001_tenant_ledgers::Migration),
            Box::new(m20260110_000002_tenant_ledger_locks::Migration),
        ]
    }
}
