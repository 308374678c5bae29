//! Per-tenant lock rows.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(LOCKS_SQL).await?;
        // Tenants that already have entries get their lock row up front.
        db.execute_unprepared(BACKFILL_LOCKS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS tenant_ledger_locks;")
            .await?;
        Ok(())
    }
}

const LOCKS_SQL: &str = r"
CREATE TABLE tenant_ledger_locks (
    tenant_id UUID PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const BACKFILL_LOCKS_SQL: &str = r"
INSERT INTO tenant_ledger_locks (tenant_id)
SELECT DISTINCT tenant_id FROM tenant_ledgers
ON CONFLICT (tenant_id) DO NOTHING;
";
