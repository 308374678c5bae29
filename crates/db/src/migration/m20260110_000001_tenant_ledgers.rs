//! Tenant ledger table.
//!
//! Balances are stored per row and rewritten by the recompute engine, so the
//! canonical `(tenant_id, transaction_date, id)` index backs every walk.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(TENANT_LEDGERS_SQL).await?;
        db.execute_unprepared(INDEXES_SQL).await?;
        db.execute_unprepared(UPDATED_AT_TRIGGER_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const TENANT_LEDGERS_SQL: &str = r"
CREATE TABLE tenant_ledgers (
    id BIGSERIAL PRIMARY KEY,
    tenant_id UUID NOT NULL,
    transaction_date DATE NOT NULL,
    debit_amount NUMERIC(15, 2) NOT NULL DEFAULT 0,
    credit_amount NUMERIC(15, 2) NOT NULL DEFAULT 0,
    balance NUMERIC(15, 2) NOT NULL DEFAULT 0,
    reference_no VARCHAR(255),
    category VARCHAR(32) NOT NULL DEFAULT 'other',
    description VARCHAR(255) NOT NULL,
    payment_method VARCHAR(255),
    transfer_reference_no VARCHAR(255),
    remarks TEXT,
    created_by VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_tl_debit_or_credit CHECK (
        (debit_amount > 0 AND credit_amount = 0) OR (debit_amount = 0 AND credit_amount > 0)
    ),
    CONSTRAINT chk_tl_category CHECK (
        category IN ('rent', 'rent_payment', 'maintenance', 'security_deposit', 'other')
    ),
    CONSTRAINT chk_tl_reference_not_blank CHECK (
        reference_no IS NULL OR length(trim(reference_no)) > 0
    )
);
";

const INDEXES_SQL: &str = r"
CREATE UNIQUE INDEX uq_tl_tenant_reference
    ON tenant_ledgers(tenant_id, reference_no)
    WHERE reference_no IS NOT NULL;
CREATE INDEX idx_tl_canonical ON tenant_ledgers(tenant_id, transaction_date, id);
CREATE INDEX idx_tl_category ON tenant_ledgers(tenant_id, category);
";

const UPDATED_AT_TRIGGER_SQL: &str = r"
CREATE OR REPLACE FUNCTION tenant_ledgers_touch_updated_at()
RETURNS TRIGGER AS $$
BEGIN
    IF ROW(NEW.transaction_date, NEW.debit_amount, NEW.credit_amount, NEW.description,
           NEW.remarks, NEW.payment_method, NEW.transfer_reference_no)
       IS DISTINCT FROM
       ROW(OLD.transaction_date, OLD.debit_amount, OLD.credit_amount, OLD.description,
           OLD.remarks, OLD.payment_method, OLD.transfer_reference_no) THEN
        NEW.updated_at = now();
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_tl_updated_at
    BEFORE UPDATE ON tenant_ledgers
    FOR EACH ROW EXECUTE FUNCTION tenant_ledgers_touch_updated_at();
";

const DROP_SQL: &str = r"
DROP TRIGGER IF EXISTS trg_tl_updated_at ON tenant_ledgers;
DROP FUNCTION IF EXISTS tenant_ledgers_touch_updated_at();
DROP TABLE IF EXISTS tenant_ledgers;
";
