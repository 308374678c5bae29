//! `SeaORM` entity definitions.

pub mod prelude;
pub mod tenant_ledger_locks;
pub mod tenant_ledgers;
