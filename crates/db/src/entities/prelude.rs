//! Entity re-exports.

pub use super::tenant_ledger_locks::Entity as TenantLedgerLocks;
pub use super::tenant_ledgers::Entity as TenantLedgers;
