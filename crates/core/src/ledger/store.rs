//! Persistence seam for tenant ledgers.
//!
//! All access goes through a [`LedgerScope`]: a unit of work bound to one
//! tenant that holds that tenant's lock until it is committed or rolled back.
//! Dropping a scope without committing discards its writes.

use std::future::Future;

use rust_decimal::Decimal;
use tenantbook_shared::types::{LedgerEntryId, TenantId};

use super::entry::{CanonicalKey, DateRange, EntryChanges, LedgerEntry, NewLedgerEntry};
use super::error::LedgerError;

/// Store trait for tenant ledgers.
///
/// Implemented in memory by [`super::MemoryLedgerStore`] and on PostgreSQL by
/// the db crate.
pub trait LedgerStore: Send + Sync {
    /// Unit of work type.
    type Scope: LedgerScope;

    /// Opens a unit of work for a tenant, waiting for any other unit of work
    /// on the same tenant to finish.
    fn begin(
        &self,
        tenant_id: TenantId,
    ) -> impl Future<Output = Result<Self::Scope, LedgerError>> + Send;

    /// Lists every tenant with at least one committed entry, in ascending order.
    fn tenant_ids(&self) -> impl Future<Output = Result<Vec<TenantId>, LedgerError>> + Send;
}

/// A serialized unit of work over one tenant's entries.
pub trait LedgerScope: Send + Sync {
    /// Tenant this scope is bound to.
    fn tenant_id(&self) -> TenantId;

    /// Inserts an entry with a zero balance and assigns its id.
    ///
    /// Returns [`LedgerError::DuplicateReference`] if the tenant already has an
    /// entry with the same reference number. The caller is responsible for
    /// recomputing balances afterwards.
    fn insert(
        &mut self,
        entry: NewLedgerEntry,
    ) -> impl Future<Output = Result<LedgerEntry, LedgerError>> + Send;

    /// Applies field changes to an entry. The balance column is not touched.
    fn update(
        &mut self,
        id: LedgerEntryId,
        changes: &EntryChanges,
    ) -> impl Future<Output = Result<LedgerEntry, LedgerError>> + Send;

    /// Overwrites the running balance of an entry.
    fn set_balance(
        &mut self,
        id: LedgerEntryId,
        balance: Decimal,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;

    /// Deletes an entry and returns it.
    fn delete(
        &mut self,
        id: LedgerEntryId,
    ) -> impl Future<Output = Result<LedgerEntry, LedgerError>> + Send;

    /// Finds an entry by id.
    fn get(
        &self,
        id: LedgerEntryId,
    ) -> impl Future<Output = Result<Option<LedgerEntry>, LedgerError>> + Send;

    /// Finds the entry linked to a document reference.
    fn find_by_reference(
        &self,
        reference_no: &str,
    ) -> impl Future<Output = Result<Option<LedgerEntry>, LedgerError>> + Send;

    /// Lists entries in canonical order, optionally limited to a date range.
    fn list(
        &self,
        range: Option<DateRange>,
    ) -> impl Future<Output = Result<Vec<LedgerEntry>, LedgerError>> + Send;

    /// Latest entry strictly before a position in canonical order.
    fn last_before(
        &self,
        key: CanonicalKey,
    ) -> impl Future<Output = Result<Option<LedgerEntry>, LedgerError>> + Send;

    /// Entries at or after a position, in canonical order.
    fn list_from(
        &self,
        key: CanonicalKey,
    ) -> impl Future<Output = Result<Vec<LedgerEntry>, LedgerError>> + Send;

    /// Makes the unit of work durable and releases the tenant lock.
    fn commit(self) -> impl Future<Output = Result<(), LedgerError>> + Send
    where
        Self: Sized;

    /// Discards the unit of work and releases the tenant lock.
    fn rollback(self) -> impl Future<Output = Result<(), LedgerError>> + Send
    where
        Self: Sized;
}
