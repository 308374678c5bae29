//! In-memory ledger store.
//!
//! Each tenant's book sits behind its own async mutex. A scope takes the lock
//! for its whole lifetime and works on a copy of the book, which replaces the
//! shared book only on commit.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tenantbook_shared::types::{LedgerEntryId, TenantId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::entry::{CanonicalKey, DateRange, EntryChanges, LedgerEntry, NewLedgerEntry};
use super::error::LedgerError;
use super::store::{LedgerScope, LedgerStore};

/// One tenant's entries with lookup indexes.
#[derive(Debug, Clone, Default)]
struct TenantBook {
    entries: BTreeMap<CanonicalKey, LedgerEntry>,
    keys: HashMap<LedgerEntryId, CanonicalKey>,
    references: HashMap<String, LedgerEntryId>,
}

impl TenantBook {
    fn entry_mut(&mut self, id: LedgerEntryId) -> Result<&mut LedgerEntry, LedgerError> {
        let key = self.keys.get(&id).ok_or(LedgerError::EntryNotFound(id))?;
        self.entries
            .get_mut(key)
            .ok_or(LedgerError::EntryNotFound(id))
    }

    fn remove(&mut self, id: LedgerEntryId) -> Result<LedgerEntry, LedgerError> {
        let key = self.keys.remove(&id).ok_or(LedgerError::EntryNotFound(id))?;
        let entry = self
            .entries
            .remove(&key)
            .ok_or(LedgerError::EntryNotFound(id))?;
        if let Some(reference_no) = &entry.reference_no {
            self.references.remove(reference_no);
        }
        Ok(entry)
    }

    fn put(&mut self, entry: LedgerEntry) {
        let key = entry.key();
        self.keys.insert(entry.id, key);
        if let Some(reference_no) = &entry.reference_no {
            self.references.insert(reference_no.clone(), entry.id);
        }
        self.entries.insert(key, entry);
    }
}

/// Ledger store backed by process memory.
///
/// Ids come from one counter shared by all tenants, so they increase in
/// insertion order like a database sequence.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    books: Arc<DashMap<TenantId, Arc<Mutex<TenantBook>>>>,
    next_id: Arc<AtomicI64>,
}

impl MemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn book(&self, tenant_id: TenantId) -> Arc<Mutex<TenantBook>> {
        Arc::clone(self.books.entry(tenant_id).or_default().value())
    }
}

impl LedgerStore for MemoryLedgerStore {
    type Scope = MemoryLedgerScope;

    async fn begin(&self, tenant_id: TenantId) -> Result<Self::Scope, LedgerError> {
        let guard = self.book(tenant_id).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryLedgerScope {
            tenant_id,
            guard,
            working,
            next_id: Arc::clone(&self.next_id),
        })
    }

    /// Tenants holding at least one committed entry.
    ///
    /// Reads register an empty book, so emptiness is checked under each
    /// book's lock and waits for any open scope on that tenant.
    async fn tenant_ids(&self) -> Result<Vec<TenantId>, LedgerError> {
        let books: Vec<(TenantId, Arc<Mutex<TenantBook>>)> = self
            .books
            .iter()
            .map(|item| (*item.key(), Arc::clone(item.value())))
            .collect();

        let mut ids = Vec::with_capacity(books.len());
        for (tenant_id, book) in books {
            if !book.lock().await.entries.is_empty() {
                ids.push(tenant_id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Unit of work over one tenant of a [`MemoryLedgerStore`].
#[derive(Debug)]
pub struct MemoryLedgerScope {
    tenant_id: TenantId,
    guard: OwnedMutexGuard<TenantBook>,
    working: TenantBook,
    next_id: Arc<AtomicI64>,
}

impl LedgerScope for MemoryLedgerScope {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    async fn insert(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, LedgerError> {
        if let Some(reference_no) = &entry.reference_no
            && self.working.references.contains_key(reference_no)
        {
            return Err(LedgerError::DuplicateReference {
                tenant_id: self.tenant_id,
                reference_no: reference_no.clone(),
            });
        }

        let id = LedgerEntryId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let now = Utc::now();
        let stored = LedgerEntry {
            id,
            tenant_id: self.tenant_id,
            transaction_date: entry.transaction_date,
            posting: entry.posting,
            balance: Decimal::ZERO,
            reference_no: entry.reference_no,
            category: entry.category,
            description: entry.description,
            payment_method: entry.payment_method,
            transfer_reference_no: entry.transfer_reference_no,
            remarks: entry.remarks,
            created_by: entry.created_by,
            created_at: now,
            updated_at: now,
        };
        self.working.put(stored.clone());
        Ok(stored)
    }

    async fn update(
        &mut self,
        id: LedgerEntryId,
        changes: &EntryChanges,
    ) -> Result<LedgerEntry, LedgerError> {
        let mut entry = self.working.remove(id)?;
        changes.apply(&mut entry, Utc::now());
        self.working.put(entry.clone());
        Ok(entry)
    }

    async fn set_balance(&mut self, id: LedgerEntryId, balance: Decimal) -> Result<(), LedgerError> {
        self.working.entry_mut(id)?.balance = balance;
        Ok(())
    }

    async fn delete(&mut self, id: LedgerEntryId) -> Result<LedgerEntry, LedgerError> {
        self.working.remove(id)
    }

    async fn get(&self, id: LedgerEntryId) -> Result<Option<LedgerEntry>, LedgerError> {
        Ok(self
            .working
            .keys
            .get(&id)
            .and_then(|key| self.working.entries.get(key))
            .cloned())
    }

    async fn find_by_reference(&self, reference_no: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        match self.working.references.get(reference_no) {
            Some(id) => self.get(*id).await,
            None => Ok(None),
        }
    }

    async fn list(&self, range: Option<DateRange>) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self
            .working
            .entries
            .values()
            .filter(|entry| range.is_none_or(|range| range.contains(entry.transaction_date)))
            .cloned()
            .collect())
    }

    async fn last_before(&self, key: CanonicalKey) -> Result<Option<LedgerEntry>, LedgerError> {
        Ok(self
            .working
            .entries
            .range(..key)
            .next_back()
            .map(|(_, entry)| entry.clone()))
    }

    async fn list_from(&self, key: CanonicalKey) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self
            .working
            .entries
            .range(key..)
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn commit(self) -> Result<(), LedgerError> {
        let Self {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::entry::Posting;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    fn invoice(reference_no: &str, day: u32, amount: Decimal) -> NewLedgerEntry {
        NewLedgerEntry::new(
            date(1, day),
            Posting::debit(amount).unwrap(),
            format!("Invoice {reference_no}"),
            "System",
        )
        .with_reference(reference_no)
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let store = MemoryLedgerStore::new();
        let mut scope = store.begin(TenantId::new()).await.unwrap();

        let first = scope.insert(invoice("A", 5, dec!(100))).await.unwrap();
        let second = scope.insert(invoice("B", 1, dec!(100))).await.unwrap();
        assert!(first.id < second.id);
        assert_eq!(first.balance, dec!(0));
    }

    #[tokio::test]
    async fn test_list_is_canonical() {
        let store = MemoryLedgerStore::new();
        let mut scope = store.begin(TenantId::new()).await.unwrap();
        scope.insert(invoice("C", 10, dec!(1))).await.unwrap();
        scope.insert(invoice("A", 1, dec!(1))).await.unwrap();
        scope.insert(invoice("B", 1, dec!(1))).await.unwrap();

        let refs: Vec<String> = scope
            .list(None)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|e| e.reference_no)
            .collect();
        assert_eq!(refs, vec!["A", "B", "C"]);

        let ranged = scope
            .list(Some(DateRange::between(date(1, 2), date(1, 31))))
            .await
            .unwrap();
        assert_eq!(ranged.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_reference_rejected() {
        let store = MemoryLedgerStore::new();
        let tenant_id = TenantId::new();
        let mut scope = store.begin(tenant_id).await.unwrap();
        scope.insert(invoice("INV-1", 1, dec!(100))).await.unwrap();

        let err = scope.insert(invoice("INV-1", 2, dec!(200))).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::DuplicateReference {
                tenant_id,
                reference_no: "INV-1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_references_are_scoped_per_tenant() {
        let store = MemoryLedgerStore::new();
        let mut first = store.begin(TenantId::new()).await.unwrap();
        first.insert(invoice("INV-1", 1, dec!(100))).await.unwrap();
        first.commit().await.unwrap();

        let mut second = store.begin(TenantId::new()).await.unwrap();
        assert!(second.find_by_reference("INV-1").await.unwrap().is_none());
        assert!(second.insert(invoice("INV-1", 1, dec!(100))).await.is_ok());
    }

    #[tokio::test]
    async fn test_neighbours_by_position() {
        let store = MemoryLedgerStore::new();
        let mut scope = store.begin(TenantId::new()).await.unwrap();
        let a = scope.insert(invoice("A", 1, dec!(1))).await.unwrap();
        let b = scope.insert(invoice("B", 5, dec!(1))).await.unwrap();
        let c = scope.insert(invoice("C", 10, dec!(1))).await.unwrap();

        let before_b = scope.last_before(b.key()).await.unwrap().unwrap();
        assert_eq!(before_b.id, a.id);
        assert!(scope.last_before(a.key()).await.unwrap().is_none());

        let from_b: Vec<_> = scope
            .list_from(b.key())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(from_b, vec![b.id, c.id]);
    }

    #[tokio::test]
    async fn test_update_moves_entry_and_keeps_reference() {
        let store = MemoryLedgerStore::new();
        let mut scope = store.begin(TenantId::new()).await.unwrap();
        let a = scope.insert(invoice("A", 10, dec!(1))).await.unwrap();
        scope.insert(invoice("B", 5, dec!(1))).await.unwrap();

        let changes = EntryChanges {
            transaction_date: Some(date(1, 1)),
            ..EntryChanges::default()
        };
        scope.update(a.id, &changes).await.unwrap();

        let first = scope.list(None).await.unwrap().remove(0);
        assert_eq!(first.id, a.id);
        assert_eq!(scope.find_by_reference("A").await.unwrap().unwrap().id, a.id);
    }

    #[tokio::test]
    async fn test_delete_frees_reference() {
        let store = MemoryLedgerStore::new();
        let mut scope = store.begin(TenantId::new()).await.unwrap();
        let a = scope.insert(invoice("A", 1, dec!(1))).await.unwrap();

        let removed = scope.delete(a.id).await.unwrap();
        assert_eq!(removed.id, a.id);
        assert!(scope.find_by_reference("A").await.unwrap().is_none());
        assert!(matches!(
            scope.delete(a.id).await,
            Err(LedgerError::EntryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemoryLedgerStore::new();
        let tenant_id = TenantId::new();

        let mut scope = store.begin(tenant_id).await.unwrap();
        scope.insert(invoice("A", 1, dec!(1))).await.unwrap();
        scope.rollback().await.unwrap();

        let mut scope = store.begin(tenant_id).await.unwrap();
        assert!(scope.list(None).await.unwrap().is_empty());
        scope.insert(invoice("A", 1, dec!(1))).await.unwrap();
        drop(scope);

        let scope = store.begin(tenant_id).await.unwrap();
        assert!(scope.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_persists_writes() {
        let store = MemoryLedgerStore::new();
        let tenant_id = TenantId::new();

        let mut scope = store.begin(tenant_id).await.unwrap();
        let a = scope.insert(invoice("A", 1, dec!(1))).await.unwrap();
        scope.set_balance(a.id, dec!(1)).await.unwrap();
        scope.commit().await.unwrap();

        let scope = store.begin(tenant_id).await.unwrap();
        let stored = scope.get(a.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, dec!(1));
        scope.rollback().await.unwrap();
        assert_eq!(store.tenant_ids().await.unwrap(), vec![tenant_id]);
    }

    #[tokio::test]
    async fn test_tenant_ids_skip_empty_books() {
        let store = MemoryLedgerStore::new();
        let stored = TenantId::new();

        // Reads and rolled-back writes leave no tenant behind.
        let scope = store.begin(TenantId::new()).await.unwrap();
        assert!(scope.list(None).await.unwrap().is_empty());
        scope.rollback().await.unwrap();
        let mut scope = store.begin(TenantId::new()).await.unwrap();
        scope.insert(invoice("A", 1, dec!(1))).await.unwrap();
        scope.rollback().await.unwrap();
        assert!(store.tenant_ids().await.unwrap().is_empty());

        let mut scope = store.begin(stored).await.unwrap();
        scope.insert(invoice("B", 2, dec!(5))).await.unwrap();
        scope.commit().await.unwrap();

        let emptied = TenantId::new();
        let mut scope = store.begin(emptied).await.unwrap();
        let c = scope.insert(invoice("C", 3, dec!(7))).await.unwrap();
        scope.commit().await.unwrap();
        let mut scope = store.begin(emptied).await.unwrap();
        scope.delete(c.id).await.unwrap();
        scope.commit().await.unwrap();

        assert_eq!(store.tenant_ids().await.unwrap(), vec![stored]);
    }

    #[tokio::test]
    async fn test_scope_serializes_same_tenant() {
        let store = MemoryLedgerStore::new();
        let tenant_id = TenantId::new();

        let held = store.begin(tenant_id).await.unwrap();
        let waiting = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            store.begin(tenant_id),
        )
        .await;
        assert!(waiting.is_err(), "second scope must wait for the first");

        let other = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            store.begin(TenantId::new()),
        )
        .await;
        assert!(other.is_ok(), "other tenants proceed in parallel");

        drop(held);
        assert!(store.begin(tenant_id).await.is_ok());
    }
}
