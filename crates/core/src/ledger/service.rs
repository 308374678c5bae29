//! Ledger service: balances, listings, manual entries and recalculation.
//!
//! Every call runs in its own unit of work on the tenant. Reads roll back;
//! writes commit only after the running balances have been settled.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tenantbook_shared::LedgerConfig;
use tenantbook_shared::types::{LedgerEntryId, PageRequest, PageResponse, TenantId};
use tracing::{info, warn};

use super::balance::{BalanceSummary, BalanceUpdate, checked_total};
use super::entry::{
    CanonicalKey, DateRange, EntryCategory, EntryChanges, LedgerEntry, NewLedgerEntry, Posting,
};
use super::error::LedgerError;
use super::filter::{LedgerFilter, LedgerSummary};
use super::recompute::RecomputeEngine;
use super::store::{LedgerScope, LedgerStore};

/// Input for an entry recorded by hand.
///
/// Amounts arrive as two columns; exactly one must be positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualEntryInput {
    /// Business date.
    pub transaction_date: NaiveDate,
    /// Debit column.
    #[serde(default)]
    pub debit_amount: Decimal,
    /// Credit column.
    #[serde(default)]
    pub credit_amount: Decimal,
    /// Description.
    pub description: String,
    /// Optional reference number.
    pub reference_no: Option<String>,
    /// Category, `other` if omitted.
    pub category: Option<EntryCategory>,
    /// Payment method.
    pub payment_method: Option<String>,
    /// Transfer reference.
    pub transfer_reference_no: Option<String>,
    /// Remarks.
    pub remarks: Option<String>,
}

impl ManualEntryInput {
    /// Converts the input into an insertable entry.
    ///
    /// # Errors
    ///
    /// Returns an error unless exactly one amount column is positive.
    pub fn into_new_entry(self, created_by: &str) -> Result<NewLedgerEntry, LedgerError> {
        if self.debit_amount.is_sign_negative() || self.credit_amount.is_sign_negative() {
            return Err(LedgerError::InvalidPosting {
                debit: self.debit_amount,
                credit: self.credit_amount,
            });
        }
        let posting = Posting::from_columns(self.debit_amount, self.credit_amount)?;
        let mut entry = NewLedgerEntry::new(self.transaction_date, posting, self.description, created_by)
            .with_category(self.category.unwrap_or(EntryCategory::Other))
            .with_remarks(self.remarks)
            .with_payment(self.payment_method, self.transfer_reference_no);
        entry.reference_no = self.reference_no.filter(|r| !r.trim().is_empty());
        Ok(entry)
    }
}

/// Result of recalculating one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalculationReport {
    /// Tenant.
    pub tenant_id: TenantId,
    /// True if nothing was persisted.
    pub dry_run: bool,
    /// Entries walked.
    pub entries_examined: usize,
    /// Balances that were (or would be) rewritten, old to new.
    pub changes: Vec<BalanceUpdate>,
    /// Balance of the last entry after recalculation.
    pub final_balance: Decimal,
}

/// Ledger service.
///
/// Wraps a [`LedgerStore`] and the [`RecomputeEngine`]; the db crate supplies
/// the store in production, tests use the in-memory one.
pub struct LedgerService<S: LedgerStore> {
    store: Arc<S>,
    engine: RecomputeEngine,
    config: LedgerConfig,
}

impl<S: LedgerStore> LedgerService<S> {
    /// Creates a service.
    #[must_use]
    pub fn new(store: Arc<S>, config: LedgerConfig) -> Self {
        Self {
            store,
            engine: RecomputeEngine::from_config(&config),
            config,
        }
    }

    /// Ledger configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Balance of the last entry in canonical order, or zero.
    pub async fn get_tenant_balance(&self, tenant_id: TenantId) -> Result<Decimal, LedgerError> {
        let scope = self.store.begin(tenant_id).await?;
        let last = scope.last_before(CanonicalKey::end()).await?;
        scope.rollback().await?;
        Ok(last.map_or(Decimal::ZERO, |entry| entry.balance))
    }

    /// Entries in canonical order, optionally limited to a date range.
    pub async fn list_ledger(
        &self,
        tenant_id: TenantId,
        range: Option<DateRange>,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let scope = self.store.begin(tenant_id).await?;
        let entries = scope.list(range).await?;
        scope.rollback().await?;
        Ok(entries)
    }

    /// Sum of all debits.
    pub async fn get_total_debits(&self, tenant_id: TenantId) -> Result<Decimal, LedgerError> {
        let entries = self.list_ledger(tenant_id, None).await?;
        checked_total(tenant_id, entries.iter().map(LedgerEntry::debit_amount))
    }

    /// Sum of all credits.
    pub async fn get_total_credits(&self, tenant_id: TenantId) -> Result<Decimal, LedgerError> {
        let entries = self.list_ledger(tenant_id, None).await?;
        checked_total(tenant_id, entries.iter().map(LedgerEntry::credit_amount))
    }

    /// Balance, totals, count and status for a tenant.
    pub async fn balance_summary(&self, tenant_id: TenantId) -> Result<BalanceSummary, LedgerError> {
        let entries = self.list_ledger(tenant_id, None).await?;
        BalanceSummary::from_entries(tenant_id, &entries)
    }

    /// Summaries for every tenant with at least one entry.
    pub async fn all_tenant_balances(&self) -> Result<Vec<BalanceSummary>, LedgerError> {
        let mut summaries = Vec::new();
        for tenant_id in self.store.tenant_ids().await? {
            let summary = self.balance_summary(tenant_id).await?;
            if summary.entry_count > 0 {
                summaries.push(summary);
            }
        }
        Ok(summaries)
    }

    /// Debits, credits and counts per category within a date range.
    pub async fn summary_by_category(
        &self,
        tenant_id: TenantId,
        range: DateRange,
    ) -> Result<LedgerSummary, LedgerError> {
        let entries = self.list_ledger(tenant_id, Some(range)).await?;
        LedgerSummary::from_entries(tenant_id, range, &entries)
    }

    /// Filtered listing, newest first, one page at a time.
    pub async fn search(
        &self,
        tenant_id: TenantId,
        filter: &LedgerFilter,
        page: &PageRequest,
    ) -> Result<PageResponse<LedgerEntry>, LedgerError> {
        let entries = self.list_ledger(tenant_id, None).await?;
        let matching: Vec<LedgerEntry> = entries
            .into_iter()
            .rev()
            .filter(|entry| filter.matches(entry))
            .collect();
        Ok(PageResponse::from_items(matching, page))
    }

    /// Records a manual entry and settles balances.
    pub async fn record_entry(
        &self,
        tenant_id: TenantId,
        input: ManualEntryInput,
        created_by: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        let entry = input.into_new_entry(created_by)?;
        let mut scope = self.store.begin(tenant_id).await?;
        let created = self.engine.insert(&mut scope, entry).await?;
        scope.commit().await?;

        info!(
            tenant_id = %tenant_id,
            entry_id = %created.id,
            balance = %created.balance,
            "Manual ledger entry recorded"
        );
        Ok(created)
    }

    /// Edits an entry and settles balances. Unchanged fields are ignored.
    pub async fn edit_entry(
        &self,
        tenant_id: TenantId,
        id: LedgerEntryId,
        changes: EntryChanges,
    ) -> Result<LedgerEntry, LedgerError> {
        let mut scope = self.store.begin(tenant_id).await?;
        let Some(updated) = self.engine.amend(&mut scope, id, changes).await? else {
            let current = scope.get(id).await?.ok_or(LedgerError::EntryNotFound(id))?;
            scope.rollback().await?;
            return Ok(current);
        };
        scope.commit().await?;

        info!(tenant_id = %tenant_id, entry_id = %id, "Ledger entry updated");
        Ok(updated)
    }

    /// Deletes an entry and settles balances.
    pub async fn delete_entry(
        &self,
        tenant_id: TenantId,
        id: LedgerEntryId,
    ) -> Result<LedgerEntry, LedgerError> {
        let mut scope = self.store.begin(tenant_id).await?;
        let removed = self.engine.remove(&mut scope, id).await?;
        scope.commit().await?;

        if let Some(reference_no) = &removed.reference_no {
            warn!(
                tenant_id = %tenant_id,
                entry_id = %id,
                reference_no = %reference_no,
                "Deleted a ledger entry linked to a billing document"
            );
        } else {
            info!(tenant_id = %tenant_id, entry_id = %id, "Ledger entry deleted");
        }
        Ok(removed)
    }

    /// Full recompute of one tenant.
    ///
    /// With `dry_run` the stale balances are reported but nothing is written.
    pub async fn recalculate(
        &self,
        tenant_id: TenantId,
        dry_run: bool,
    ) -> Result<RecalculationReport, LedgerError> {
        let mut scope = self.store.begin(tenant_id).await?;
        let report = if dry_run {
            let report = self.engine.preview_full(&scope).await?;
            scope.rollback().await?;
            report
        } else {
            let report = self.engine.full(&mut scope).await?;
            scope.commit().await?;
            report
        };

        info!(
            tenant_id = %tenant_id,
            dry_run,
            examined = report.examined,
            changed = report.changes.len(),
            "Tenant ledger recalculated"
        );
        Ok(RecalculationReport {
            tenant_id,
            dry_run,
            entries_examined: report.examined,
            changes: report.changes,
            final_balance: report.final_balance,
        })
    }

    /// Full recompute of every tenant, one unit of work per tenant.
    pub async fn recalculate_all(
        &self,
        dry_run: bool,
    ) -> Result<Vec<RecalculationReport>, LedgerError> {
        let mut reports = Vec::new();
        for tenant_id in self.store.tenant_ids().await? {
            reports.push(self.recalculate(tenant_id, dry_run).await?);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::balance::BalanceStatus;
    use crate::ledger::entry::Side;
    use crate::ledger::memory::MemoryLedgerStore;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    fn manual(day: u32, debit: Decimal, credit: Decimal, description: &str) -> ManualEntryInput {
        ManualEntryInput {
            transaction_date: date(1, day),
            debit_amount: debit,
            credit_amount: credit,
            description: description.to_string(),
            reference_no: None,
            category: None,
            payment_method: None,
            transfer_reference_no: None,
            remarks: None,
        }
    }

    fn service() -> LedgerService<MemoryLedgerStore> {
        LedgerService::new(Arc::new(MemoryLedgerStore::new()), LedgerConfig::default())
    }

    async fn seed(service: &LedgerService<MemoryLedgerStore>, tenant_id: TenantId) {
        service
            .record_entry(tenant_id, manual(1, dec!(1000), dec!(0), "January rent"), "alice")
            .await
            .unwrap();
        service
            .record_entry(tenant_id, manual(5, dec!(500), dec!(0), "Repair"), "alice")
            .await
            .unwrap();
        service
            .record_entry(tenant_id, manual(10, dec!(0), dec!(1200), "Payment"), "alice")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_balance_queries_on_empty_tenant() {
        let service = service();
        let tenant_id = TenantId::new();
        assert_eq!(service.get_tenant_balance(tenant_id).await.unwrap(), dec!(0));
        assert!(service.list_ledger(tenant_id, None).await.unwrap().is_empty());
        assert_eq!(service.get_total_debits(tenant_id).await.unwrap(), dec!(0));
        assert_eq!(service.balance_summary(tenant_id).await.unwrap().entry_count, 0);

        // Reading a tenant does not make it part of the book.
        assert!(service.all_tenant_balances().await.unwrap().is_empty());
        assert!(service.recalculate_all(true).await.unwrap().is_empty());
        assert!(service.recalculate_all(false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_balance_queries() {
        let service = service();
        let tenant_id = TenantId::new();
        seed(&service, tenant_id).await;

        assert_eq!(service.get_tenant_balance(tenant_id).await.unwrap(), dec!(300));
        assert_eq!(service.get_total_debits(tenant_id).await.unwrap(), dec!(1500));
        assert_eq!(service.get_total_credits(tenant_id).await.unwrap(), dec!(1200));

        let summary = service.balance_summary(tenant_id).await.unwrap();
        assert_eq!(summary.status, BalanceStatus::Outstanding);
        assert_eq!(summary.entry_count, 3);

        let ranged = service
            .list_ledger(tenant_id, Some(DateRange::between(date(1, 2), date(1, 9))))
            .await
            .unwrap();
        assert_eq!(ranged.len(), 1);
        assert_eq!(ranged[0].balance, dec!(1500));
    }

    #[tokio::test]
    async fn test_totals_overflow_is_an_error() {
        let service = service();
        let tenant_id = TenantId::new();
        for (day, debit, credit) in [
            (1, Decimal::MAX, dec!(0)),
            (2, dec!(0), Decimal::MAX),
            (3, Decimal::MAX, dec!(0)),
        ] {
            service
                .record_entry(tenant_id, manual(day, debit, credit, "Bulk"), "alice")
                .await
                .unwrap();
        }

        let overflow = LedgerError::BalanceOverflow { tenant_id };
        assert_eq!(service.get_tenant_balance(tenant_id).await.unwrap(), Decimal::MAX);
        assert_eq!(service.get_total_credits(tenant_id).await.unwrap(), Decimal::MAX);
        assert_eq!(service.get_total_debits(tenant_id).await.unwrap_err(), overflow);
        assert_eq!(service.balance_summary(tenant_id).await.unwrap_err(), overflow);
        assert_eq!(
            service
                .summary_by_category(tenant_id, DateRange::default())
                .await
                .unwrap_err(),
            overflow
        );
    }

    #[tokio::test]
    async fn test_all_tenant_balances() {
        let service = service();
        let first = TenantId::new();
        let second = TenantId::new();
        seed(&service, first).await;
        service
            .record_entry(second, manual(3, dec!(0), dec!(50), "Deposit refund"), "alice")
            .await
            .unwrap();

        let mut summaries = service.all_tenant_balances().await.unwrap();
        summaries.sort_by_key(|s| s.current_balance);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].status, BalanceStatus::Credit);
        assert_eq!(summaries[1].current_balance, dec!(300));
    }

    #[tokio::test]
    async fn test_search_is_newest_first_and_paginated() {
        let service = service();
        let tenant_id = TenantId::new();
        seed(&service, tenant_id).await;

        let page = service
            .search(tenant_id, &LedgerFilter::default(), &PageRequest::new(1, 2))
            .await
            .unwrap();
        let descriptions: Vec<&str> = page.data.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(descriptions, vec!["Payment", "Repair"]);
        assert_eq!(page.meta.total, 3);
        assert_eq!(page.meta.total_pages, 2);

        let debits = LedgerFilter {
            side: Some(Side::Debit),
            ..LedgerFilter::default()
        };
        let page = service
            .search(tenant_id, &debits, &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.meta.total, 2);
    }

    #[tokio::test]
    async fn test_summary_by_category() {
        let service = service();
        let tenant_id = TenantId::new();
        let mut rent = manual(1, dec!(1000), dec!(0), "Rent");
        rent.category = Some(EntryCategory::Rent);
        service.record_entry(tenant_id, rent, "alice").await.unwrap();
        seed(&service, tenant_id).await;

        let summary = service
            .summary_by_category(tenant_id, DateRange::default())
            .await
            .unwrap();
        assert_eq!(summary.by_category.len(), 2);
        assert_eq!(summary.total_debits, dec!(2500));
        assert_eq!(summary.net_amount, dec!(1300));
    }

    #[rstest]
    #[case(dec!(100), dec!(100))]
    #[case(dec!(0), dec!(0))]
    #[case(dec!(-5), dec!(0))]
    #[tokio::test]
    async fn test_record_entry_rejects_invalid_amounts(
        #[case] debit: Decimal,
        #[case] credit: Decimal,
    ) {
        let service = service();
        let err = service
            .record_entry(TenantId::new(), manual(1, debit, credit, "Bad"), "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPosting { .. }));
    }

    #[tokio::test]
    async fn test_record_entry_keeps_author_and_defaults() {
        let service = service();
        let tenant_id = TenantId::new();
        let mut input = manual(1, dec!(10), dec!(0), "Key replacement");
        input.reference_no = Some("   ".to_string());
        let entry = service.record_entry(tenant_id, input, "bob").await.unwrap();

        assert_eq!(entry.created_by, "bob");
        assert_eq!(entry.category, EntryCategory::Other);
        assert!(entry.reference_no.is_none());
        assert_eq!(entry.balance, dec!(10));
    }

    #[tokio::test]
    async fn test_edit_and_delete_entry_settle_balances() {
        let service = service();
        let tenant_id = TenantId::new();
        seed(&service, tenant_id).await;
        let entries = service.list_ledger(tenant_id, None).await.unwrap();

        let changes = EntryChanges {
            posting: Some(Posting::debit(dec!(1100)).unwrap()),
            ..EntryChanges::default()
        };
        service.edit_entry(tenant_id, entries[0].id, changes).await.unwrap();
        assert_eq!(service.get_tenant_balance(tenant_id).await.unwrap(), dec!(400));

        let unchanged = service
            .edit_entry(tenant_id, entries[1].id, EntryChanges::default())
            .await
            .unwrap();
        assert_eq!(unchanged.balance, dec!(1600));

        service.delete_entry(tenant_id, entries[1].id).await.unwrap();
        let balances: Vec<Decimal> = service
            .list_ledger(tenant_id, None)
            .await
            .unwrap()
            .iter()
            .map(|e| e.balance)
            .collect();
        assert_eq!(balances, vec![dec!(1100), dec!(-100)]);
    }

    #[tokio::test]
    async fn test_recalculate_dry_run_and_apply() {
        let store = Arc::new(MemoryLedgerStore::new());
        let service = LedgerService::new(Arc::clone(&store), LedgerConfig::default());
        let tenant_id = TenantId::new();
        seed(&service, tenant_id).await;

        // Corrupt one balance behind the service's back.
        let entries = service.list_ledger(tenant_id, None).await.unwrap();
        let mut scope = store.begin(tenant_id).await.unwrap();
        scope.set_balance(entries[1].id, dec!(0)).await.unwrap();
        scope.commit().await.unwrap();

        let preview = service.recalculate(tenant_id, true).await.unwrap();
        assert!(preview.dry_run);
        assert_eq!(preview.changes.len(), 1);
        assert_eq!(preview.changes[0].old, dec!(0));
        assert_eq!(preview.changes[0].new, dec!(1500));
        let still_broken = service.list_ledger(tenant_id, None).await.unwrap();
        assert_eq!(still_broken[1].balance, dec!(0));

        let applied = service.recalculate_all(false).await.unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].final_balance, dec!(300));
        let repaired = service.list_ledger(tenant_id, None).await.unwrap();
        assert_eq!(repaired[1].balance, dec!(1500));

        let again = service.recalculate(tenant_id, false).await.unwrap();
        assert!(again.changes.is_empty());
    }
}
