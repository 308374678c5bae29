//! Ledger listing filters and category summaries.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tenantbook_shared::types::TenantId;

use super::balance::checked_total;
use super::entry::{DateRange, EntryCategory, LedgerEntry, Side};
use super::error::LedgerError;

/// Sign of an entry's running balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceSign {
    /// Balance above zero (tenant owes money).
    Positive,
    /// Balance below zero (tenant is in credit).
    Negative,
}

/// Criteria for the ledger listing. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFilter {
    /// Transaction date range.
    #[serde(default)]
    pub range: DateRange,
    /// Debits or credits only.
    pub side: Option<Side>,
    /// Entry category.
    pub category: Option<EntryCategory>,
    /// Running balance sign.
    pub balance_sign: Option<BalanceSign>,
    /// Case-insensitive text searched in description and reference number.
    pub search: Option<String>,
}

impl LedgerFilter {
    /// Returns true if the entry satisfies every criterion.
    #[must_use]
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.range.contains(entry.transaction_date)
            && self.side.is_none_or(|side| entry.posting.side() == side)
            && self.category.is_none_or(|category| entry.category == category)
            && self.balance_sign.is_none_or(|sign| match sign {
                BalanceSign::Positive => entry.balance > Decimal::ZERO,
                BalanceSign::Negative => entry.balance < Decimal::ZERO,
            })
            && self.matches_search(entry)
    }

    fn matches_search(&self, entry: &LedgerEntry) -> bool {
        let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return true;
        };
        let needle = needle.to_lowercase();
        entry.description.to_lowercase().contains(&needle)
            || entry
                .reference_no
                .as_deref()
                .is_some_and(|reference_no| reference_no.to_lowercase().contains(&needle))
    }
}

/// Totals for one entry category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    /// Category.
    pub category: EntryCategory,
    /// Sum of debits.
    pub total_debits: Decimal,
    /// Sum of credits.
    pub total_credits: Decimal,
    /// Number of entries.
    pub transaction_count: u64,
}

/// Category breakdown of a tenant's ledger over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    /// Tenant.
    pub tenant_id: TenantId,
    /// Range the summary covers.
    pub range: DateRange,
    /// Per-category totals, ordered by category.
    pub by_category: Vec<CategorySummary>,
    /// Sum of all debits in range.
    pub total_debits: Decimal,
    /// Sum of all credits in range.
    pub total_credits: Decimal,
    /// Debits minus credits.
    pub net_amount: Decimal,
}

impl LedgerSummary {
    /// Groups entries by category. Entries outside the range are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::BalanceOverflow`] if a total exceeds the
    /// decimal range.
    pub fn from_entries(
        tenant_id: TenantId,
        range: DateRange,
        entries: &[LedgerEntry],
    ) -> Result<Self, LedgerError> {
        let overflow = || LedgerError::BalanceOverflow { tenant_id };
        let mut groups: BTreeMap<EntryCategory, CategorySummary> = BTreeMap::new();
        for entry in entries.iter().filter(|e| range.contains(e.transaction_date)) {
            let group = groups
                .entry(entry.category)
                .or_insert_with(|| CategorySummary {
                    category: entry.category,
                    total_debits: Decimal::ZERO,
                    total_credits: Decimal::ZERO,
                    transaction_count: 0,
                });
            group.total_debits = group
                .total_debits
                .checked_add(entry.debit_amount())
                .ok_or_else(overflow)?;
            group.total_credits = group
                .total_credits
                .checked_add(entry.credit_amount())
                .ok_or_else(overflow)?;
            group.transaction_count += 1;
        }

        let by_category: Vec<CategorySummary> = groups.into_values().collect();
        let total_debits = checked_total(tenant_id, by_category.iter().map(|g| g.total_debits))?;
        let total_credits = checked_total(tenant_id, by_category.iter().map(|g| g.total_credits))?;
        Ok(Self {
            tenant_id,
            range,
            by_category,
            total_debits,
            total_credits,
            net_amount: total_debits.checked_sub(total_credits).ok_or_else(overflow)?,
        })
    }
}
