//! Running balance calculations.
//!
//! A tenant's balance after entry `i` in canonical order is
//! `balance(i - 1) + debit(i) - credit(i)`, with the balance before the first
//! entry being zero. Positive balances mean the tenant owes money.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tenantbook_shared::types::{LedgerEntryId, TenantId};

use super::entry::LedgerEntry;
use super::error::LedgerError;

/// Running balance information for one step of the chain.
///
/// - position: 1-based index of the entry within the walked range
/// - previous_balance: balance before this entry
/// - current_balance: balance after this entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningBalance {
    /// Number of entries applied since the anchor.
    pub position: u64,
    /// Balance before this entry.
    pub previous_balance: Decimal,
    /// Balance after this entry.
    pub current_balance: Decimal,
}

impl RunningBalance {
    /// Starting point of a walk: the balance just before the first entry
    /// examined. Zero for a walk over the whole ledger.
    #[must_use]
    pub const fn anchor(balance: Decimal) -> Self {
        Self {
            position: 0,
            previous_balance: balance,
            current_balance: balance,
        }
    }

    /// Running balance for the first entry of a tenant.
    #[must_use]
    pub fn first_entry(balance_change: Decimal) -> Option<Self> {
        Self::anchor(Decimal::ZERO).next_entry(balance_change)
    }

    /// Running balance after applying one more entry.
    ///
    /// Returns `None` on decimal overflow.
    #[must_use]
    pub fn next_entry(&self, balance_change: Decimal) -> Option<Self> {
        Some(Self {
            position: self.position + 1,
            previous_balance: self.current_balance,
            current_balance: self.current_balance.checked_add(balance_change)?,
        })
    }
}

/// A balance rewrite produced by a recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    /// Entry whose balance is recomputed.
    pub id: LedgerEntryId,
    /// Balance as persisted before the recompute.
    pub old: Decimal,
    /// Balance implied by the chain.
    pub new: Decimal,
}

impl BalanceUpdate {
    /// Returns true if the persisted balance is stale.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.old != self.new
    }
}

/// Computes the balance every entry should carry.
///
/// `entries` must be in canonical order and `anchor` must be the balance of
/// the entry immediately before the first one (zero if none).
pub fn running_balances(
    tenant_id: TenantId,
    anchor: Decimal,
    entries: &[LedgerEntry],
) -> Result<Vec<BalanceUpdate>, LedgerError> {
    let mut running = RunningBalance::anchor(anchor);
    let mut updates = Vec::with_capacity(entries.len());
    for entry in entries {
        running = running
            .next_entry(entry.posting.balance_change())
            .ok_or(LedgerError::BalanceOverflow { tenant_id })?;
        updates.push(BalanceUpdate {
            id: entry.id,
            old: entry.balance,
            new: running.current_balance,
        });
    }
    Ok(updates)
}

/// Sums amounts, failing instead of overflowing.
///
/// # Errors
///
/// Returns [`LedgerError::BalanceOverflow`] if the total exceeds the decimal
/// range.
pub fn checked_total<I>(tenant_id: TenantId, amounts: I) -> Result<Decimal, LedgerError>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().try_fold(Decimal::ZERO, |total, amount| {
        total
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow { tenant_id })
    })
}

/// Checks persisted balances against the chain rule.
///
/// Returns the final balance of the walked range (the anchor if empty).
pub fn verify_chain(
    tenant_id: TenantId,
    anchor: Decimal,
    entries: &[LedgerEntry],
) -> Result<Decimal, LedgerError> {
    let mut previous = anchor;
    for entry in entries {
        let expected = previous
            .checked_add(entry.posting.balance_change())
            .ok_or(LedgerError::BalanceOverflow { tenant_id })?;
        if entry.balance != expected {
            return Err(LedgerError::InvariantViolation {
                tenant_id,
                entry_id: entry.id,
                expected,
                actual: entry.balance,
            });
        }
        previous = entry.balance;
    }
    Ok(previous)
}

/// Whether the tenant owes money, is owed money, or is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStatus {
    /// Tenant owes money.
    Outstanding,
    /// Tenant is owed money.
    Credit,
    /// Nothing owed either way.
    Balanced,
}

impl BalanceStatus {
    /// Classifies a balance.
    #[must_use]
    pub fn from_balance(balance: Decimal) -> Self {
        if balance > Decimal::ZERO {
            Self::Outstanding
        } else if balance < Decimal::ZERO {
            Self::Credit
        } else {
            Self::Balanced
        }
    }
}

/// Balance overview for one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSummary {
    /// Tenant.
    pub tenant_id: TenantId,
    /// Balance of the last entry in canonical order, or zero.
    pub current_balance: Decimal,
    /// Sum of all debits.
    pub total_debits: Decimal,
    /// Sum of all credits.
    pub total_credits: Decimal,
    /// Number of entries.
    pub entry_count: u64,
    /// Balance classification.
    pub status: BalanceStatus,
}

impl BalanceSummary {
    /// Summarizes a tenant's entries, given in canonical order.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::BalanceOverflow`] if a total exceeds the
    /// decimal range.
    pub fn from_entries(tenant_id: TenantId, entries: &[LedgerEntry]) -> Result<Self, LedgerError> {
        let current_balance = entries.last().map_or(Decimal::ZERO, |entry| entry.balance);
        Ok(Self {
            tenant_id,
            current_balance,
            total_debits: checked_total(tenant_id, entries.iter().map(LedgerEntry::debit_amount))?,
            total_credits: checked_total(tenant_id, entries.iter().map(LedgerEntry::credit_amount))?,
            entry_count: entries.len() as u64,
            status: BalanceStatus::from_balance(current_balance),
        })
    }
}
