//! Tenant ledger logic.
//!
//! This module implements the per-tenant running-balance ledger:
//! - Ledger entries with a tagged debit/credit posting
//! - Running balance calculation and verification
//! - Store abstraction with an in-memory implementation
//! - Cascade and full balance recomputation
//! - Listing filters and summaries
//! - Ledger service for balances, manual entries and recalculation
//! - Error types for ledger operations

pub mod balance;
pub mod entry;
pub mod error;
pub mod filter;
pub mod memory;
pub mod recompute;
pub mod service;
pub mod store;

#[cfg(test)]
mod recompute_props;

pub use balance::{BalanceStatus, BalanceSummary, BalanceUpdate, RunningBalance};
pub use entry::{
    CanonicalKey, DateRange, EntryCategory, EntryChanges, LedgerEntry, MAX_TEXT_LEN, NewLedgerEntry,
    Posting, Side,
};
pub use error::LedgerError;
pub use filter::{BalanceSign, CategorySummary, LedgerFilter, LedgerSummary};
pub use memory::{MemoryLedgerScope, MemoryLedgerStore};
pub use recompute::{RecomputeEngine, RecomputeReport};
pub use service::{LedgerService, ManualEntryInput, RecalculationReport};
pub use store::{LedgerScope, LedgerStore};
