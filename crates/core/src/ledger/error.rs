//! Ledger error types.
//!
//! Integrity failures (a recompute that does not satisfy the running-balance
//! rule) are fatal and abort the unit of work. Desynchronization errors
//! (`DuplicateReference`, `MissingLinkedEntry`, `DependencyUnavailable`) are
//! recoverable signals the synchronizer may tolerate.

use rust_decimal::Decimal;
use tenantbook_shared::AppError;
use tenantbook_shared::types::{AmountError, LedgerEntryId, TenantId};
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    // ========== Integrity Errors ==========
    /// A recomputed balance does not follow from its predecessor.
    #[error(
        "Running balance mismatch for tenant {tenant_id} at entry {entry_id}: expected {expected}, found {actual}"
    )]
    InvariantViolation {
        /// Tenant whose ledger is inconsistent.
        tenant_id: TenantId,
        /// First entry that breaks the chain.
        entry_id: LedgerEntryId,
        /// Balance implied by the previous entry.
        expected: Decimal,
        /// Balance actually persisted.
        actual: Decimal,
    },

    /// Balance arithmetic overflowed.
    #[error("Balance overflow for tenant {tenant_id}")]
    BalanceOverflow {
        /// Tenant being recomputed.
        tenant_id: TenantId,
    },

    // ========== Synchronization Errors ==========
    /// An entry with this reference already exists for the tenant.
    #[error("Ledger entry with reference {reference_no} already exists for tenant {tenant_id}")]
    DuplicateReference {
        /// Tenant.
        tenant_id: TenantId,
        /// Conflicting reference number.
        reference_no: String,
    },

    /// A document update or delete found no linked entry.
    #[error("No ledger entry with reference {reference_no} for tenant {tenant_id}")]
    MissingLinkedEntry {
        /// Tenant.
        tenant_id: TenantId,
        /// Reference that was looked up.
        reference_no: String,
    },

    /// A record needed to describe a document could not be loaded.
    #[error("Related record unavailable: {0}")]
    DependencyUnavailable(String),

    // ========== Validation Errors ==========
    /// Entry not found.
    #[error("Ledger entry not found: {0}")]
    EntryNotFound(LedgerEntryId),

    /// Amount is zero or negative.
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    /// Entry must carry either a debit or a credit, not both.
    #[error("Entry must specify either debit or credit, not both. Debit: {debit}, Credit: {credit}")]
    InvalidPosting {
        /// Debit column.
        debit: Decimal,
        /// Credit column.
        credit: Decimal,
    },

    /// Field validation failed.
    #[error("Validation error: {0}")]
    Validation(String),

    // ========== Concurrency Errors ==========
    /// Concurrent modification detected.
    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    // ========== Storage Errors ==========
    /// Store error.
    #[error("Store error: {0}")]
    Store(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvariantViolation { .. } => "INVARIANT_VIOLATION",
            Self::BalanceOverflow { .. } => "BALANCE_OVERFLOW",
            Self::DuplicateReference { .. } => "DUPLICATE_REFERENCE",
            Self::MissingLinkedEntry { .. } => "MISSING_LINKED_ENTRY",
            Self::DependencyUnavailable(_) => "DEPENDENCY_UNAVAILABLE",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InvalidPosting { .. } => "INVALID_POSTING",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::Store(_) => "STORE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation errors
            Self::InvalidAmount(_) | Self::InvalidPosting { .. } | Self::Validation(_) => 400,

            // 404 Not Found
            Self::EntryNotFound(_) | Self::MissingLinkedEntry { .. } => 404,

            // 409 Conflict
            Self::DuplicateReference { .. } | Self::ConcurrentModification => 409,

            // 503 Service Unavailable
            Self::DependencyUnavailable(_) => 503,

            // 500 Internal Server Error
            Self::InvariantViolation { .. }
            | Self::BalanceOverflow { .. }
            | Self::Store(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification)
    }

    /// Returns true if the ledger could not be brought to a consistent state.
    ///
    /// These errors are never swallowed by the synchronizer.
    #[must_use]
    pub const fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::InvariantViolation { .. } | Self::BalanceOverflow { .. }
        )
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::EntryNotFound(_) | LedgerError::MissingLinkedEntry { .. } => {
                Self::NotFound(message)
            }
            LedgerError::InvalidAmount(_)
            | LedgerError::InvalidPosting { .. }
            | LedgerError::Validation(_) => Self::Validation(message),
            LedgerError::DuplicateReference { .. } | LedgerError::ConcurrentModification => {
                Self::Conflict(message)
            }
            LedgerError::InvariantViolation { .. } | LedgerError::BalanceOverflow { .. } => {
                Self::BusinessRule(message)
            }
            LedgerError::Store(_) => Self::Database(message),
            LedgerError::DependencyUnavailable(_) | LedgerError::Internal(_) => {
                Self::Internal(message)
            }
        }
    }
}
