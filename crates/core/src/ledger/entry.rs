//! Ledger entry domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tenantbook_shared::types::{Amount, LedgerEntryId, TenantId};

use super::error::LedgerError;

/// Maximum length of free-text columns (description, reference number).
pub const MAX_TEXT_LEN: usize = 255;

/// Side of a ledger posting.
///
/// A debit is money the tenant owes (invoices, costs); a credit is money
/// owed to or received from the tenant (payments, deposit refunds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Increases the tenant balance.
    Debit,
    /// Decreases the tenant balance.
    Credit,
}

/// A debit or a credit, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "side", content = "amount", rename_all = "lowercase")]
pub enum Posting {
    /// Debit posting.
    Debit(Amount),
    /// Credit posting.
    Credit(Amount),
}

impl Posting {
    /// Creates a posting on the given side.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is zero or negative.
    pub fn new(side: Side, amount: Decimal) -> Result<Self, LedgerError> {
        let amount = Amount::new(amount)?;
        Ok(match side {
            Side::Debit => Self::Debit(amount),
            Side::Credit => Self::Credit(amount),
        })
    }

    /// Creates a debit posting.
    pub fn debit(amount: Decimal) -> Result<Self, LedgerError> {
        Self::new(Side::Debit, amount)
    }

    /// Creates a credit posting.
    pub fn credit(amount: Decimal) -> Result<Self, LedgerError> {
        Self::new(Side::Credit, amount)
    }

    /// Rebuilds a posting from separate debit and credit columns.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidPosting`] unless exactly one column is
    /// nonzero.
    pub fn from_columns(debit: Decimal, credit: Decimal) -> Result<Self, LedgerError> {
        match (debit.is_zero(), credit.is_zero()) {
            (false, true) => Self::debit(debit),
            (true, false) => Self::credit(credit),
            _ => Err(LedgerError::InvalidPosting { debit, credit }),
        }
    }

    /// Returns the posting side.
    #[must_use]
    pub const fn side(&self) -> Side {
        match self {
            Self::Debit(_) => Side::Debit,
            Self::Credit(_) => Side::Credit,
        }
    }

    /// Returns the unsigned amount.
    #[must_use]
    pub const fn amount(&self) -> Amount {
        match self {
            Self::Debit(amount) | Self::Credit(amount) => *amount,
        }
    }

    /// Debit column value (zero for credits).
    #[must_use]
    pub fn debit_amount(&self) -> Decimal {
        match self {
            Self::Debit(amount) => amount.value(),
            Self::Credit(_) => Decimal::ZERO,
        }
    }

    /// Credit column value (zero for debits).
    #[must_use]
    pub fn credit_amount(&self) -> Decimal {
        match self {
            Self::Debit(_) => Decimal::ZERO,
            Self::Credit(amount) => amount.value(),
        }
    }

    /// Effect on the running balance: `debit - credit`.
    #[must_use]
    pub fn balance_change(&self) -> Decimal {
        match self {
            Self::Debit(amount) => amount.value(),
            Self::Credit(amount) => -amount.value(),
        }
    }
}

/// What a ledger entry is for. Mirrors the payment types of the back office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryCategory {
    /// Rent charged to the tenant.
    Rent,
    /// Rent received from the tenant.
    RentPayment,
    /// Maintenance invoices and repair costs.
    Maintenance,
    /// Security deposit returned to the tenant.
    SecurityDeposit,
    /// Anything entered by hand.
    Other,
}

impl EntryCategory {
    /// Stable storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rent => "rent",
            Self::RentPayment => "rent_payment",
            Self::Maintenance => "maintenance",
            Self::SecurityDeposit => "security_deposit",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for EntryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryCategory {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rent" => Ok(Self::Rent),
            "rent_payment" => Ok(Self::RentPayment),
            "maintenance" => Ok(Self::Maintenance),
            "security_deposit" => Ok(Self::SecurityDeposit),
            "other" => Ok(Self::Other),
            _ => Err(LedgerError::Validation(format!("Unknown entry category: {s}"))),
        }
    }
}

/// Position of an entry in canonical order: ascending `(transaction_date, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CanonicalKey {
    /// Business date, primary ordering key.
    pub transaction_date: NaiveDate,
    /// Insertion id, tie-breaker.
    pub id: LedgerEntryId,
}

impl CanonicalKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(transaction_date: NaiveDate, id: LedgerEntryId) -> Self {
        Self {
            transaction_date,
            id,
        }
    }

    /// A key ordered after every real entry.
    #[must_use]
    pub const fn end() -> Self {
        Self::new(NaiveDate::MAX, LedgerEntryId(i64::MAX))
    }
}

/// Inclusive date range; open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First date included.
    pub from: Option<NaiveDate>,
    /// Last date included.
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// Range between two dates, both inclusive.
    #[must_use]
    pub const fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Returns true if the date falls inside the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

/// A persisted ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Surrogate key, assigned at insert.
    pub id: LedgerEntryId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Business date.
    pub transaction_date: NaiveDate,
    /// Debit or credit.
    pub posting: Posting,
    /// Running balance after this entry, in canonical order.
    pub balance: Decimal,
    /// Key of the originating billing document, if any.
    pub reference_no: Option<String>,
    /// Entry category.
    pub category: EntryCategory,
    /// Human-readable description.
    pub description: String,
    /// How the money moved, for payments.
    pub payment_method: Option<String>,
    /// Bank transfer reference, for payments.
    pub transfer_reference_no: Option<String>,
    /// Free-form remarks.
    pub remarks: Option<String>,
    /// Who created the entry.
    pub created_by: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Returns the canonical ordering key.
    #[must_use]
    pub const fn key(&self) -> CanonicalKey {
        CanonicalKey::new(self.transaction_date, self.id)
    }

    /// Debit column value.
    #[must_use]
    pub fn debit_amount(&self) -> Decimal {
        self.posting.debit_amount()
    }

    /// Credit column value.
    #[must_use]
    pub fn credit_amount(&self) -> Decimal {
        self.posting.credit_amount()
    }
}

/// Input for inserting a ledger entry. The balance is computed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    /// Business date.
    pub transaction_date: NaiveDate,
    /// Debit or credit.
    pub posting: Posting,
    /// Document reference, unique per tenant when present.
    pub reference_no: Option<String>,
    /// Entry category.
    pub category: EntryCategory,
    /// Description.
    pub description: String,
    /// Payment method.
    pub payment_method: Option<String>,
    /// Transfer reference.
    pub transfer_reference_no: Option<String>,
    /// Remarks.
    pub remarks: Option<String>,
    /// Author.
    pub created_by: String,
}

impl NewLedgerEntry {
    /// Creates an uncategorized entry without a reference.
    #[must_use]
    pub fn new(
        transaction_date: NaiveDate,
        posting: Posting,
        description: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            transaction_date,
            posting,
            reference_no: None,
            category: EntryCategory::Other,
            description: description.into(),
            payment_method: None,
            transfer_reference_no: None,
            remarks: None,
            created_by: created_by.into(),
        }
    }

    /// Sets the document reference.
    #[must_use]
    pub fn with_reference(mut self, reference_no: impl Into<String>) -> Self {
        self.reference_no = Some(reference_no.into());
        self
    }

    /// Sets the category.
    #[must_use]
    pub const fn with_category(mut self, category: EntryCategory) -> Self {
        self.category = category;
        self
    }

    /// Sets the remarks.
    #[must_use]
    pub fn with_remarks(mut self, remarks: Option<String>) -> Self {
        self.remarks = remarks;
        self
    }

    /// Sets payment method and transfer reference.
    #[must_use]
    pub fn with_payment(
        mut self,
        payment_method: Option<String>,
        transfer_reference_no: Option<String>,
    ) -> Self {
        self.payment_method = payment_method;
        self.transfer_reference_no = transfer_reference_no;
        self
    }

    /// Checks the free-text columns.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty or over-long description, an
    /// empty reference, or an over-long reference.
    pub fn validate(&self) -> Result<(), LedgerError> {
        validate_description(&self.description)?;
        if let Some(reference_no) = &self.reference_no {
            validate_reference(reference_no)?;
        }
        Ok(())
    }
}

fn validate_description(description: &str) -> Result<(), LedgerError> {
    if description.trim().is_empty() {
        return Err(LedgerError::Validation("Description is required".to_string()));
    }
    if description.chars().count() > MAX_TEXT_LEN {
        return Err(LedgerError::Validation(format!(
            "Description must not exceed {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_reference(reference_no: &str) -> Result<(), LedgerError> {
    if reference_no.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Reference number cannot be blank".to_string(),
        ));
    }
    if reference_no.chars().count() > MAX_TEXT_LEN {
        return Err(LedgerError::Validation(format!(
            "Reference number must not exceed {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(())
}

/// Field changes for an existing entry. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryChanges {
    /// New posting.
    pub posting: Option<Posting>,
    /// New business date.
    pub transaction_date: Option<NaiveDate>,
    /// New description.
    pub description: Option<String>,
    /// New remarks (`Some(None)` clears them).
    pub remarks: Option<Option<String>>,
    /// New payment method (`Some(None)` clears it).
    pub payment_method: Option<Option<String>>,
    /// New transfer reference (`Some(None)` clears it).
    pub transfer_reference_no: Option<Option<String>>,
}

impl EntryChanges {
    /// Returns true if nothing would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.posting.is_none()
            && self.transaction_date.is_none()
            && self.description.is_none()
            && self.remarks.is_none()
            && self.payment_method.is_none()
            && self.transfer_reference_no.is_none()
    }

    /// Returns true if applying the changes invalidates running balances.
    #[must_use]
    pub fn affects_balances(&self) -> bool {
        self.posting.is_some() || self.transaction_date.is_some()
    }

    /// Drops every change that matches the entry's current value.
    #[must_use]
    pub fn against(mut self, entry: &LedgerEntry) -> Self {
        if self.posting == Some(entry.posting) {
            self.posting = None;
        }
        if self.transaction_date == Some(entry.transaction_date) {
            self.transaction_date = None;
        }
        if self.description.as_deref() == Some(entry.description.as_str()) {
            self.description = None;
        }
        if self.remarks.as_ref() == Some(&entry.remarks) {
            self.remarks = None;
        }
        if self.payment_method.as_ref() == Some(&entry.payment_method) {
            self.payment_method = None;
        }
        if self.transfer_reference_no.as_ref() == Some(&entry.transfer_reference_no) {
            self.transfer_reference_no = None;
        }
        self
    }

    /// Checks the changed free-text columns.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid description.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        Ok(())
    }

    /// Applies the changes to an entry in place. The balance is left alone.
    pub fn apply(&self, entry: &mut LedgerEntry, now: DateTime<Utc>) {
        if let Some(posting) = self.posting {
            entry.posting = posting;
        }
        if let Some(date) = self.transaction_date {
            entry.transaction_date = date;
        }
        if let Some(description) = &self.description {
            entry.description.clone_from(description);
        }
        if let Some(remarks) = &self.remarks {
            entry.remarks.clone_from(remarks);
        }
        if let Some(method) = &self.payment_method {
            entry.payment_method.clone_from(method);
        }
        if let Some(transfer) = &self.transfer_reference_no {
            entry.transfer_reference_no.clone_from(transfer);
        }
        entry.updated_at = now;
    }
}
