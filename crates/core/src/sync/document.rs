//! Billing documents as seen by the synchronizer.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::{EntryCategory, LedgerError, Posting, Side};

/// Kinds of billing documents that post to the tenant ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Monthly rent charged to the tenant.
    RentInvoice,
    /// Maintenance work billed to the tenant.
    MaintenanceInvoice,
    /// Repair cost charged back to the tenant.
    MaintenanceCost,
    /// Security deposit returned to the tenant.
    SecurityDepositRefund,
    /// Payment received against a rent invoice.
    RentPayment,
}

impl DocumentKind {
    /// Money owed by the tenant is a debit; money owed to or received from
    /// the tenant is a credit.
    #[must_use]
    pub const fn direction(self) -> Side {
        match self {
            Self::RentInvoice | Self::MaintenanceInvoice | Self::MaintenanceCost => Side::Debit,
            Self::SecurityDepositRefund | Self::RentPayment => Side::Credit,
        }
    }

    /// Ledger category of the entry this document produces.
    #[must_use]
    pub const fn category(self) -> EntryCategory {
        match self {
            Self::RentInvoice => EntryCategory::Rent,
            Self::MaintenanceInvoice | Self::MaintenanceCost => EntryCategory::Maintenance,
            Self::SecurityDepositRefund => EntryCategory::SecurityDeposit,
            Self::RentPayment => EntryCategory::RentPayment,
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::RentInvoice => "Rent Invoice",
            Self::MaintenanceInvoice => "Maintenance Invoice",
            Self::MaintenanceCost => "Maintenance Cost",
            Self::SecurityDepositRefund => "Security Deposit Refund",
            Self::RentPayment => "Rent Payment",
        }
    }
}

/// Result of loading a related record used in a description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lookup {
    /// The record was loaded and has this label.
    Loaded(String),
    /// The document has no such relation.
    Absent,
    /// The relation exists but could not be loaded.
    Unavailable(String),
}

impl Lookup {
    /// Wraps an optional label.
    #[must_use]
    pub fn from_option(label: Option<String>) -> Self {
        label.map_or(Self::Absent, Self::Loaded)
    }
}

/// Inputs for the entry description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionParts {
    /// Rental unit number.
    pub unit_label: Lookup,
    /// Secondary subject (asset name for maintenance costs, invoice number
    /// for payments).
    pub subject_label: Lookup,
    /// Free text typed on the document.
    pub free_text: Option<String>,
}

impl Default for DescriptionParts {
    fn default() -> Self {
        Self {
            unit_label: Lookup::Absent,
            subject_label: Lookup::Absent,
            free_text: None,
        }
    }
}

/// A billing document event payload.
///
/// Document totals are validated upstream; the synchronizer only requires
/// the amount to be positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingDocument {
    /// Document kind.
    pub kind: DocumentKind,
    /// Stable key linking the document to its ledger entry.
    pub reference_no: String,
    /// Document total.
    pub total_amount: Decimal,
    /// Debit or credit.
    pub direction: Side,
    /// Document date, used as the entry's transaction date.
    pub transaction_date: NaiveDate,
    /// Workflow status, if the document has one.
    pub status: Option<String>,
    /// Description inputs.
    pub description_parts: DescriptionParts,
    /// Notes copied to the entry remarks.
    pub remarks: Option<String>,
    /// Payment method, for payments.
    pub payment_method: Option<String>,
    /// Bank transfer reference, for payments.
    pub transfer_reference_no: Option<String>,
}

impl BillingDocument {
    /// Creates a document of the given kind.
    #[must_use]
    pub fn new(
        kind: DocumentKind,
        reference_no: impl Into<String>,
        total_amount: Decimal,
        transaction_date: NaiveDate,
    ) -> Self {
        Self {
            kind,
            reference_no: reference_no.into(),
            total_amount,
            direction: kind.direction(),
            transaction_date,
            status: None,
            description_parts: DescriptionParts::default(),
            remarks: None,
            payment_method: None,
            transfer_reference_no: None,
        }
    }

    /// Rent invoice keyed by its invoice number.
    #[must_use]
    pub fn rent_invoice(invoice_no: &str, total_amount: Decimal, invoice_date: NaiveDate) -> Self {
        Self::new(DocumentKind::RentInvoice, invoice_no, total_amount, invoice_date)
    }

    /// Maintenance invoice keyed by its invoice number.
    #[must_use]
    pub fn maintenance_invoice(
        invoice_no: &str,
        total_amount: Decimal,
        invoice_date: NaiveDate,
    ) -> Self {
        Self::new(DocumentKind::MaintenanceInvoice, invoice_no, total_amount, invoice_date)
    }

    /// Maintenance cost keyed by `MAINT-{id}`.
    #[must_use]
    pub fn maintenance_cost(cost_id: i64, repair_cost: Decimal, repair_date: NaiveDate) -> Self {
        Self::new(
            DocumentKind::MaintenanceCost,
            maintenance_cost_reference(cost_id),
            repair_cost,
            repair_date,
        )
    }

    /// Security deposit refund keyed by its refund number.
    #[must_use]
    pub fn security_deposit_refund(
        refund_no: &str,
        refund_amount: Decimal,
        refund_date: NaiveDate,
    ) -> Self {
        Self::new(DocumentKind::SecurityDepositRefund, refund_no, refund_amount, refund_date)
    }

    /// Payment for a rent invoice, keyed by `{invoice_no}-PAY`.
    #[must_use]
    pub fn rent_payment(invoice_no: &str, amount: Decimal, paid_date: NaiveDate) -> Self {
        let mut document = Self::new(
            DocumentKind::RentPayment,
            payment_reference(invoice_no),
            amount,
            paid_date,
        );
        document.description_parts.subject_label = Lookup::Loaded(invoice_no.to_string());
        document
    }

    /// Sets the rental unit lookup.
    #[must_use]
    pub fn with_unit(mut self, unit_label: Lookup) -> Self {
        self.description_parts.unit_label = unit_label;
        self
    }

    /// Sets the subject lookup.
    #[must_use]
    pub fn with_subject(mut self, subject_label: Lookup) -> Self {
        self.description_parts.subject_label = subject_label;
        self
    }

    /// Sets the free text.
    #[must_use]
    pub fn with_free_text(mut self, free_text: impl Into<String>) -> Self {
        self.description_parts.free_text = Some(free_text.into());
        self
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets the remarks.
    #[must_use]
    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
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

    /// The posting this document produces.
    ///
    /// # Errors
    ///
    /// Returns an error if the total is not positive.
    pub fn posting(&self) -> Result<Posting, LedgerError> {
        Posting::new(self.direction, self.total_amount)
    }
}

/// Reference number of a maintenance cost entry.
#[must_use]
pub fn maintenance_cost_reference(cost_id: i64) -> String {
    format!("MAINT-{cost_id}")
}

/// Reference number of the payment entry for a rent invoice.
#[must_use]
pub fn payment_reference(invoice_no: &str) -> String {
    format!("{invoice_no}-PAY")
}

/// Document fields an update event can report as changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentField {
    /// Document total.
    TotalAmount,
    /// Workflow status.
    Status,
    /// Free-text description.
    Description,
    /// Rental unit.
    UnitLabel,
    /// Secondary subject (asset, invoice).
    SubjectLabel,
    /// Notes.
    Remarks,
    /// Document date.
    TransactionDate,
    /// Anything else.
    Other,
}

impl DocumentField {
    /// Fields whose change requires re-syncing the entry.
    #[must_use]
    pub const fn is_monitored(self) -> bool {
        matches!(
            self,
            Self::TotalAmount
                | Self::Status
                | Self::Description
                | Self::UnitLabel
                | Self::SubjectLabel
        )
    }
}

/// Set of fields changed by a document update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFields(BTreeSet<DocumentField>);

impl ChangedFields {
    /// Returns true if any monitored field changed.
    #[must_use]
    pub fn touches_ledger(&self) -> bool {
        self.0.iter().any(|field| field.is_monitored())
    }

    /// Returns true if the field changed.
    #[must_use]
    pub fn contains(&self, field: DocumentField) -> bool {
        self.0.contains(&field)
    }
}

impl FromIterator<DocumentField> for ChangedFields {
    fn from_iter<I: IntoIterator<Item = DocumentField>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[DocumentField; N]> for ChangedFields {
    fn from(fields: [DocumentField; N]) -> Self {
        fields.into_iter().collect()
    }
}
