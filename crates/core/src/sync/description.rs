//! Entry descriptions derived from billing documents.
//!
//! Related records that fail to load never block the write: the placeholder
//! label is used and the failure is reported alongside the text.

use crate::ledger::{LedgerError, MAX_TEXT_LEN};

use super::document::{BillingDocument, DocumentKind, Lookup};

/// Placeholder for a rental unit that could not be resolved.
pub const UNIT_PLACEHOLDER: &str = "Unit";

/// Placeholder for a maintenance asset that could not be resolved.
pub const ASSET_PLACEHOLDER: &str = "Asset";

/// A built description plus any lookups that fell back to placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {
    /// Description text, at most 255 characters.
    pub text: String,
    /// Lookups that were unavailable.
    pub fallbacks: Vec<LedgerError>,
}

struct Labels {
    fallbacks: Vec<LedgerError>,
}

impl Labels {
    fn resolve<'a>(&mut self, lookup: &'a Lookup, what: &str, placeholder: &'a str) -> &'a str {
        match lookup {
            Lookup::Loaded(label) if !label.trim().is_empty() => label,
            Lookup::Loaded(_) | Lookup::Absent => placeholder,
            Lookup::Unavailable(reason) => {
                self.fallbacks.push(LedgerError::DependencyUnavailable(format!(
                    "{what}: {reason}"
                )));
                placeholder
            }
        }
    }
}

/// Builds the entry description for a document.
#[must_use]
pub fn describe(document: &BillingDocument) -> Description {
    let parts = &document.description_parts;
    let mut labels = Labels {
        fallbacks: Vec::new(),
    };
    let unit = labels.resolve(&parts.unit_label, "unit", UNIT_PLACEHOLDER);
    let free_text = parts
        .free_text
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty());
    let reference_no = document.reference_no.as_str();

    let text = match document.kind {
        DocumentKind::RentInvoice => format!("Rent Invoice {reference_no} - {unit}"),
        DocumentKind::MaintenanceInvoice => {
            with_free_text(format!("Maintenance Invoice {reference_no} - {unit}"), free_text)
        }
        DocumentKind::MaintenanceCost => {
            let asset = labels.resolve(&parts.subject_label, "asset", ASSET_PLACEHOLDER);
            with_free_text(format!("Maintenance Cost - {unit} ({asset})"), free_text)
        }
        DocumentKind::SecurityDepositRefund => {
            format!("Security Deposit Refund {reference_no} - {unit}")
        }
        DocumentKind::RentPayment => {
            let invoice_no = labels.resolve(&parts.subject_label, "invoice", reference_no);
            format!("Payment for Rent Invoice {invoice_no}")
        }
    };

    Description {
        text: truncate(text),
        fallbacks: labels.fallbacks,
    }
}

fn with_free_text(head: String, free_text: Option<&str>) -> String {
    match free_text {
        Some(text) => format!("{head}: {text}"),
        None => head,
    }
}

fn truncate(text: String) -> String {
    if text.chars().count() <= MAX_TEXT_LEN {
        text
    } else {
        text.chars().take(MAX_TEXT_LEN).collect()
    }
}
