//! Matching manual payments against open invoices.
//!
//! A manual credit whose reference number names an unpaid invoice settles
//! that invoice when the amounts agree within the configured tolerance. The
//! credit is stored under the invoice's payment reference (`{invoice}-PAY`),
//! the same key backfill uses, so it never collides with the invoice's own
//! debit. The document layer then marks the invoice paid with sync skipped,
//! so the payment is not posted twice.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tenantbook_shared::types::TenantId;
use tracing::{info, warn};

use super::document::payment_reference;
use crate::ledger::{LedgerEntry, LedgerError, LedgerService, LedgerStore, ManualEntryInput, Side};

/// An invoice as known to the document layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenInvoice {
    /// Invoice number.
    pub reference_no: String,
    /// Invoice total.
    pub total_amount: Decimal,
    /// Whether the invoice is already paid.
    pub paid: bool,
}

/// Decision for a payment entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PaymentMatch {
    /// The payment settles the invoice.
    Settles {
        /// Invoice to mark paid.
        reference_no: String,
    },
    /// The invoice matches but the amounts differ.
    AmountMismatch {
        /// Invoice total.
        invoice_total: Decimal,
        /// Amount credited.
        paid: Decimal,
    },
    /// The entry is not a payment for an open invoice.
    NotApplicable,
}

/// Decides whether a ledger entry settles an invoice.
///
/// The entry must carry the invoice's payment reference. Amounts agree when
/// they differ by strictly less than `tolerance`.
#[must_use]
pub fn match_payment(
    entry: &LedgerEntry,
    invoice: Option<&OpenInvoice>,
    tolerance: Decimal,
) -> PaymentMatch {
    let (Some(invoice), Some(reference_no)) = (invoice, entry.reference_no.as_deref()) else {
        return PaymentMatch::NotApplicable;
    };
    if entry.posting.side() != Side::Credit
        || invoice.paid
        || reference_no != payment_reference(&invoice.reference_no)
    {
        return PaymentMatch::NotApplicable;
    }

    let paid = entry.credit_amount();
    if (invoice.total_amount - paid).abs() < tolerance {
        PaymentMatch::Settles {
            reference_no: invoice.reference_no.clone(),
        }
    } else {
        PaymentMatch::AmountMismatch {
            invoice_total: invoice.total_amount,
            paid,
        }
    }
}

impl<S: LedgerStore> LedgerService<S> {
    /// Records a manual entry and checks whether it settles `invoice`.
    ///
    /// An input referencing the invoice number directly is stored under the
    /// invoice's payment reference instead.
    pub async fn record_payment(
        &self,
        tenant_id: TenantId,
        mut input: ManualEntryInput,
        created_by: &str,
        invoice: Option<&OpenInvoice>,
    ) -> Result<(LedgerEntry, PaymentMatch), LedgerError> {
        if let Some(invoice) = invoice
            && input.reference_no.as_deref().map(str::trim) == Some(invoice.reference_no.as_str())
        {
            input.reference_no = Some(payment_reference(&invoice.reference_no));
        }
        let entry = self.record_entry(tenant_id, input, created_by).await?;
        let decision = match_payment(&entry, invoice, self.config().payment_match_tolerance);

        match &decision {
            PaymentMatch::Settles { reference_no } => info!(
                tenant_id = %tenant_id,
                entry_id = %entry.id,
                reference_no = %reference_no,
                "Payment settles invoice"
            ),
            PaymentMatch::AmountMismatch { invoice_total, paid } => warn!(
                tenant_id = %tenant_id,
                entry_id = %entry.id,
                invoice_total = %invoice_total,
                paid = %paid,
                "Payment amount does not match invoice total"
            ),
            PaymentMatch::NotApplicable => {}
        }
        Ok((entry, decision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{EntryCategory, Posting};
    use chrono::{NaiveDate, Utc};
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use tenantbook_shared::types::LedgerEntryId;

    fn entry(posting: Posting, reference_no: Option<&str>) -> LedgerEntry {
        let now = Utc::now();
        LedgerEntry {
            id: LedgerEntryId(1),
            tenant_id: TenantId::new(),
            transaction_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            posting,
            balance: Decimal::ZERO,
            reference_no: reference_no.map(str::to_string),
            category: EntryCategory::RentPayment,
            description: "Payment".to_string(),
            payment_method: Some("bank_transfer".to_string()),
            transfer_reference_no: None,
            remarks: None,
            created_by: "alice".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn invoice(total: Decimal, paid: bool) -> OpenInvoice {
        OpenInvoice {
            reference_no: "INV-001".to_string(),
            total_amount: total,
            paid,
        }
    }

    #[rstest]
    #[case(dec!(1000.00), dec!(1000.00))]
    #[case(dec!(1000.00), dec!(999.995))]
    #[case(dec!(1000.004), dec!(1000.00))]
    fn test_payment_settles_within_tolerance(#[case] total: Decimal, #[case] credited: Decimal) {
        let payment = entry(Posting::credit(credited).unwrap(), Some("INV-001-PAY"));
        assert_eq!(
            match_payment(&payment, Some(&invoice(total, false)), dec!(0.01)),
            PaymentMatch::Settles {
                reference_no: "INV-001".to_string()
            }
        );
    }

    #[test]
    fn test_payment_tolerance_is_strict() {
        let payment = entry(Posting::credit(dec!(999.99)).unwrap(), Some("INV-001-PAY"));
        assert_eq!(
            match_payment(&payment, Some(&invoice(dec!(1000.00), false)), dec!(0.01)),
            PaymentMatch::AmountMismatch {
                invoice_total: dec!(1000.00),
                paid: dec!(999.99),
            }
        );
    }

    #[test]
    fn test_not_applicable_cases() {
        let open = invoice(dec!(1000), false);
        let credit = Posting::credit(dec!(1000)).unwrap();

        let debit = entry(Posting::debit(dec!(1000)).unwrap(), Some("INV-001-PAY"));
        assert_eq!(match_payment(&debit, Some(&open), dec!(0.01)), PaymentMatch::NotApplicable);

        let unreferenced = entry(credit, None);
        assert_eq!(match_payment(&unreferenced, Some(&open), dec!(0.01)), PaymentMatch::NotApplicable);

        let other = entry(credit, Some("INV-002-PAY"));
        assert_eq!(match_payment(&other, Some(&open), dec!(0.01)), PaymentMatch::NotApplicable);

        // The invoice's own debit reference is not a payment reference.
        let invoice_key = entry(credit, Some("INV-001"));
        assert_eq!(match_payment(&invoice_key, Some(&open), dec!(0.01)), PaymentMatch::NotApplicable);

        let matching = entry(credit, Some("INV-001-PAY"));
        assert_eq!(
            match_payment(&matching, Some(&invoice(dec!(1000), true)), dec!(0.01)),
            PaymentMatch::NotApplicable
        );
        assert_eq!(match_payment(&matching, None, dec!(0.01)), PaymentMatch::NotApplicable);
    }
}
