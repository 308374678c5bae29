//! Backfill of existing documents into the ledger.
//!
//! Each document goes through the regular create path, so running a backfill
//! twice creates nothing the second time. Paid rent invoices also get their
//! payment credit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tenantbook_shared::types::TenantId;
use tracing::{info, warn};

use crate::ledger::{LedgerError, LedgerStore};

use super::document::{BillingDocument, DocumentKind};
use super::synchronizer::{DocumentSynchronizer, SyncContext, SyncOutcome};

/// Settlement details of a paid invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Date the invoice was paid.
    pub paid_date: NaiveDate,
    /// Payment method.
    pub payment_method: Option<String>,
    /// Transfer reference.
    pub transfer_reference_no: Option<String>,
}

/// One document to backfill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillItem {
    /// Tenant the document bills.
    pub tenant_id: TenantId,
    /// The document.
    pub document: BillingDocument,
    /// Payment, for paid rent invoices.
    pub payment: Option<PaymentRecord>,
}

impl BackfillItem {
    /// An unpaid document.
    #[must_use]
    pub const fn new(tenant_id: TenantId, document: BillingDocument) -> Self {
        Self {
            tenant_id,
            document,
            payment: None,
        }
    }

    /// Marks the document as paid.
    #[must_use]
    pub fn paid(mut self, payment: PaymentRecord) -> Self {
        self.payment = Some(payment);
        self
    }

    fn payment_document(&self) -> Option<BillingDocument> {
        let payment = self.payment.as_ref()?;
        if self.document.kind != DocumentKind::RentInvoice {
            return None;
        }
        Some(
            BillingDocument::rent_payment(
                &self.document.reference_no,
                self.document.total_amount,
                payment.paid_date,
            )
            .with_unit(self.document.description_parts.unit_label.clone())
            .with_payment(
                payment.payment_method.clone(),
                payment.transfer_reference_no.clone(),
            ),
        )
    }
}

/// Counters for a backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
    /// Documents that got (or would get) an entry.
    pub processed: usize,
    /// Documents that already had an entry.
    pub skipped: usize,
    /// Documents whose sync failed.
    pub failed: usize,
    /// Payment credits created (or that would be created).
    pub payments_recorded: usize,
    /// True if nothing was written.
    pub dry_run: bool,
}

impl<S: LedgerStore> DocumentSynchronizer<S> {
    /// Syncs existing documents that have no ledger entry yet.
    ///
    /// With `dry_run` only the counts are produced.
    pub async fn backfill<I>(
        &self,
        items: I,
        ctx: &SyncContext,
        dry_run: bool,
    ) -> Result<BackfillReport, LedgerError>
    where
        I: IntoIterator<Item = BackfillItem>,
    {
        let mut report = BackfillReport {
            dry_run,
            ..BackfillReport::default()
        };

        for item in items {
            let tenant_id = item.tenant_id;
            let payment = item.payment_document();

            if dry_run {
                if self.linked_entry(tenant_id, &item.document.reference_no).await?.is_some() {
                    report.skipped += 1;
                } else {
                    report.processed += 1;
                }
                if let Some(payment) = &payment
                    && self.linked_entry(tenant_id, &payment.reference_no).await?.is_none()
                {
                    report.payments_recorded += 1;
                }
                continue;
            }

            match self.on_document_created(tenant_id, &item.document, ctx).await? {
                SyncOutcome::Created(_) => report.processed += 1,
                SyncOutcome::AlreadySynced | SyncOutcome::Skipped => report.skipped += 1,
                _ => {
                    warn!(
                        tenant_id = %tenant_id,
                        reference_no = %item.document.reference_no,
                        "Backfill could not sync document"
                    );
                    report.failed += 1;
                    continue;
                }
            }

            if let Some(payment) = payment
                && let SyncOutcome::Created(_) =
                    self.on_document_created(tenant_id, &payment, ctx).await?
            {
                report.payments_recorded += 1;
            }
        }

        info!(
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failed,
            payments_recorded = report.payments_recorded,
            dry_run,
            "Ledger backfill finished"
        );
        Ok(report)
    }
}
