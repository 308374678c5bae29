//! Billing document synchronization.
//!
//! Rent invoices, maintenance invoices, maintenance costs, security deposit
//! refunds and rent payments each map to exactly one ledger entry, keyed by
//! reference number. This module turns their lifecycle events into entry
//! writes followed by a balance recompute.

pub mod backfill;
pub mod description;
pub mod document;
pub mod payment;
pub mod synchronizer;


pub use backfill::{BackfillItem, BackfillReport, PaymentRecord};
pub use description::{Description, describe};
pub use document::{
    BillingDocument, ChangedFields, DescriptionParts, DocumentField, DocumentKind, Lookup,
    maintenance_cost_reference, payment_reference,
};
pub use payment::{OpenInvoice, PaymentMatch, match_payment};
pub use synchronizer::{DocumentSynchronizer, SyncContext, SyncOutcome};
