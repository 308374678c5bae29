//! Database seeder for Tenantbook development and testing.
//!
//! Seeds a demo tenant through the document synchronizer: two invoices, a
//! maintenance cost, a paid rent invoice backfilled with its payment, and a
//! manual adjustment. Re-running is harmless since every document is keyed by
//! its reference number.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use tenantbook_core::ledger::{EntryCategory, LedgerService, ManualEntryInput};
use tenantbook_core::sync::{
    BackfillItem, BillingDocument, DocumentSynchronizer, Lookup, PaymentRecord, SyncContext,
};
use tenantbook_db::{SeaOrmLedgerStore, connect};
use tenantbook_shared::AppConfig;
use tenantbook_shared::types::TenantId;

/// Demo tenant ID (consistent for all seeds)
const DEMO_TENANT_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0001);

const DEMO_UNIT: &str = "Block A-101";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tenantbook=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    let db = connect(&config.database).await?;
    let store = Arc::new(SeaOrmLedgerStore::new(db));

    let tenant_id = TenantId::from_uuid(DEMO_TENANT_ID);
    let sync = DocumentSynchronizer::new(Arc::clone(&store), &config.ledger);
    let ctx = SyncContext::system(&config.ledger);

    println!("Seeding billing documents...");
    for document in demo_documents()? {
        let outcome = sync.on_document_created(tenant_id, &document, &ctx).await?;
        println!("  {}: {outcome:?}", document.reference_no);
    }

    println!("Backfilling paid rent invoice...");
    let paid = BackfillItem::new(
        tenant_id,
        BillingDocument::rent_invoice("INV-2025-0002", Decimal::from(1000), date(2025, 2, 1)?)
            .with_unit(Lookup::Loaded(DEMO_UNIT.to_string())),
    )
    .paid(PaymentRecord {
        paid_date: date(2025, 2, 3)?,
        payment_method: Some("bank_transfer".to_string()),
        transfer_reference_no: Some("TRX-20250203-01".to_string()),
    });
    let report = sync.backfill([paid], &ctx, false).await?;
    println!(
        "  processed {}, skipped {}, payments {}",
        report.processed, report.skipped, report.payments_recorded
    );

    let service = LedgerService::new(store, config.ledger);
    let adjustment = manual_adjustment()?;
    let entries = service.list_ledger(tenant_id, None).await?;
    if entries.iter().any(|e| e.description == adjustment.description) {
        println!("  Manual adjustment already exists, skipping...");
    } else {
        println!("Seeding manual adjustment...");
        service
            .record_entry(tenant_id, adjustment, ctx.created_by())
            .await?;
    }

    let summary = service.balance_summary(tenant_id).await?;
    info!(
        tenant_id = %tenant_id,
        balance = %summary.current_balance,
        entries = summary.entry_count,
        "Seeding complete"
    );
    println!(
        "Seeding complete! Tenant {tenant_id} balance {} ({:?})",
        summary.current_balance, summary.status
    );
    Ok(())
}

fn date(year: i32, month: u32, day: u32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| anyhow::anyhow!("invalid date {year}-{month}-{day}"))
}

fn demo_documents() -> anyhow::Result<Vec<BillingDocument>> {
    let unit = || Lookup::Loaded(DEMO_UNIT.to_string());
    Ok(vec![
        BillingDocument::rent_invoice("INV-2025-0001", Decimal::from(1000), date(2025, 1, 1)?)
            .with_unit(unit()),
        BillingDocument::maintenance_invoice("MI-2025-0001", Decimal::from(500), date(2025, 1, 5)?)
            .with_unit(unit())
            .with_free_text("Water heater replacement"),
        BillingDocument::rent_payment("INV-2025-0001", Decimal::from(1200), date(2025, 1, 10)?)
            .with_unit(unit())
            .with_payment(Some("cash".to_string()), None),
        BillingDocument::maintenance_cost(1, Decimal::from(150), date(2025, 1, 20)?)
            .with_unit(unit())
            .with_subject(Lookup::Loaded("Air Conditioner".to_string()))
            .with_free_text("Compressor repair")
            .with_remarks("Charged to tenant"),
    ])
}

fn manual_adjustment() -> anyhow::Result<ManualEntryInput> {
    Ok(ManualEntryInput {
        transaction_date: date(2025, 2, 15)?,
        debit_amount: Decimal::ZERO,
        credit_amount: Decimal::from(50),
        description: "Goodwill credit for delayed repair".to_string(),
        reference_no: None,
        category: Some(EntryCategory::Other),
        payment_method: None,
        transfer_reference_no: None,
        remarks: Some("Approved by property manager".to_string()),
    })
}
