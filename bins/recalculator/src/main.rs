//! Tenant ledger balance recalculation.
//!
//! Walks every entry of one tenant (or all tenants) in `(transaction_date, id)`
//! order and rewrites stored running balances that drifted. With `--dry-run`
//! the changes are only reported.
//!
//! Usage: recalculator [--tenant-id <UUID>] [--dry-run]

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tenantbook_core::ledger::{LedgerService, RecalculationReport};
use tenantbook_db::{SeaOrmLedgerStore, connect};
use tenantbook_shared::AppConfig;
use tenantbook_shared::types::TenantId;

#[derive(Parser)]
#[command(name = "recalculator")]
#[command(about = "Recalculate running balances of tenant ledgers")]
struct Cli {
    /// Only recalculate this tenant.
    #[arg(long)]
    tenant_id: Option<TenantId>,

    /// Report changes without writing them.
    #[arg(long)]
    dry_run: bool,
}

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

    let cli = Cli::parse();
    let config = AppConfig::load()?;

    let db = connect(&config.database).await?;
    let store = Arc::new(SeaOrmLedgerStore::new(db));
    let service = LedgerService::new(store, config.ledger);

    let reports = match cli.tenant_id {
        Some(tenant_id) => vec![service.recalculate(tenant_id, cli.dry_run).await?],
        None => service.recalculate_all(cli.dry_run).await?,
    };

    let mut changed = 0;
    for report in &reports {
        print_report(report);
        changed += report.changes.len();
    }

    info!(
        tenants = reports.len(),
        changed,
        dry_run = cli.dry_run,
        "Recalculation finished"
    );
    if cli.dry_run && changed > 0 {
        println!("Dry run: {changed} balance(s) would change. Run without --dry-run to apply.");
    }
    Ok(())
}

fn print_report(report: &RecalculationReport) {
    println!(
        "Tenant {}: {} entries, final balance {}",
        report.tenant_id, report.entries_examined, report.final_balance
    );
    for change in &report.changes {
        println!("  entry {}: {} -> {}", change.id, change.old, change.new);
    }
}
