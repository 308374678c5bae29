//! Application configuration management.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::AppResult;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger engine configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// How document synchronization failures are reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
    /// Failures are logged and swallowed; the document write stands.
    #[default]
    BestEffort,
    /// Failures are returned so the caller can abort the document write.
    Atomic,
}

/// How balances are restored after an existing entry is edited or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecomputeStrategy {
    /// Recompute forward from the touched position only.
    #[default]
    Cascade,
    /// Recompute the whole tenant ledger from a zero baseline.
    Full,
}

/// Ledger engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Error reporting policy for document synchronization.
    #[serde(default)]
    pub sync_policy: SyncPolicy,
    /// Recompute strategy after amount edits and deletions.
    #[serde(default)]
    pub recompute_strategy: RecomputeStrategy,
    /// Re-read and check running balances after every recompute.
    #[serde(default = "default_verify_after_recompute")]
    pub verify_after_recompute: bool,
    /// `created_by` value for entries written by the system.
    #[serde(default = "default_system_user")]
    pub system_user: String,
    /// Largest difference at which a payment still settles an invoice.
    #[serde(default = "default_payment_match_tolerance")]
    pub payment_match_tolerance: Decimal,
}

fn default_verify_after_recompute() -> bool {
    true
}

fn default_system_user() -> String {
    "System".to_string()
}

fn default_payment_match_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            sync_policy: SyncPolicy::default(),
            recompute_strategy: RecomputeStrategy::default(),
            verify_after_recompute: default_verify_after_recompute(),
            system_user: default_system_user(),
            payment_match_tolerance: default_payment_match_tolerance(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> AppResult<Self> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("TENANTBOOK").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
