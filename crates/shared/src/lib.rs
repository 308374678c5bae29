//! Shared types, errors, and configuration for Tenantbook.
//!
//! This crate provides common types used across all other crates:
//! - Amount type with two-decimal precision
//! - Typed IDs for tenants and ledger entries
//! - Pagination types for ledger listings
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, LedgerConfig, RecomputeStrategy, SyncPolicy};
pub use error::{AppError, AppResult};
