//! Core business logic for Tenantbook.
//!
//! This crate contains the tenant ledger engine with ZERO web or database
//! dependencies. Persistence is reached only through the [`ledger::LedgerStore`]
//! trait, which the database crate implements.
//!
//! # Modules
//!
//! - `ledger` - Ledger entries, running balances, recomputation, queries
//! - `sync` - Billing document synchronization into the ledger

pub mod ledger;
pub mod sync;
