//! Repository implementations backed by `SeaORM`.

pub mod ledger;

pub use ledger::{SeaOrmLedgerScope, SeaOrmLedgerStore, store_error, to_entry};
