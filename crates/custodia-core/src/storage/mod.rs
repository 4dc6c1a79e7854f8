//! # Storage Module
//!
//! Persistent storage backends for the governance ledger.

pub mod redb_ledger;

pub use redb_ledger::RedbLedger;
