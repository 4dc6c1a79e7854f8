//! # Formats Module
//!
//! Serialization formats for ledger snapshots.

pub mod persistence;

pub use persistence::{PersistenceHeader, ledger_from_bytes, ledger_to_bytes};
