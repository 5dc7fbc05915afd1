// crates/quota-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Ledger Store
// Description: Durable LedgerStore backend using SQLite WAL.
// Purpose: Persist the usage ledger across process restarts.
// Dependencies: quota-gate-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`quota_gate_core::LedgerStore`] that
//! keeps the usage ledger as a single keyed record of canonical JSON with an
//! integrity hash. Stored contents are treated as untrusted on load.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::DEFAULT_STORAGE_KEY;
pub use store::MAX_LEDGER_BYTES;
pub use store::SqliteLedgerStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
