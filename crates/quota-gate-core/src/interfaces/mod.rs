// crates/quota-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Quota Gate Interfaces
// Description: Backend-agnostic persistence interface for the usage ledger.
// Purpose: Define the contract surface between governance and storage.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The governance core persists the [`UsageLedger`] through [`LedgerStore`].
//! Stores hold a single keyed record. Store failures are reported, never
//! fatal: the in-memory ledger stays authoritative for the process.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::ledger::UsageLedger;

// ============================================================================
// SECTION: Ledger Store
// ============================================================================

/// Ledger store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error (storage unavailable).
    #[error("ledger store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("ledger store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("ledger store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data is invalid or exceeds limits (quota exceeded).
    #[error("ledger store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("ledger store error: {0}")]
    Store(String),
}

/// Durable storage for the usage ledger.
pub trait LedgerStore {
    /// Loads the persisted ledger, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn load(&self) -> Result<Option<UsageLedger>, StoreError>;

    /// Persists the ledger, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when saving fails.
    fn save(&self, ledger: &UsageLedger) -> Result<(), StoreError>;
}
