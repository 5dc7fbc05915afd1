// crates/quota-gate-core/src/runtime/store.rs
// ============================================================================
// Module: Quota Gate In-Memory Store
// Description: In-memory ledger store and a shared store wrapper.
// Purpose: Provide a deterministic store without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryLedgerStore`] keeps the ledger for the lifetime of the process,
//! which suits tests and ephemeral runs. [`SharedLedgerStore`] wraps any store
//! behind an `Arc` so it can be handed to the orchestrator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use crate::core::ledger::UsageLedger;
use crate::interfaces::LedgerStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory ledger store for tests and ephemeral sessions.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLedgerStore {
    /// Stored ledger protected by a mutex.
    ledger: Arc<Mutex<Option<UsageLedger>>>,
}

impl InMemoryLedgerStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with a ledger.
    #[must_use]
    pub fn with_ledger(ledger: UsageLedger) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Some(ledger))),
        }
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn load(&self) -> Result<Option<UsageLedger>, StoreError> {
        let guard = self
            .ledger
            .lock()
            .map_err(|_| StoreError::Store("ledger store mutex poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, ledger: &UsageLedger) -> Result<(), StoreError> {
        *self
            .ledger
            .lock()
            .map_err(|_| StoreError::Store("ledger store mutex poisoned".to_string()))? =
            Some(ledger.clone());
        Ok(())
    }
}

// ============================================================================
// SECTION: Shared Store Wrapper
// ============================================================================

/// Shared ledger store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedLedgerStore {
    /// Inner store implementation.
    inner: Arc<dyn LedgerStore + Send + Sync>,
}

impl SharedLedgerStore {
    /// Wraps a ledger store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl LedgerStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn LedgerStore + Send + Sync>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl LedgerStore for SharedLedgerStore {
    fn load(&self) -> Result<Option<UsageLedger>, StoreError> {
        self.inner.load()
    }

    fn save(&self, ledger: &UsageLedger) -> Result<(), StoreError> {
        self.inner.save(ledger)
    }
}
