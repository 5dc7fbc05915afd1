// crates/quota-gate-core/src/runtime/keeper.rs
// ============================================================================
// Module: Ledger Keeper
// Description: Owns the in-memory ledger and persists after every mutation.
// Purpose: Single mutation point for the ledger with fail-soft persistence.
// Dependencies: crate::core, crate::interfaces, crate::runtime::store
// ============================================================================

//! ## Overview
//! [`LedgerKeeper`] pairs the authoritative in-memory [`UsageLedger`] with a
//! [`LedgerStore`]. Every mutation is applied in memory first and then saved.
//! A failed load or save never propagates as an error: it is returned as a
//! [`PersistenceFault`] for the host to log, and governance carries on with
//! the in-memory state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use time::Date;

use crate::core::fingerprint::Fingerprint;
use crate::core::identifiers::EndpointId;
use crate::core::ledger::UsageLedger;
use crate::core::policy::GovernancePolicy;
use crate::core::time::CalendarDate;
use crate::core::time::Timestamp;
use crate::interfaces::LedgerStore;
use crate::interfaces::StoreError;
use crate::runtime::store::SharedLedgerStore;

// ============================================================================
// SECTION: Persistence Faults
// ============================================================================

/// Ledger operation that touched storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerOperation {
    /// Initial load.
    Load,
    /// Day rollover.
    Rollover,
    /// Call recording.
    RecordCall,
    /// Lockout imposed or cleared.
    Lockout,
    /// Session reset.
    ResetSession,
}

impl LedgerOperation {
    /// Returns a stable label for the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Rollover => "rollover",
            Self::RecordCall => "record_call",
            Self::Lockout => "lockout",
            Self::ResetSession => "reset_session",
        }
    }
}

/// Storage failure observed while keeping the ledger.
#[derive(Debug)]
pub struct PersistenceFault {
    /// Operation that failed to persist.
    pub operation: LedgerOperation,
    /// Underlying store error.
    pub error: StoreError,
}

// ============================================================================
// SECTION: Ledger Keeper
// ============================================================================

/// Authoritative in-memory ledger plus its backing store.
#[derive(Clone)]
pub struct LedgerKeeper {
    /// In-memory ledger.
    ledger: UsageLedger,
    /// Backing store.
    store: SharedLedgerStore,
}

impl LedgerKeeper {
    /// Loads the ledger from `store`, falling back to a fresh ledger.
    ///
    /// Absent or unreadable state yields a zeroed ledger dated `now`; the
    /// read error, if any, is returned alongside for logging.
    #[must_use]
    pub fn open(
        store: SharedLedgerStore,
        policy: &GovernancePolicy,
        now: Timestamp,
    ) -> (Self, Option<PersistenceFault>) {
        let today = now.local_date(policy.local_offset).unwrap_or(CalendarDate::new(Date::MIN));
        let (ledger, fault) = match store.load() {
            Ok(Some(mut ledger)) => {
                ledger.set_capacity(policy.recent_calls_capacity);
                (ledger, None)
            }
            Ok(None) => (UsageLedger::fresh(today, policy.recent_calls_capacity), None),
            Err(error) => (
                UsageLedger::fresh(today, policy.recent_calls_capacity),
                Some(PersistenceFault {
                    operation: LedgerOperation::Load,
                    error,
                }),
            ),
        };
        (
            Self {
                ledger,
                store,
            },
            fault,
        )
    }

    /// Returns the in-memory ledger.
    #[must_use]
    pub const fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    /// Rolls the ledger over when `now` is on a new local day.
    #[must_use]
    pub fn rollover_if_new_day(
        &mut self,
        now: Timestamp,
        policy: &GovernancePolicy,
    ) -> Option<PersistenceFault> {
        if self.ledger.rollover_if_new_day(now, policy.local_offset) {
            return self.persist(LedgerOperation::Rollover);
        }
        None
    }

    /// Records a dispatched call and persists the ledger.
    #[must_use]
    pub fn record_call(
        &mut self,
        endpoint_id: EndpointId,
        fingerprint: Fingerprint,
        succeeded: bool,
        now: Timestamp,
    ) -> Option<PersistenceFault> {
        self.ledger.record_call(endpoint_id, fingerprint, succeeded, now);
        self.persist(LedgerOperation::RecordCall)
    }

    /// Imposes a lockout and persists the ledger.
    #[must_use]
    pub fn set_blocked_until(&mut self, until: Timestamp) -> Option<PersistenceFault> {
        self.ledger.set_blocked_until(until);
        self.persist(LedgerOperation::Lockout)
    }

    /// Clears an expired lockout, persisting only when something changed.
    #[must_use]
    pub fn clear_block_if_expired(&mut self, now: Timestamp) -> Option<PersistenceFault> {
        if self.ledger.clear_block_if_expired(now) {
            return self.persist(LedgerOperation::Lockout);
        }
        None
    }

    /// Resets the session counters and persists the ledger.
    #[must_use]
    pub fn reset_session(&mut self) -> Option<PersistenceFault> {
        self.ledger.reset_session();
        self.persist(LedgerOperation::ResetSession)
    }

    /// Saves the current ledger.
    fn persist(&self, operation: LedgerOperation) -> Option<PersistenceFault> {
        self.store.save(&self.ledger).err().map(|error| PersistenceFault {
            operation,
            error,
        })
    }
}
