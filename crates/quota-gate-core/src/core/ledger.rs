// crates/quota-gate-core/src/core/ledger.rs
// ============================================================================
// Module: Usage Ledger
// Description: Durable call history and day/session counters.
// Purpose: Hold the state every governance decision is derived from.
// Dependencies: serde, crate::core::{identifiers, fingerprint, time}
// ============================================================================

//! ## Overview
//! The [`UsageLedger`] is the persisted, process-wide usage record. It counts
//! calls per local calendar day and per session, keeps a bounded FIFO history
//! of recent [`CallRecord`]s for duplicate and rapid-fire detection, and holds
//! an optional lockout stamp.
//!
//! The serialized form is the persisted schema: camelCase fields, millisecond
//! timestamps, and an ISO calendar date for `lastResetDate`.
//!
//! `dailyCount >= sessionCount` is not an invariant. The two counters live on
//! overlapping but distinct lifecycles.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;

use serde::Deserialize;
use serde::Serialize;

use crate::core::fingerprint::Fingerprint;
use crate::core::identifiers::EndpointId;
use crate::core::policy::DEFAULT_RECENT_CALLS_CAPACITY;
use crate::core::time::CalendarDate;
use crate::core::time::LocalOffset;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Call Record
// ============================================================================

/// One dispatched upstream call.
///
/// # Invariants
/// - Immutable once created; only ever appended to the ledger history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Dispatch time.
    pub timestamp: Timestamp,
    /// Endpoint that was called.
    #[serde(rename = "endpoint")]
    pub endpoint_id: EndpointId,
    /// Canonical request parameters.
    #[serde(rename = "params")]
    pub fingerprint: Fingerprint,
    /// Whether the call succeeded.
    #[serde(rename = "success")]
    pub succeeded: bool,
}

impl CallRecord {
    /// Returns true when the record matches the endpoint and fingerprint.
    #[must_use]
    pub fn matches(&self, endpoint_id: &EndpointId, fingerprint: &Fingerprint) -> bool {
        self.endpoint_id == *endpoint_id && self.fingerprint == *fingerprint
    }
}

// ============================================================================
// SECTION: Usage Ledger
// ============================================================================

/// Persisted usage state for one installation.
///
/// # Invariants
/// - `recent_calls.len() <= capacity` after every public operation.
/// - `blocked_until`, when set through [`UsageLedger::set_blocked_until`], is
///   later than the `now` supplied by the caller that set it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLedger {
    /// Calls recorded since the last day rollover.
    daily_count: u64,
    /// Calls recorded since the last session reset.
    session_count: u64,
    /// Local date the counters were last zeroed.
    last_reset_date: CalendarDate,
    /// Most recent calls, oldest first.
    recent_calls: VecDeque<CallRecord>,
    /// Active lockout expiry, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    blocked_until: Option<Timestamp>,
    /// History capacity (not persisted).
    #[serde(skip, default = "default_capacity")]
    capacity: usize,
}

/// Returns the default history capacity for deserialized ledgers.
const fn default_capacity() -> usize {
    DEFAULT_RECENT_CALLS_CAPACITY
}

impl UsageLedger {
    /// Creates a zeroed ledger whose counters were last reset on `today`.
    #[must_use]
    pub fn fresh(today: CalendarDate, capacity: usize) -> Self {
        Self {
            daily_count: 0,
            session_count: 0,
            last_reset_date: today,
            recent_calls: VecDeque::with_capacity(capacity.min(DEFAULT_RECENT_CALLS_CAPACITY)),
            blocked_until: None,
            capacity,
        }
    }

    /// Applies a history capacity and trims the oldest records beyond it.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.trim();
    }

    /// Returns calls recorded since the last day rollover.
    #[must_use]
    pub const fn daily_count(&self) -> u64 {
        self.daily_count
    }

    /// Returns calls recorded since the last session reset.
    #[must_use]
    pub const fn session_count(&self) -> u64 {
        self.session_count
    }

    /// Returns the date the counters were last zeroed.
    #[must_use]
    pub const fn last_reset_date(&self) -> CalendarDate {
        self.last_reset_date
    }

    /// Returns the retained call history, oldest first.
    #[must_use]
    pub const fn recent_calls(&self) -> &VecDeque<CallRecord> {
        &self.recent_calls
    }

    /// Returns the active lockout expiry, if any.
    #[must_use]
    pub const fn blocked_until(&self) -> Option<Timestamp> {
        self.blocked_until
    }

    /// Returns the history capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Zeroes day-scoped state when `now` falls on a later local date.
    ///
    /// Returns true when a rollover happened. Idempotent within a day.
    pub fn rollover_if_new_day(&mut self, now: Timestamp, offset: LocalOffset) -> bool {
        let Some(today) = now.local_date(offset) else {
            return false;
        };
        if today == self.last_reset_date {
            return false;
        }
        self.daily_count = 0;
        self.session_count = 0;
        self.recent_calls.clear();
        self.blocked_until = None;
        self.last_reset_date = today;
        true
    }

    /// Appends a call record and increments both counters.
    pub fn record_call(
        &mut self,
        endpoint_id: EndpointId,
        fingerprint: Fingerprint,
        succeeded: bool,
        now: Timestamp,
    ) {
        self.recent_calls.push_back(CallRecord {
            timestamp: now,
            endpoint_id,
            fingerprint,
            succeeded,
        });
        self.daily_count = self.daily_count.saturating_add(1);
        self.session_count = self.session_count.saturating_add(1);
        self.trim();
    }

    /// Zeroes the session counter and clears history and lockout.
    ///
    /// The daily counter is untouched.
    pub fn reset_session(&mut self) {
        self.session_count = 0;
        self.recent_calls.clear();
        self.blocked_until = None;
    }

    /// Sets the lockout expiry.
    pub const fn set_blocked_until(&mut self, until: Timestamp) {
        self.blocked_until = Some(until);
    }

    /// Clears the lockout when it has expired at `now`.
    ///
    /// Returns true when a stale lockout was cleared.
    pub fn clear_block_if_expired(&mut self, now: Timestamp) -> bool {
        match self.blocked_until {
            Some(until) if now >= until => {
                self.blocked_until = None;
                true
            }
            _ => false,
        }
    }

    /// Returns true when a lockout is active at `now`.
    #[must_use]
    pub fn is_blocked_at(&self, now: Timestamp) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }

    /// Drops the oldest records beyond capacity.
    fn trim(&mut self) {
        while self.recent_calls.len() > self.capacity {
            self.recent_calls.pop_front();
        }
    }
}
