// crates/quota-gate-core/tests/common/mod.rs
// ============================================================================
// Module: Shared Test Helpers
// Description: Fixture builders for ledgers, requests, and timestamps.
// ============================================================================
//! ## Overview
//! Helpers shared by the governance integration tests.

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Shared fixtures are used by a subset of test binaries."
)]

use quota_gate_core::CalendarDate;
use quota_gate_core::EndpointId;
use quota_gate_core::Fingerprint;
use quota_gate_core::GovernancePolicy;
use quota_gate_core::InMemoryLedgerStore;
use quota_gate_core::LedgerKeeper;
use quota_gate_core::LocalOffset;
use quota_gate_core::RequestParams;
use quota_gate_core::SharedLedgerStore;
use quota_gate_core::Timestamp;
use quota_gate_core::UsageLedger;
use serde_json::Value;
use time::Date;
use time::Month;

/// Endpoint used by every governance test.
pub fn events_endpoint() -> EndpointId {
    EndpointId::new("events.json")
}

/// Returns local midnight (UTC) of the given January 2026 day.
pub fn jan(day: u8) -> Timestamp {
    let date = Date::from_calendar_date(2026, Month::January, day).expect("valid date");
    LocalOffset::UTC.midnight_of(CalendarDate::new(date))
}

/// Returns `base` shifted forward by whole seconds.
pub fn plus_secs(base: Timestamp, seconds: u64) -> Timestamp {
    base.saturating_add_millis(seconds * 1_000)
}

/// Fingerprint for a postal code search.
pub fn zip_fingerprint(zip: &str) -> Fingerprint {
    RequestParams::new()
        .with("postalCode", zip)
        .with("radius", "25")
        .fingerprint()
        .expect("fingerprint")
}

/// Builds a ledger from its persisted JSON form.
pub fn ledger_from(value: Value) -> UsageLedger {
    serde_json::from_value(value).expect("ledger json")
}

/// Opens a keeper over an in-memory store seeded with `ledger`.
pub fn keeper_with(ledger: UsageLedger, now: Timestamp) -> LedgerKeeper {
    let store = SharedLedgerStore::from_store(InMemoryLedgerStore::with_ledger(ledger));
    let (keeper, fault) = LedgerKeeper::open(store, &GovernancePolicy::default(), now);
    assert!(fault.is_none());
    keeper
}

/// Opens a keeper over an empty in-memory store.
pub fn fresh_keeper(now: Timestamp) -> LedgerKeeper {
    let store = SharedLedgerStore::from_store(InMemoryLedgerStore::new());
    let (keeper, fault) = LedgerKeeper::open(store, &GovernancePolicy::default(), now);
    assert!(fault.is_none());
    keeper
}
