// crates/quota-gate-core/src/lib.rs
// ============================================================================
// Module: Quota Gate Core Library
// Description: Public API surface for the Quota Gate governance core.
// Purpose: Expose ledger types, the persistence interface, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Quota Gate core decides, for every outbound call to a rate-limited search
//! API, whether the call may proceed, needs user confirmation, or is blocked.
//! It keeps cross-session usage accounting in a [`UsageLedger`] persisted
//! through [`LedgerStore`]. The core is deterministic: callers pass `now`
//! explicitly and perform network I/O themselves.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::LedgerStore;
pub use interfaces::StoreError;
pub use runtime::CircuitBreaker;
pub use runtime::Governed;
pub use runtime::GovernedRequest;
pub use runtime::InMemoryLedgerStore;
pub use runtime::LedgerKeeper;
pub use runtime::LedgerOperation;
pub use runtime::PersistenceFault;
pub use runtime::RateGovernor;
pub use runtime::ResponseCache;
pub use runtime::SharedLedgerStore;
