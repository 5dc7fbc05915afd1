// crates/quota-gate-orchestrator/src/lib.rs
// ============================================================================
// Module: Quota Gate Orchestrator Library
// Description: Async request sequencing around the governance core.
// Purpose: Cache, govern, back off, dispatch, and record one search request.
// Dependencies: quota-gate-core, quota-gate-config, reqwest, tokio
// ============================================================================

//! ## Overview
//! `quota-gate-orchestrator` owns the runtime side of Quota Gate: the
//! [`RequestOrchestrator`] that serializes every read-evaluate-mutate-persist
//! cycle behind one async lock, the [`DiscoveryClient`] that talks to the
//! upstream event API, the injected [`Clock`], and structured audit sinks.
//!
//! Nothing here is a global. Callers build one orchestrator per application
//! session (see [`bootstrap`]) and pass it to whatever surface needs it.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod bootstrap;
pub mod clock;
pub mod error;
pub mod orchestrator;
pub mod search;
pub mod transport;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::CallAuditEvent;
pub use audit::DecisionAuditEvent;
pub use audit::FileAuditSink;
pub use audit::GovernanceAuditSink;
pub use audit::NoopAuditSink;
pub use audit::PersistenceAuditEvent;
pub use audit::StderrAuditSink;
pub use bootstrap::BootstrapError;
pub use bootstrap::build_orchestrator;
pub use bootstrap::open_audit_sink;
pub use bootstrap::open_ledger_store;
pub use clock::Clock;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use error::SearchError;
pub use orchestrator::OrchestratorSettings;
pub use orchestrator::RequestOrchestrator;
pub use orchestrator::RequestOrigin;
pub use orchestrator::SearchOutcome;
pub use orchestrator::SearchRequest;
pub use orchestrator::UsageReport;
pub use search::DateRange;
pub use search::DateWindow;
pub use search::EVENTS_ENDPOINT;
pub use search::EventSearch;
pub use search::SearchLocation;
pub use transport::DiscoveryClient;
pub use transport::DiscoveryClientConfig;
pub use transport::SearchTransport;
pub use transport::TransportError;
