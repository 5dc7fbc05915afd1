// crates/quota-gate-orchestrator/tests/common/mod.rs
// ============================================================================
// Module: Shared Orchestrator Test Helpers
// Description: Scripted transport, recording audit sink, and builders.
// ============================================================================
//! ## Overview
//! Helpers shared by the orchestrator integration tests.

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Shared fixtures are used by a subset of test binaries."
)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use quota_gate_core::CalendarDate;
use quota_gate_core::EndpointId;
use quota_gate_core::InMemoryLedgerStore;
use quota_gate_core::LedgerStore;
use quota_gate_core::LocalOffset;
use quota_gate_core::RequestParams;
use quota_gate_core::SharedLedgerStore;
use quota_gate_core::StoreError;
use quota_gate_core::Timestamp;
use quota_gate_core::UsageLedger;
use quota_gate_orchestrator::CallAuditEvent;
use quota_gate_orchestrator::DecisionAuditEvent;
use quota_gate_orchestrator::GovernanceAuditSink;
use quota_gate_orchestrator::ManualClock;
use quota_gate_orchestrator::OrchestratorSettings;
use quota_gate_orchestrator::PersistenceAuditEvent;
use quota_gate_orchestrator::RequestOrchestrator;
use quota_gate_orchestrator::SearchRequest;
use quota_gate_orchestrator::SearchTransport;
use quota_gate_orchestrator::TransportError;
use serde_json::Value;
use serde_json::json;
use time::Date;
use time::Month;

// ============================================================================
// SECTION: Time
// ============================================================================

/// Local midnight (UTC) on 2026-01-05.
pub fn start() -> Timestamp {
    let date = Date::from_calendar_date(2026, Month::January, 5).expect("valid date");
    LocalOffset::UTC.midnight_of(CalendarDate::new(date))
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Endpoint used by every orchestrator test.
pub fn events_endpoint() -> EndpointId {
    EndpointId::new("events.json")
}

/// Parameters for a postal code search.
pub fn zip_params(zip: &str) -> RequestParams {
    RequestParams::new().with("postalCode", zip).with("radius", "25").with("unit", "miles")
}

/// User-initiated search for a postal code.
pub fn user_search(zip: &str) -> SearchRequest {
    SearchRequest::user(events_endpoint(), zip_params(zip))
}

/// Automatic search for a postal code.
pub fn automatic_search(zip: &str) -> SearchRequest {
    SearchRequest::automatic(events_endpoint(), zip_params(zip))
}

/// Sample upstream payload.
pub fn events_payload(name: &str) -> Value {
    json!({"_embedded": {"events": [{"name": name}]}, "page": {"totalElements": 1}})
}

// ============================================================================
// SECTION: Transport
// ============================================================================

/// Transport returning scripted results, then a default payload.
#[derive(Default)]
pub struct ScriptedTransport {
    /// Results handed out in order.
    script: Mutex<VecDeque<Result<Value, TransportError>>>,
    /// Number of dispatched calls.
    calls: AtomicUsize,
    /// Simulated latency per call.
    latency: Duration,
}

impl ScriptedTransport {
    /// Transport that always succeeds.
    pub fn ok() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Transport that plays `script` first.
    pub fn scripted(script: Vec<Result<Value, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        })
    }

    /// Transport whose calls take `latency`.
    pub fn slow(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            ..Self::default()
        })
    }

    /// Number of dispatched calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchTransport for ScriptedTransport {
    async fn search(
        &self,
        _endpoint_id: &EndpointId,
        params: &RequestParams,
    ) -> Result<Value, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            let label = params.get("postalCode").and_then(Value::as_str).unwrap_or("none");
            Ok(events_payload(label))
        })
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink keeping every event in memory.
#[derive(Default)]
pub struct RecordingAuditSink {
    /// Decision events.
    pub decisions: Mutex<Vec<DecisionAuditEvent>>,
    /// Call events.
    pub calls: Mutex<Vec<CallAuditEvent>>,
    /// Persistence events.
    pub persistence: Mutex<Vec<PersistenceAuditEvent>>,
}

impl GovernanceAuditSink for RecordingAuditSink {
    fn record_decision(&self, event: &DecisionAuditEvent) {
        self.decisions.lock().unwrap().push(event.clone());
    }

    fn record_call(&self, event: &CallAuditEvent) {
        self.calls.lock().unwrap().push(event.clone());
    }

    fn record_persistence(&self, event: &PersistenceAuditEvent) {
        self.persistence.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// SECTION: Stores
// ============================================================================

/// Store that loads nothing and fails every save.
pub struct FailingStore;

impl LedgerStore for FailingStore {
    fn load(&self) -> Result<Option<UsageLedger>, StoreError> {
        Ok(None)
    }

    fn save(&self, _ledger: &UsageLedger) -> Result<(), StoreError> {
        Err(StoreError::Io("disk full".to_string()))
    }
}

/// Builds a ledger from its persisted JSON form.
pub fn ledger_from(value: Value) -> UsageLedger {
    serde_json::from_value(value).expect("ledger json")
}

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Orchestrator plus handles to its collaborators.
pub struct Harness {
    /// Orchestrator under test.
    pub orchestrator: RequestOrchestrator,
    /// Scripted transport.
    pub transport: Arc<ScriptedTransport>,
    /// Manual clock.
    pub clock: Arc<ManualClock>,
    /// Recording audit sink.
    pub audit: Arc<RecordingAuditSink>,
    /// Backing store.
    pub store: SharedLedgerStore,
}

impl Harness {
    /// Harness with default settings and a fresh in-memory ledger.
    pub fn new(transport: Arc<ScriptedTransport>) -> Self {
        Self::with_store(transport, SharedLedgerStore::from_store(InMemoryLedgerStore::new()))
    }

    /// Harness backed by `store`.
    pub fn with_store(transport: Arc<ScriptedTransport>, store: SharedLedgerStore) -> Self {
        Self::with_settings(transport, store, OrchestratorSettings::default())
    }

    /// Harness with explicit settings.
    pub fn with_settings(
        transport: Arc<ScriptedTransport>,
        store: SharedLedgerStore,
        settings: OrchestratorSettings,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(start()));
        let audit = Arc::new(RecordingAuditSink::default());
        let orchestrator = RequestOrchestrator::new(
            settings,
            store.clone(),
            transport.clone(),
            clock.clone(),
            audit.clone(),
        );
        Self {
            orchestrator,
            transport,
            clock,
            audit,
            store,
        }
    }
}
