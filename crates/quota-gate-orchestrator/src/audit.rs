// crates/quota-gate-orchestrator/src/audit.rs
// ============================================================================
// Module: Governance Audit Logging
// Description: Structured audit events for governed search requests.
// Purpose: Emit redacted JSON-line logs without a logging framework.
// Dependencies: quota-gate-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Every governed request emits a `governance_decision` event, every
//! dispatched call a `search_call` event, and every storage failure a
//! `persistence_degraded` event. Events are serialized as one JSON object per
//! line so they can be routed to any log pipeline.
//!
//! Request parameters are logged only as the SHA-256 digest of their
//! fingerprint; the API key never reaches this module.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use quota_gate_core::EndpointId;
use quota_gate_core::Fingerprint;
use quota_gate_core::GovernanceDecision;
use quota_gate_core::HashDigest;
use quota_gate_core::PersistenceFault;
use quota_gate_core::Timestamp;
use quota_gate_core::UsageSnapshot;
use serde::Serialize;

use crate::orchestrator::RequestOrigin;
use crate::transport::TransportError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome of one governance evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionAuditEvent {
    /// Event name (`governance_decision`).
    pub event: &'static str,
    /// Decision time in unix milliseconds.
    pub timestamp_ms: i64,
    /// Endpoint requested.
    pub endpoint: String,
    /// Digest of the request fingerprint.
    pub fingerprint_hash: HashDigest,
    /// Request origin.
    pub origin: RequestOrigin,
    /// Decision label.
    pub decision: &'static str,
    /// Block rule label when blocked.
    pub rule: Option<&'static str>,
    /// User-facing reason when not allowed.
    pub reason: Option<String>,
    /// Usage at decision time.
    pub usage: UsageSnapshot,
    /// True when served from the response cache.
    pub cache_hit: bool,
}

impl DecisionAuditEvent {
    /// Builds a decision event.
    #[must_use]
    pub fn new(
        endpoint_id: &EndpointId,
        fingerprint: &Fingerprint,
        origin: RequestOrigin,
        decision: &GovernanceDecision,
        cache_hit: bool,
        now: Timestamp,
    ) -> Self {
        Self {
            event: "governance_decision",
            timestamp_ms: now.as_unix_millis(),
            endpoint: endpoint_id.as_str().to_string(),
            fingerprint_hash: fingerprint.digest(),
            origin,
            decision: decision.label(),
            rule: decision.block_rule().map(|rule| rule.as_str()),
            reason: decision.reason().map(str::to_string),
            usage: *decision.usage(),
            cache_hit,
        }
    }
}

/// Outcome of one dispatched network call.
#[derive(Debug, Clone, Serialize)]
pub struct CallAuditEvent {
    /// Event name (`search_call`).
    pub event: &'static str,
    /// Completion time in unix milliseconds.
    pub timestamp_ms: i64,
    /// Endpoint requested.
    pub endpoint: String,
    /// Digest of the request fingerprint.
    pub fingerprint_hash: HashDigest,
    /// `ok` or `error`.
    pub outcome: &'static str,
    /// Failure kind label on error.
    pub failure_kind: Option<&'static str>,
    /// Upstream status on an upstream failure.
    pub status: Option<u16>,
    /// Call latency in milliseconds.
    pub latency_ms: u64,
    /// Consecutive failures after this call.
    pub consecutive_failures: u32,
}

impl CallAuditEvent {
    /// Builds a call event.
    #[must_use]
    pub fn new(
        endpoint_id: &EndpointId,
        fingerprint: &Fingerprint,
        failure: Option<&TransportError>,
        latency_ms: u64,
        consecutive_failures: u32,
        now: Timestamp,
    ) -> Self {
        Self {
            event: "search_call",
            timestamp_ms: now.as_unix_millis(),
            endpoint: endpoint_id.as_str().to_string(),
            fingerprint_hash: fingerprint.digest(),
            outcome: if failure.is_some() { "error" } else { "ok" },
            failure_kind: failure.map(TransportError::kind),
            status: failure.and_then(TransportError::status),
            latency_ms,
            consecutive_failures,
        }
    }
}

/// Ledger storage failure; governance continued in memory.
#[derive(Debug, Clone, Serialize)]
pub struct PersistenceAuditEvent {
    /// Event name (`persistence_degraded`).
    pub event: &'static str,
    /// Observation time in unix milliseconds.
    pub timestamp_ms: i64,
    /// Ledger operation that failed.
    pub operation: &'static str,
    /// Store error message.
    pub message: String,
}

impl PersistenceAuditEvent {
    /// Builds a persistence event from a keeper fault.
    #[must_use]
    pub fn new(fault: &PersistenceFault, now: Timestamp) -> Self {
        Self {
            event: "persistence_degraded",
            timestamp_ms: now.as_unix_millis(),
            operation: fault.operation.as_str(),
            message: fault.error.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for governance events.
pub trait GovernanceAuditSink: Send + Sync {
    /// Records a governance decision.
    fn record_decision(&self, event: &DecisionAuditEvent);

    /// Records a dispatched call.
    fn record_call(&self, event: &CallAuditEvent);

    /// Records a persistence failure.
    fn record_persistence(&self, event: &PersistenceAuditEvent);
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink writing JSON lines to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrAuditSink;

impl GovernanceAuditSink for StderrAuditSink {
    fn record_decision(&self, event: &DecisionAuditEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_call(&self, event: &CallAuditEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_persistence(&self, event: &PersistenceAuditEvent) {
        write_line(&mut io::stderr(), event);
    }
}

/// Audit sink appending JSON lines to a file.
#[derive(Debug)]
pub struct FileAuditSink {
    /// Append-only log file.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens (or creates) the log file for appending.
    ///
    /// # Errors
    ///
    /// Returns [`io::Error`] when the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Writes one event under the file lock.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(mut file) = self.file.lock() {
            write_line(&mut *file, event);
            let _ = file.flush();
        }
    }
}

impl GovernanceAuditSink for FileAuditSink {
    fn record_decision(&self, event: &DecisionAuditEvent) {
        self.append(event);
    }

    fn record_call(&self, event: &CallAuditEvent) {
        self.append(event);
    }

    fn record_persistence(&self, event: &PersistenceAuditEvent) {
        self.append(event);
    }
}

/// Audit sink that discards events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl GovernanceAuditSink for NoopAuditSink {
    fn record_decision(&self, _event: &DecisionAuditEvent) {}

    fn record_call(&self, _event: &CallAuditEvent) {}

    fn record_persistence(&self, _event: &PersistenceAuditEvent) {}
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Serializes `event` as one JSON line; failures are dropped.
fn write_line<W: Write, T: Serialize>(writer: &mut W, event: &T) {
    if let Ok(payload) = serde_json::to_string(event) {
        let _ = writeln!(writer, "{payload}");
    }
}
