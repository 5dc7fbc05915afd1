// crates/quota-gate-orchestrator/src/bootstrap.rs
// ============================================================================
// Module: Bootstrap
// Description: Builds runtime components from a validated configuration.
// Purpose: Keep wiring in one place so surfaces stay thin.
// Dependencies: quota-gate-config, quota-gate-core, quota-gate-store-sqlite
// ============================================================================

//! ## Overview
//! Turns a [`QuotaGateConfig`] into a ledger store, an audit sink, and a
//! ready [`RequestOrchestrator`]. Store and sink construction are exposed
//! separately so offline commands can read the ledger without an API key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use quota_gate_config::AuditConfig;
use quota_gate_config::AuditSinkType;
use quota_gate_config::QuotaGateConfig;
use quota_gate_config::StoreConfig;
use quota_gate_config::StoreType;
use quota_gate_core::InMemoryLedgerStore;
use quota_gate_core::LedgerOperation;
use quota_gate_core::PersistenceFault;
use quota_gate_core::SharedLedgerStore;
use quota_gate_core::StoreError;
use quota_gate_store_sqlite::SqliteLedgerStore;
use thiserror::Error;

use crate::audit::FileAuditSink;
use crate::audit::GovernanceAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::PersistenceAuditEvent;
use crate::audit::StderrAuditSink;
use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::orchestrator::OrchestratorSettings;
use crate::orchestrator::RequestOrchestrator;
use crate::transport::DiscoveryClient;
use crate::transport::DiscoveryClientConfig;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while wiring runtime components.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration could not be applied.
    #[error("config error: {0}")]
    Config(String),
    /// Discovery client could not be built.
    #[error("transport error: {0}")]
    Transport(String),
    /// Audit sink could not be opened.
    #[error("audit error: {0}")]
    Audit(String),
}

// ============================================================================
// SECTION: Settings
// ============================================================================

impl OrchestratorSettings {
    /// Collects orchestrator policies from configuration.
    #[must_use]
    pub const fn from_config(config: &QuotaGateConfig) -> Self {
        Self {
            governance: config.governance.policy(),
            breaker: config.breaker.policy(),
            cache: config.cache.policy(),
            reset_session_on_start: config.governance.reset_session_on_start,
        }
    }
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Opens the configured ledger store.
///
/// A `SQLite` store that cannot be opened falls back to an in-memory store
/// for the rest of the process. The returned fault records the failure as a
/// [`LedgerOperation::Load`] so callers can log it as degraded persistence.
///
/// # Errors
///
/// Returns [`BootstrapError::Config`] when the `SQLite` store has no path.
pub fn open_ledger_store(
    config: &StoreConfig,
) -> Result<(SharedLedgerStore, Option<PersistenceFault>), BootstrapError> {
    match config.store_type {
        StoreType::Memory => Ok((SharedLedgerStore::from_store(InMemoryLedgerStore::new()), None)),
        StoreType::Sqlite => {
            let sqlite = config.sqlite_config().ok_or_else(|| {
                BootstrapError::Config("sqlite store requires path".to_string())
            })?;
            match SqliteLedgerStore::new(sqlite) {
                Ok(store) => Ok((SharedLedgerStore::from_store(store), None)),
                Err(err) => Ok((
                    SharedLedgerStore::from_store(InMemoryLedgerStore::new()),
                    Some(PersistenceFault {
                        operation: LedgerOperation::Load,
                        error: StoreError::from(err),
                    }),
                )),
            }
        }
    }
}

/// Opens the configured audit sink.
///
/// # Errors
///
/// Returns [`BootstrapError::Audit`] when the log file cannot be opened.
pub fn open_audit_sink(
    config: &AuditConfig,
) -> Result<Arc<dyn GovernanceAuditSink>, BootstrapError> {
    match config.sink {
        AuditSinkType::Stderr => Ok(Arc::new(StderrAuditSink)),
        AuditSinkType::None => Ok(Arc::new(NoopAuditSink)),
        AuditSinkType::File => {
            let path = config.path.as_ref().ok_or_else(|| {
                BootstrapError::Config("file audit sink requires audit.path".to_string())
            })?;
            let sink = FileAuditSink::new(path).map_err(|err| BootstrapError::Audit(err.to_string()))?;
            Ok(Arc::new(sink))
        }
    }
}

/// Builds an orchestrator talking to the configured discovery API.
///
/// # Errors
///
/// Returns [`BootstrapError`] when the API key is missing, the client cannot
/// be built, or the audit sink cannot be opened. An unusable ledger store
/// only degrades persistence.
pub fn build_orchestrator(config: &QuotaGateConfig) -> Result<RequestOrchestrator, BootstrapError> {
    let client_config = DiscoveryClientConfig::from_upstream(&config.upstream)
        .map_err(|err| BootstrapError::Config(err.to_string()))?;
    let transport =
        DiscoveryClient::new(client_config).map_err(|err| BootstrapError::Transport(err.to_string()))?;
    let (store, fault) = open_ledger_store(&config.store)?;
    let audit = open_audit_sink(&config.audit)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    if let Some(fault) = &fault {
        audit.record_persistence(&PersistenceAuditEvent::new(fault, clock.now()));
    }
    Ok(RequestOrchestrator::new(
        OrchestratorSettings::from_config(config),
        store,
        Arc::new(transport),
        clock,
        audit,
    ))
}
