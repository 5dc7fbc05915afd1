// crates/quota-gate-orchestrator/src/orchestrator.rs
// ============================================================================
// Module: Request Orchestrator
// Description: Cache, govern, back off, dispatch, and record one search.
// Purpose: Serialize every ledger cycle and keep quota accounting exact.
// Dependencies: quota-gate-core, serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! [`RequestOrchestrator::search`] runs one logical search:
//! 1. Fingerprint the parameters and consult the response cache. A hit is
//!    returned immediately and never touches the ledger.
//! 2. Govern the request (rollover, lockout expiry, rule evaluation). Any
//!    decision other than `Allowed` is returned without a network call.
//! 3. If the breaker has tripped, automatic requests stop with
//!    [`SearchError::CircuitOpen`]; user requests wait out the backoff.
//! 4. Dispatch the call, record it, update the breaker, and cache a success.
//!
//! The whole sequence holds one async lock, so concurrent searches observe a
//! ledger that only ever moves forward. Dispatch runs in a spawned task that
//! owns the lock guard: a caller that abandons the future cannot stop the
//! call from being recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use quota_gate_core::BreakerPolicy;
use quota_gate_core::CachePolicy;
use quota_gate_core::CircuitBreaker;
use quota_gate_core::ConfirmationToken;
use quota_gate_core::EndpointId;
use quota_gate_core::Fingerprint;
use quota_gate_core::GovernanceDecision;
use quota_gate_core::GovernancePolicy;
use quota_gate_core::GovernedRequest;
use quota_gate_core::LedgerKeeper;
use quota_gate_core::PersistenceFault;
use quota_gate_core::RateGovernor;
use quota_gate_core::RequestParams;
use quota_gate_core::ResponseCache;
use quota_gate_core::SharedLedgerStore;
use quota_gate_core::Timestamp;
use quota_gate_core::UsageLevel;
use quota_gate_core::UsageSnapshot;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;

use crate::audit::CallAuditEvent;
use crate::audit::DecisionAuditEvent;
use crate::audit::GovernanceAuditSink;
use crate::audit::PersistenceAuditEvent;
use crate::clock::Clock;
use crate::error::SearchError;
use crate::transport::SearchTransport;
use crate::transport::TransportError;

// ============================================================================
// SECTION: Request Types
// ============================================================================

/// Who initiated a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOrigin {
    /// Explicit user action; waits out backoff when the breaker is open.
    User,
    /// Automatic re-query (e.g. filter change); halted when the breaker is open.
    Automatic,
}

/// One search submitted to the orchestrator.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Endpoint to call.
    pub endpoint_id: EndpointId,
    /// Request parameters (without the API key).
    pub params: RequestParams,
    /// Request origin.
    pub origin: RequestOrigin,
    /// Confirmation token from an earlier `ConfirmationRequired`.
    pub confirmation: Option<ConfirmationToken>,
}

impl SearchRequest {
    /// Creates a user-initiated request.
    #[must_use]
    pub fn user(endpoint_id: EndpointId, params: RequestParams) -> Self {
        Self {
            endpoint_id,
            params,
            origin: RequestOrigin::User,
            confirmation: None,
        }
    }

    /// Creates an automatic request.
    #[must_use]
    pub fn automatic(endpoint_id: EndpointId, params: RequestParams) -> Self {
        Self {
            endpoint_id,
            params,
            origin: RequestOrigin::Automatic,
            confirmation: None,
        }
    }

    /// Attaches a confirmation token.
    #[must_use]
    pub fn confirmed(mut self, token: ConfirmationToken) -> Self {
        self.confirmation = Some(token);
        self
    }
}

/// Payload returned by a successful search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    /// Opaque upstream payload.
    pub payload: Value,
    /// Usage after the search.
    pub usage: UsageSnapshot,
    /// True when served from the response cache.
    pub cached: bool,
}

/// Usage summary for indicator badges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    /// Counters and thresholds.
    pub usage: UsageSnapshot,
    /// Advisory usage tier.
    pub level: UsageLevel,
    /// Active lockout expiry, if any.
    pub blocked_until: Option<Timestamp>,
    /// Consecutive failures seen by the breaker.
    pub consecutive_failures: u32,
}

/// Policies the orchestrator is built from.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorSettings {
    /// Quota thresholds and windows.
    pub governance: GovernancePolicy,
    /// Breaker threshold and backoff.
    pub breaker: BreakerPolicy,
    /// Response cache TTL and bound.
    pub cache: CachePolicy,
    /// Zero the session counter when the orchestrator starts.
    pub reset_session_on_start: bool,
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Ledger, breaker, and cache guarded together.
struct GovernanceState {
    /// Authoritative ledger.
    keeper: LedgerKeeper,
    /// Consecutive failure tracker.
    breaker: CircuitBreaker,
    /// Cached payloads.
    cache: ResponseCache<Value>,
}

/// Sequences cache, governance, backoff, and dispatch for searches.
pub struct RequestOrchestrator {
    /// Rule evaluator.
    governor: RateGovernor,
    /// Serialized governance state.
    state: Arc<Mutex<GovernanceState>>,
    /// Network boundary.
    transport: Arc<dyn SearchTransport>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Audit sink.
    audit: Arc<dyn GovernanceAuditSink>,
}

impl RequestOrchestrator {
    /// Loads the ledger from `store` and builds an orchestrator.
    ///
    /// A store that cannot be read yields a fresh ledger; the failure is
    /// logged as `persistence_degraded`.
    #[must_use]
    pub fn new(
        settings: OrchestratorSettings,
        store: SharedLedgerStore,
        transport: Arc<dyn SearchTransport>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn GovernanceAuditSink>,
    ) -> Self {
        let now = clock.now();
        let (mut keeper, fault) = LedgerKeeper::open(store, &settings.governance, now);
        let mut faults: Vec<PersistenceFault> = fault.into_iter().collect();
        if settings.reset_session_on_start {
            faults.extend(keeper.reset_session());
        }
        for fault in &faults {
            audit.record_persistence(&PersistenceAuditEvent::new(fault, now));
        }
        Self {
            governor: RateGovernor::new(settings.governance),
            state: Arc::new(Mutex::new(GovernanceState {
                keeper,
                breaker: CircuitBreaker::new(settings.breaker),
                cache: ResponseCache::new(settings.cache),
            })),
            transport,
            clock,
            audit,
        }
    }

    /// Returns the rule evaluator.
    #[must_use]
    pub const fn governor(&self) -> &RateGovernor {
        &self.governor
    }

    /// Runs one search through cache, governance, backoff, and dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] when the request is blocked, needs
    /// confirmation, is halted by the breaker, or the call fails.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchOutcome, SearchError> {
        let fingerprint = request
            .params
            .fingerprint()
            .map_err(|err| SearchError::InvalidRequest(err.to_string()))?;
        let mut state = Arc::clone(&self.state).lock_owned().await;
        let now = self.clock.now();

        if let Some(payload) = state.cache.get(&request.endpoint_id, &fingerprint, now) {
            let usage = self.governor.snapshot(state.keeper.ledger());
            let decision = GovernanceDecision::Allowed {
                usage,
            };
            self.audit.record_decision(&DecisionAuditEvent::new(
                &request.endpoint_id,
                &fingerprint,
                request.origin,
                &decision,
                true,
                now,
            ));
            return Ok(SearchOutcome {
                payload,
                usage,
                cached: true,
            });
        }

        let governed = self.governor.govern(
            &mut state.keeper,
            &GovernedRequest {
                endpoint_id: &request.endpoint_id,
                fingerprint: &fingerprint,
                confirmation: request.confirmation.as_ref(),
            },
            now,
        );
        self.record_faults(&governed.faults, now);
        self.audit.record_decision(&DecisionAuditEvent::new(
            &request.endpoint_id,
            &fingerprint,
            request.origin,
            &governed.decision,
            false,
            now,
        ));
        match governed.decision {
            GovernanceDecision::Allowed {
                ..
            } => {}
            GovernanceDecision::Blocked {
                rule,
                reason,
                usage,
            } => {
                return Err(SearchError::QuotaBlocked {
                    rule,
                    reason,
                    usage,
                });
            }
            GovernanceDecision::RequiresConfirmation {
                reason,
                usage,
                token,
            } => {
                return Err(SearchError::ConfirmationRequired {
                    reason,
                    usage,
                    token,
                });
            }
        }

        if state.breaker.should_break() {
            if request.origin == RequestOrigin::Automatic {
                return Err(SearchError::CircuitOpen {
                    consecutive_failures: state.breaker.consecutive_failures(),
                });
            }
            tokio::time::sleep(Duration::from_millis(state.breaker.backoff_delay_ms())).await;
        }

        let dispatch = Dispatch {
            governor: self.governor,
            transport: Arc::clone(&self.transport),
            clock: Arc::clone(&self.clock),
            audit: Arc::clone(&self.audit),
            endpoint_id: request.endpoint_id,
            params: request.params,
            fingerprint,
        };
        tokio::spawn(dispatch.run(state))
            .await
            .map_err(|err| SearchError::Connectivity(format!("dispatch task failed: {err}")))?
    }

    /// Returns current usage, rolling the day over first.
    pub async fn usage(&self) -> UsageReport {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let mut faults = Vec::new();
        faults.extend(state.keeper.rollover_if_new_day(now, self.governor.policy()));
        faults.extend(state.keeper.clear_block_if_expired(now));
        self.record_faults(&faults, now);
        let ledger = state.keeper.ledger();
        UsageReport {
            usage: self.governor.snapshot(ledger),
            level: self.governor.usage_level(ledger),
            blocked_until: ledger.blocked_until(),
            consecutive_failures: state.breaker.consecutive_failures(),
        }
    }

    /// Starts a new session: zeroes the session counter, clears call history
    /// and any lockout, and resets the breaker. The daily count is kept.
    pub async fn reset_session(&self) {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let fault = state.keeper.reset_session();
        state.breaker.reset();
        self.record_faults(fault.as_slice(), now);
    }

    /// Drops every cached payload.
    pub async fn clear_cache(&self) {
        self.state.lock().await.cache.clear();
    }

    /// Returns the current time from the injected clock.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Logs persistence faults.
    fn record_faults(&self, faults: &[PersistenceFault], now: Timestamp) {
        for fault in faults {
            self.audit.record_persistence(&PersistenceAuditEvent::new(fault, now));
        }
    }
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Everything a governed call needs once it leaves the caller.
struct Dispatch {
    /// Rule evaluator for the post-call snapshot.
    governor: RateGovernor,
    /// Network boundary.
    transport: Arc<dyn SearchTransport>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Audit sink.
    audit: Arc<dyn GovernanceAuditSink>,
    /// Endpoint to call.
    endpoint_id: EndpointId,
    /// Request parameters.
    params: RequestParams,
    /// Request fingerprint.
    fingerprint: Fingerprint,
}

impl Dispatch {
    /// Performs the call and records it while holding the state lock.
    async fn run(
        self,
        mut state: OwnedMutexGuard<GovernanceState>,
    ) -> Result<SearchOutcome, SearchError> {
        let started = Instant::now();
        let result = self.transport.search(&self.endpoint_id, &self.params).await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let now = self.clock.now();

        if let Err(error @ TransportError::Refused(_)) = &result {
            self.audit.record_call(&CallAuditEvent::new(
                &self.endpoint_id,
                &self.fingerprint,
                Some(error),
                latency_ms,
                state.breaker.consecutive_failures(),
                now,
            ));
            return Err(error.clone().into());
        }

        let succeeded = result.is_ok();
        let fault = state.keeper.record_call(
            self.endpoint_id.clone(),
            self.fingerprint.clone(),
            succeeded,
            now,
        );
        state.breaker.on_result(succeeded);
        if let Ok(payload) = &result {
            state.cache.insert(
                self.endpoint_id.clone(),
                self.fingerprint.clone(),
                payload.clone(),
                now,
            );
        }
        if let Some(fault) = &fault {
            self.audit.record_persistence(&PersistenceAuditEvent::new(fault, now));
        }
        self.audit.record_call(&CallAuditEvent::new(
            &self.endpoint_id,
            &self.fingerprint,
            result.as_ref().err(),
            latency_ms,
            state.breaker.consecutive_failures(),
            now,
        ));

        let usage = self.governor.snapshot(state.keeper.ledger());
        drop(state);
        result.map_err(SearchError::from).map(|payload| SearchOutcome {
            payload,
            usage,
            cached: false,
        })
    }
}
