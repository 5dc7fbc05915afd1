// crates/quota-gate-orchestrator/tests/orchestrator.rs
// ============================================================================
// Module: Request Orchestrator Tests
// Description: End-to-end sequencing of cache, governance, breaker, dispatch.
// Purpose: Ensure quota accounting stays exact across every search path.
// Dependencies: quota-gate-orchestrator, quota-gate-core, tokio
// ============================================================================

//! ## Overview
//! Drives the orchestrator with a scripted transport and a manual clock.
//! Backoff waits run under paused tokio time so they complete instantly.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::time::Duration;

use quota_gate_core::BlockRule;
use quota_gate_core::InMemoryLedgerStore;
use quota_gate_core::SharedLedgerStore;
use quota_gate_core::UsageLevel;
use quota_gate_orchestrator::OrchestratorSettings;
use quota_gate_orchestrator::SearchError;
use quota_gate_orchestrator::TransportError;
use serde_json::json;

use crate::common::FailingStore;
use crate::common::Harness;
use crate::common::ScriptedTransport;
use crate::common::automatic_search;
use crate::common::ledger_from;
use crate::common::user_search;

/// Store seeded with the given counters on the harness start date.
fn seeded_store(daily: u64, session: u64) -> SharedLedgerStore {
    SharedLedgerStore::from_store(InMemoryLedgerStore::with_ledger(ledger_from(json!({
        "dailyCount": daily,
        "sessionCount": session,
        "lastResetDate": "2026-01-05",
        "recentCalls": []
    }))))
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Verifies a cache hit returns the payload without touching the ledger.
#[tokio::test]
async fn cache_hit_does_not_count() {
    let harness = Harness::new(ScriptedTransport::ok());
    let first = harness.orchestrator.search(user_search("60601")).await.unwrap();
    assert!(!first.cached);
    assert_eq!(first.usage.session_count, 1);
    assert_eq!(first.usage.daily_count, 1);

    harness.clock.advance(5_000);
    let second = harness.orchestrator.search(user_search("60601")).await.unwrap();
    assert!(second.cached);
    assert_eq!(second.payload, first.payload);
    assert_eq!(second.usage.session_count, 1);
    assert_eq!(harness.transport.calls(), 1);

    let decisions = harness.audit.decisions.lock().unwrap();
    assert_eq!(decisions.len(), 2);
    assert!(!decisions[0].cache_hit);
    assert!(decisions[1].cache_hit);
    assert!(!decisions[1].fingerprint_hash.as_str().contains("60601"));
}

/// Verifies an expired cache entry goes back through governance.
#[tokio::test]
async fn expired_cache_entry_is_refetched() {
    let harness = Harness::new(ScriptedTransport::ok());
    harness.orchestrator.search(user_search("60601")).await.unwrap();
    harness.clock.advance(5 * 60 * 1_000 + 1);
    let outcome = harness.orchestrator.search(user_search("60601")).await.unwrap();
    assert!(!outcome.cached);
    assert_eq!(outcome.usage.session_count, 2);
    assert_eq!(harness.transport.calls(), 2);
}

/// Verifies clearing the cache forces the next identical search to govern.
#[tokio::test]
async fn clear_cache_exposes_duplicate_rule() {
    let harness = Harness::new(ScriptedTransport::ok());
    harness.orchestrator.search(user_search("60601")).await.unwrap();
    harness.orchestrator.clear_cache().await;
    let err = harness.orchestrator.search(user_search("60601")).await.unwrap_err();
    assert!(matches!(
        err,
        SearchError::QuotaBlocked {
            rule: BlockRule::Duplicate { .. },
            ..
        }
    ));
}

// ============================================================================
// SECTION: Quota Rules
// ============================================================================

/// Verifies a failed call is recorded and an immediate retry is a duplicate.
#[tokio::test]
async fn failed_call_counts_and_retry_is_duplicate() {
    let harness = Harness::new(ScriptedTransport::scripted(vec![Err(TransportError::Upstream {
        status: 503,
    })]));
    let err = harness.orchestrator.search(user_search("60601")).await.unwrap_err();
    assert_eq!(
        err,
        SearchError::Upstream {
            status: 503
        }
    );
    assert!(!err.is_quota());

    let err = harness.orchestrator.search(user_search("60601")).await.unwrap_err();
    match err {
        SearchError::QuotaBlocked {
            rule,
            reason,
            usage,
        } => {
            assert_eq!(
                rule,
                BlockRule::Duplicate {
                    retry_after_ms: 30_000
                }
            );
            assert_eq!(reason, "duplicate request, wait 30 seconds");
            assert_eq!(usage.daily_count, 1);
        }
        other => panic!("expected duplicate block, got {other:?}"),
    }
    assert_eq!(harness.transport.calls(), 1);

    harness.clock.advance(30_000);
    let outcome = harness.orchestrator.search(user_search("60601")).await.unwrap();
    assert_eq!(outcome.usage.session_count, 2);
}

/// Verifies three calls inside the window lock out the fourth and fifth.
#[tokio::test]
async fn rapid_fire_locks_out_distinct_requests() {
    let harness = Harness::new(ScriptedTransport::ok());
    for zip in ["60601", "60602", "60603"] {
        harness.orchestrator.search(user_search(zip)).await.unwrap();
        harness.clock.advance(1_000);
    }

    let err = harness.orchestrator.search(user_search("60604")).await.unwrap_err();
    assert!(matches!(
        err,
        SearchError::QuotaBlocked {
            rule: BlockRule::RapidFire { .. },
            ..
        }
    ));
    assert_eq!(err.to_string(), "too many requests, locked 30s");

    harness.clock.advance(1_000);
    let err = harness.orchestrator.search(user_search("60605")).await.unwrap_err();
    assert!(matches!(
        err,
        SearchError::QuotaBlocked {
            rule: BlockRule::Lockout { .. },
            ..
        }
    ));
    assert_eq!(harness.transport.calls(), 3);
    let report = harness.orchestrator.usage().await;
    assert!(report.blocked_until.is_some());
    assert_eq!(report.usage.session_count, 3);
}

/// Verifies the confirmation token lets exactly the confirmed request through.
#[tokio::test]
async fn confirmation_token_flow() {
    let harness = Harness::with_store(ScriptedTransport::ok(), seeded_store(50, 50));
    let err = harness.orchestrator.search(user_search("60601")).await.unwrap_err();
    let (reason, usage, token) = match err {
        SearchError::ConfirmationRequired {
            reason,
            usage,
            token,
        } => (reason, usage, token),
        other => panic!("expected confirmation, got {other:?}"),
    };
    assert_eq!(reason, "you have made 50 calls this session, continue?");
    assert_eq!(usage.session_count, 50);
    assert_eq!(harness.transport.calls(), 0);

    let mismatched = user_search("60602").confirmed(token.clone());
    assert!(matches!(
        harness.orchestrator.search(mismatched).await,
        Err(SearchError::ConfirmationRequired { .. })
    ));

    let outcome = harness.orchestrator.search(user_search("60601").confirmed(token)).await.unwrap();
    assert_eq!(outcome.usage.session_count, 51);
    assert_eq!(harness.transport.calls(), 1);
}

/// Verifies the session hard limit blocks without a network call.
#[tokio::test]
async fn session_limit_blocks_before_dispatch() {
    let harness = Harness::with_store(ScriptedTransport::ok(), seeded_store(100, 100));
    let err = harness.orchestrator.search(user_search("60601")).await.unwrap_err();
    assert_eq!(err.to_string(), "session limit reached (100 calls)");
    assert!(err.is_quota());
    assert_eq!(harness.transport.calls(), 0);
}

// ============================================================================
// SECTION: Circuit Breaker
// ============================================================================

/// Verifies automatic re-queries halt and user retries wait out the backoff.
#[tokio::test(start_paused = true)]
async fn breaker_halts_automatic_and_delays_user_requests() {
    let harness = Harness::new(ScriptedTransport::scripted(vec![
        Err(TransportError::Connectivity("connection refused".to_string())),
        Err(TransportError::Upstream {
            status: 500,
        }),
        Err(TransportError::Connectivity("connection reset".to_string())),
    ]));
    for zip in ["60601", "60602", "60603"] {
        let err = harness.orchestrator.search(user_search(zip)).await.unwrap_err();
        assert!(!err.is_quota());
        harness.clock.advance(11_000);
    }
    assert_eq!(harness.orchestrator.usage().await.consecutive_failures, 3);

    let err = harness.orchestrator.search(automatic_search("60604")).await.unwrap_err();
    assert_eq!(
        err,
        SearchError::CircuitOpen {
            consecutive_failures: 3
        }
    );
    assert_eq!(harness.transport.calls(), 3);

    harness.clock.advance(11_000);
    let started = tokio::time::Instant::now();
    let outcome = harness.orchestrator.search(user_search("60605")).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(8_000));
    assert!(!outcome.cached);
    assert_eq!(harness.orchestrator.usage().await.consecutive_failures, 0);

    let calls = harness.audit.calls.lock().unwrap();
    let kinds: Vec<Option<&str>> = calls.iter().map(|event| event.failure_kind).collect();
    assert_eq!(kinds, vec![Some("connectivity"), Some("upstream"), Some("connectivity"), None]);
    assert_eq!(calls[1].status, Some(500));
}

/// Verifies a locally refused request is neither counted nor fed to the breaker.
#[tokio::test]
async fn refused_request_is_not_recorded() {
    let harness = Harness::new(ScriptedTransport::scripted(vec![Err(TransportError::Refused(
        "url outside allowed upstream prefix".to_string(),
    ))]));
    let err = harness.orchestrator.search(user_search("60601")).await.unwrap_err();
    assert_eq!(err.kind(), "refused");
    let report = harness.orchestrator.usage().await;
    assert_eq!(report.usage.session_count, 0);
    assert_eq!(report.consecutive_failures, 0);
}

// ============================================================================
// SECTION: Concurrency
// ============================================================================

/// Verifies concurrent identical searches dispatch once.
#[tokio::test(start_paused = true)]
async fn concurrent_identical_searches_dispatch_once() {
    let harness = Harness::new(ScriptedTransport::slow(Duration::from_millis(100)));
    let (first, second) = tokio::join!(
        harness.orchestrator.search(user_search("60601")),
        harness.orchestrator.search(user_search("60601")),
    );
    let first = first.unwrap();
    let second = second.unwrap();
    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(harness.transport.calls(), 1);
    assert_eq!(second.usage.session_count, 1);
}

/// Verifies an abandoned search is still recorded once the call completes.
#[tokio::test(start_paused = true)]
async fn abandoned_search_is_still_recorded() {
    let harness = Harness::new(ScriptedTransport::slow(Duration::from_secs(1)));
    let abandoned = tokio::time::timeout(
        Duration::from_millis(10),
        harness.orchestrator.search(user_search("60601")),
    )
    .await;
    assert!(abandoned.is_err());

    let report = harness.orchestrator.usage().await;
    assert_eq!(report.usage.session_count, 1);
    assert_eq!(harness.transport.calls(), 1);
}

// ============================================================================
// SECTION: Session and Usage
// ============================================================================

/// Verifies reset keeps the daily count and clears session and breaker.
#[tokio::test]
async fn reset_session_keeps_daily_count() {
    let harness = Harness::with_store(
        ScriptedTransport::scripted(vec![Err(TransportError::Connectivity("down".to_string()))]),
        seeded_store(10, 10),
    );
    harness.orchestrator.search(user_search("60601")).await.unwrap_err();
    harness.orchestrator.reset_session().await;
    let report = harness.orchestrator.usage().await;
    assert_eq!(report.usage.session_count, 0);
    assert_eq!(report.usage.daily_count, 11);
    assert_eq!(report.consecutive_failures, 0);
    assert_eq!(report.level, UsageLevel::Normal);
}

/// Verifies the usage report rolls the day over.
#[tokio::test]
async fn usage_rolls_over_on_new_day() {
    let harness = Harness::with_store(ScriptedTransport::ok(), seeded_store(80, 80));
    assert_eq!(harness.orchestrator.usage().await.level, UsageLevel::Critical);
    harness.clock.advance(24 * 60 * 60 * 1_000);
    let report = harness.orchestrator.usage().await;
    assert_eq!(report.usage.daily_count, 0);
    assert_eq!(report.usage.session_count, 0);
    assert_eq!(report.level, UsageLevel::Normal);
}

/// Verifies the start-up session reset leaves the daily count intact.
#[tokio::test]
async fn reset_on_start_zeroes_session() {
    let settings = OrchestratorSettings {
        reset_session_on_start: true,
        ..OrchestratorSettings::default()
    };
    let harness =
        Harness::with_settings(ScriptedTransport::ok(), seeded_store(40, 40), settings);
    let report = harness.orchestrator.usage().await;
    assert_eq!(report.usage.session_count, 0);
    assert_eq!(report.usage.daily_count, 40);
}

/// Verifies storage failures are logged and never block the search.
#[tokio::test]
async fn persistence_failure_is_logged_not_fatal() {
    let harness =
        Harness::with_store(ScriptedTransport::ok(), SharedLedgerStore::from_store(FailingStore));
    let outcome = harness.orchestrator.search(user_search("60601")).await.unwrap();
    assert_eq!(outcome.usage.session_count, 1);
    let persistence = harness.audit.persistence.lock().unwrap();
    assert_eq!(persistence.len(), 1);
    assert_eq!(persistence[0].operation, "record_call");
    assert!(persistence[0].message.contains("disk full"));
}
