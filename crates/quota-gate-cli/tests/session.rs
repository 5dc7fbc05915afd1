// crates/quota-gate-cli/tests/session.rs
// ============================================================================
// Module: CLI Interactive Session Tests
// Description: Command parsing and the confirm/cancel flow.
// Purpose: Ensure the session surfaces quota outcomes and parks confirmations.
// Dependencies: quota-gate-cli, quota-gate-orchestrator, tokio
// ============================================================================

//! ## Overview
//! Drives an [`InteractiveSession`] over an in-memory ledger, a manual clock,
//! and a canned transport, checking what the user sees for each outcome.

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

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use quota_gate_cli::render::event_summaries;
use quota_gate_cli::session::InteractiveSession;
use quota_gate_cli::session::SessionCommand;
use quota_gate_cli::session::SessionFlow;
use quota_gate_cli::session::parse_command;
use quota_gate_cli::session::run_session;
use quota_gate_config::SearchConfig;
use quota_gate_core::EndpointId;
use quota_gate_core::GovernancePolicy;
use quota_gate_core::InMemoryLedgerStore;
use quota_gate_core::RequestParams;
use quota_gate_core::SharedLedgerStore;
use quota_gate_core::Timestamp;
use quota_gate_orchestrator::DateRange;
use quota_gate_orchestrator::ManualClock;
use quota_gate_orchestrator::NoopAuditSink;
use quota_gate_orchestrator::OrchestratorSettings;
use quota_gate_orchestrator::RequestOrchestrator;
use quota_gate_orchestrator::SearchLocation;
use quota_gate_orchestrator::SearchTransport;
use quota_gate_orchestrator::TransportError;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// 2026-01-05T00:00:00Z.
const START_MS: i64 = 1_767_571_200_000;

/// Transport naming each event after the searched postal code.
#[derive(Default)]
struct EchoTransport {
    /// Dispatched calls.
    calls: AtomicUsize,
}

#[async_trait]
impl SearchTransport for EchoTransport {
    async fn search(
        &self,
        _endpoint_id: &EndpointId,
        params: &RequestParams,
    ) -> Result<Value, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let zip = params.get("postalCode").and_then(Value::as_str).unwrap_or("nowhere");
        Ok(json!({
            "_embedded": {"events": [{
                "name": format!("Blues night {zip}"),
                "dates": {"start": {"localDate": "2026-01-09", "localTime": "20:30:00"}},
                "_embedded": {"venues": [{"name": "Kingston Mines", "city": {"name": "Chicago"}}]}
            }]},
            "page": {"totalElements": 1}
        }))
    }
}

/// Session plus handles to its transport and clock.
struct Fixture {
    /// Session under test.
    session: InteractiveSession,
    /// Canned transport.
    transport: Arc<EchoTransport>,
    /// Manual clock.
    clock: Arc<ManualClock>,
}

impl Fixture {
    /// Fixture with `policy` and otherwise default settings.
    fn with_policy(policy: GovernancePolicy) -> Self {
        let transport = Arc::new(EchoTransport::default());
        let clock = Arc::new(ManualClock::new(Timestamp::from_unix_millis(START_MS)));
        let orchestrator = RequestOrchestrator::new(
            OrchestratorSettings {
                governance: policy,
                ..OrchestratorSettings::default()
            },
            SharedLedgerStore::from_store(InMemoryLedgerStore::new()),
            transport.clone(),
            clock.clone(),
            Arc::new(NoopAuditSink),
        );
        Self {
            session: InteractiveSession::new(orchestrator, SearchConfig::default()),
            transport,
            clock,
        }
    }

    /// Runs one command line and returns its output.
    async fn run(&mut self, line: &str) -> String {
        let command = parse_command(line).unwrap().unwrap();
        let mut out = Vec::new();
        let flow = self.session.execute(command, &mut out).await.unwrap();
        assert_eq!(flow, SessionFlow::Continue);
        String::from_utf8(out).unwrap()
    }
}

/// Policy requiring confirmation after one call.
fn confirm_after_one() -> GovernancePolicy {
    GovernancePolicy {
        warning_threshold: 1,
        confirmation_threshold: 1,
        ..GovernancePolicy::default()
    }
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Verifies commands, ranges, and coordinates parse.
#[test]
fn parses_session_commands() {
    assert_eq!(parse_command("   ").unwrap(), None);
    assert_eq!(
        parse_command("search 60601 week").unwrap(),
        Some(SessionCommand::Search {
            location: SearchLocation::PostalCode("60601".to_string()),
            range: Some(DateRange::Week),
        })
    );
    assert_eq!(
        parse_command("NEAR 41.88 -87.63").unwrap(),
        Some(SessionCommand::Search {
            location: SearchLocation::Coordinates {
                latitude: 41.88,
                longitude: -87.63,
            },
            range: None,
        })
    );
    assert_eq!(parse_command("y").unwrap(), Some(SessionCommand::Confirm));
    assert_eq!(parse_command("exit").unwrap(), Some(SessionCommand::Quit));
}

/// Verifies malformed commands produce a usage message.
#[test]
fn rejects_malformed_commands() {
    assert!(parse_command("search").is_err());
    assert!(parse_command("search 60601 someday").is_err());
    assert!(parse_command("near north west").is_err());
    assert!(parse_command("usage now").is_err());
    assert!(parse_command("dance").unwrap_err().contains("help"));
}

/// Verifies event listings are extracted from the payload.
#[test]
fn extracts_event_listing() {
    let payload = json!({"_embedded": {"events": [
        {"name": "Buddy Guy", "dates": {"start": {"localDate": "2026-02-01"}}},
        {"dates": {}}
    ]}});
    let events = event_summaries(&payload);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].line(), "2026-02-01  Buddy Guy");
    assert!(event_summaries(&json!({"page": {}})).is_empty());
}

// ============================================================================
// SECTION: Session Flow
// ============================================================================

/// Verifies a search lists events and a repeat is served from cache.
#[tokio::test]
async fn search_lists_events_and_caches_repeat() {
    let mut fixture = Fixture::with_policy(GovernancePolicy::default());
    let first = fixture.run("search 60601").await;
    assert!(first.contains("2026-01-09 20:30  Blues night 60601 @ Kingston Mines, Chicago"));
    assert!(first.contains("usage: 1 calls this session"));
    assert!(!first.contains("(cached)"));

    let second = fixture.run("search 60601").await;
    assert!(second.contains("(cached)"));
    assert_eq!(fixture.transport.calls.load(Ordering::SeqCst), 1);
}

/// Verifies confirmation parks the search and `confirm` completes it.
#[tokio::test]
async fn confirmation_is_parked_until_confirmed() {
    let mut fixture = Fixture::with_policy(confirm_after_one());
    fixture.run("search 60601").await;
    fixture.clock.advance(11_000);

    let prompt = fixture.run("search 60602").await;
    assert!(prompt.contains("continue?"));
    assert!(prompt.contains("type `confirm`"));
    assert!(fixture.session.has_pending());
    assert_eq!(fixture.transport.calls.load(Ordering::SeqCst), 1);

    let confirmed = fixture.run("confirm").await;
    assert!(confirmed.contains("Blues night 60602"));
    assert!(!fixture.session.has_pending());
    assert_eq!(fixture.transport.calls.load(Ordering::SeqCst), 2);

    assert!(fixture.run("confirm").await.contains("nothing to confirm"));
}

/// Verifies `cancel` drops the pending search without a call.
#[tokio::test]
async fn cancel_drops_pending_search() {
    let mut fixture = Fixture::with_policy(confirm_after_one());
    fixture.run("search 60601").await;
    fixture.clock.advance(11_000);
    fixture.run("search 60602").await;

    assert!(fixture.run("cancel").await.contains("search cancelled"));
    assert!(!fixture.session.has_pending());
    assert_eq!(fixture.transport.calls.load(Ordering::SeqCst), 1);
}

/// Verifies a duplicate shows the governor's reason, not a network error.
#[tokio::test]
async fn duplicate_shows_quota_reason() {
    let mut fixture = Fixture::with_policy(GovernancePolicy::default());
    fixture.run("search 60601").await;
    fixture.session.orchestrator().clear_cache().await;
    let output = fixture.run("search 60601").await;
    assert!(output.contains("duplicate request, wait 30 seconds"));
}

/// Verifies usage and reset report the counters.
#[tokio::test]
async fn usage_and_reset_report_counters() {
    let mut fixture = Fixture::with_policy(GovernancePolicy::default());
    fixture.run("search 60601").await;
    let usage = fixture.run("usage").await;
    assert!(usage.contains("usage: 1 calls this session"));
    assert!(usage.contains("1/5000 today"));
    assert!(usage.contains("[normal]"));

    let reset = fixture.run("reset").await;
    assert!(reset.contains("session reset; 1 calls today"));
    assert!(fixture.run("usage").await.contains("usage: 0 calls this session"));
}

/// Verifies invalid searches are reported without a call.
#[tokio::test]
async fn invalid_search_is_reported() {
    let mut fixture = Fixture::with_policy(GovernancePolicy::default());
    let output = fixture.run("near 95 10").await;
    assert!(output.contains("coordinates out of range"));
    assert_eq!(fixture.transport.calls.load(Ordering::SeqCst), 0);
}

/// Verifies the line loop runs until `quit` and reports bad input inline.
#[tokio::test]
async fn run_session_reads_until_quit() {
    let mut fixture = Fixture::with_policy(GovernancePolicy::default());
    let input: &[u8] = b"help\nbogus\nsearch 60601\nquit\nsearch 60602\n";
    let mut out = Vec::new();
    run_session(&mut fixture.session, input, &mut out).await.unwrap();
    let output = String::from_utf8(out).unwrap();
    assert!(output.contains("commands:"));
    assert!(output.contains("unrecognized command: bogus"));
    assert!(output.contains("Blues night 60601"));
    assert!(!output.contains("Blues night 60602"));
    assert_eq!(fixture.transport.calls.load(Ordering::SeqCst), 1);
}
