// crates/quota-gate-core/tests/cache_breaker.rs
// ============================================================================
// Module: Response Cache and Circuit Breaker Tests
// Description: TTL expiry, size bound, failure counting, and backoff.
// Purpose: Validate the two process-local helpers around the network call.
// Dependencies: quota-gate-core
// ============================================================================
//! ## Overview
//! The cache must expire lazily at the TTL boundary and respect its entry
//! bound. The breaker must trip at the threshold and cap its backoff.

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

use common::events_endpoint;
use common::jan;
use common::plus_secs;
use common::zip_fingerprint;
use quota_gate_core::BreakerPolicy;
use quota_gate_core::CachePolicy;
use quota_gate_core::CircuitBreaker;
use quota_gate_core::ResponseCache;

// ============================================================================
// SECTION: Response Cache
// ============================================================================

/// Verifies entries are served until the TTL elapses, then evicted.
#[test]
fn cache_expires_lazily_after_ttl() {
    let mut cache = ResponseCache::new(CachePolicy::default());
    let endpoint_id = events_endpoint();
    let fingerprint = zip_fingerprint("60601");
    let stored_at = jan(5);
    cache.insert(endpoint_id.clone(), fingerprint.clone(), "page-1".to_string(), stored_at);

    assert_eq!(
        cache.get(&endpoint_id, &fingerprint, plus_secs(stored_at, 300)),
        Some("page-1".to_string())
    );
    assert_eq!(cache.len(), 1);
    let expired_at = stored_at.saturating_add_millis(300_001);
    assert_eq!(cache.get(&endpoint_id, &fingerprint, expired_at), None);
    assert!(cache.is_empty());
}

/// Verifies keys distinguish endpoint and parameters.
#[test]
fn cache_keys_on_endpoint_and_fingerprint() {
    let mut cache = ResponseCache::new(CachePolicy::default());
    cache.insert(events_endpoint(), zip_fingerprint("60601"), 1_u32, jan(5));

    assert_eq!(cache.get(&events_endpoint(), &zip_fingerprint("60602"), jan(5)), None);
    let venues = quota_gate_core::EndpointId::new("venues.json");
    assert_eq!(cache.get(&venues, &zip_fingerprint("60601"), jan(5)), None);
    assert_eq!(cache.get(&events_endpoint(), &zip_fingerprint("60601"), jan(5)), Some(1));
}

/// Verifies the entry bound evicts the oldest entry first.
#[test]
fn cache_bound_evicts_oldest_entry() {
    let policy = CachePolicy {
        max_entries: Some(2),
        ..CachePolicy::default()
    };
    let mut cache = ResponseCache::new(policy);
    cache.insert(events_endpoint(), zip_fingerprint("60601"), 1_u32, jan(5));
    cache.insert(events_endpoint(), zip_fingerprint("60602"), 2, plus_secs(jan(5), 1));
    cache.insert(events_endpoint(), zip_fingerprint("60603"), 3, plus_secs(jan(5), 2));

    let now = plus_secs(jan(5), 3);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(&events_endpoint(), &zip_fingerprint("60601"), now), None);
    assert_eq!(cache.get(&events_endpoint(), &zip_fingerprint("60603"), now), Some(3));
}

/// Verifies an unbounded cache keeps every live entry.
#[test]
fn cache_without_bound_keeps_all_entries() {
    let policy = CachePolicy {
        max_entries: None,
        ..CachePolicy::default()
    };
    let mut cache = ResponseCache::new(policy);
    for index in 0..300_u64 {
        cache.insert(events_endpoint(), zip_fingerprint(&index.to_string()), index, jan(5));
    }
    assert_eq!(cache.len(), 300);
    cache.clear();
    assert!(cache.is_empty());
}

// ============================================================================
// SECTION: Circuit Breaker
// ============================================================================

/// Verifies the breaker trips at three consecutive failures.
#[test]
fn breaker_trips_at_threshold_and_resets_on_success() {
    let mut breaker = CircuitBreaker::new(BreakerPolicy::default());
    breaker.on_result(false);
    breaker.on_result(false);
    assert!(!breaker.should_break());
    breaker.on_result(false);
    assert!(breaker.should_break());
    assert_eq!(breaker.consecutive_failures(), 3);

    breaker.on_result(true);
    assert!(!breaker.should_break());
    assert_eq!(breaker.consecutive_failures(), 0);
}

/// Verifies backoff doubles per failure and is capped.
#[test]
fn breaker_backoff_doubles_and_caps() {
    let mut breaker = CircuitBreaker::new(BreakerPolicy::default());
    let mut delays = Vec::new();
    for _ in 0..6 {
        delays.push(breaker.backoff_delay_ms());
        breaker.on_result(false);
    }
    assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 10_000, 10_000]);
}

/// Verifies very long failure streaks never overflow the backoff.
#[test]
fn breaker_backoff_saturates_on_long_streaks() {
    let mut breaker = CircuitBreaker::new(BreakerPolicy::default());
    for _ in 0..200 {
        breaker.on_result(false);
    }
    assert_eq!(breaker.backoff_delay_ms(), 10_000);
    breaker.reset();
    assert_eq!(breaker.backoff_delay_ms(), 1_000);
}
