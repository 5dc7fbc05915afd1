// crates/quota-gate-core/src/core/policy.rs
// ============================================================================
// Module: Governance Policy
// Description: Thresholds and windows that drive governance decisions.
// Purpose: Keep every policy constant injectable instead of hard-coded.
// Dependencies: serde, crate::core::time
// ============================================================================

//! ## Overview
//! Policies are plain values. Defaults match the published quota posture:
//! 100 calls per session, 5000 per day, confirmation from call 50, a 30 second
//! duplicate window, and a 30 second lockout after 3 calls inside 10 seconds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::time::LocalOffset;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default daily hard limit.
pub const DEFAULT_DAILY_LIMIT: u64 = 5_000;
/// Default session hard limit.
pub const DEFAULT_SESSION_HARD_LIMIT: u64 = 100;
/// Default session soft limit (usage level `critical`).
pub const DEFAULT_SESSION_SOFT_LIMIT: u64 = 75;
/// Default session count requiring confirmation.
pub const DEFAULT_CONFIRMATION_THRESHOLD: u64 = 50;
/// Default session count for the warning usage level.
pub const DEFAULT_WARNING_THRESHOLD: u64 = 25;
/// Default duplicate suppression window.
pub const DEFAULT_DUPLICATE_WINDOW_MS: u64 = 30_000;
/// Default rapid-fire detection window.
pub const DEFAULT_RAPID_FIRE_WINDOW_MS: u64 = 10_000;
/// Default number of calls inside the rapid-fire window that trips a lockout.
pub const DEFAULT_RAPID_FIRE_LIMIT: usize = 3;
/// Default lockout duration.
pub const DEFAULT_LOCKOUT_MS: u64 = 30_000;
/// Default recent call history capacity.
pub const DEFAULT_RECENT_CALLS_CAPACITY: usize = 100;
/// Default consecutive failures before the breaker trips.
pub const DEFAULT_BREAKER_FAILURE_THRESHOLD: u32 = 3;
/// Default backoff base delay.
pub const DEFAULT_BREAKER_BASE_DELAY_MS: u64 = 1_000;
/// Default backoff ceiling.
pub const DEFAULT_BREAKER_MAX_DELAY_MS: u64 = 10_000;
/// Default response cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL_MS: u64 = 5 * 60 * 1_000;
/// Default response cache entry bound.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 256;

// ============================================================================
// SECTION: Governance Policy
// ============================================================================

/// Quota thresholds evaluated by the rate governor.
///
/// # Invariants
/// - `warning_threshold <= confirmation_threshold <= session_soft_limit <= session_hard_limit`
///   is enforced by configuration validation, not by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernancePolicy {
    /// Calls allowed per local calendar day.
    pub daily_limit: u64,
    /// Calls allowed per session.
    pub session_hard_limit: u64,
    /// Session count at which usage is `critical`.
    pub session_soft_limit: u64,
    /// Session count from which each request needs explicit confirmation.
    pub confirmation_threshold: u64,
    /// Session count at which usage is `warning`.
    pub warning_threshold: u64,
    /// Identical requests inside this window are suppressed.
    pub duplicate_window_ms: u64,
    /// Window used to detect rapid-fire requests.
    pub rapid_fire_window_ms: u64,
    /// Calls inside the rapid-fire window that trigger a lockout.
    pub rapid_fire_limit: usize,
    /// Lockout duration once rapid fire is detected.
    pub lockout_ms: u64,
    /// Maximum retained call records.
    pub recent_calls_capacity: usize,
    /// Offset defining the local calendar day for rollover.
    pub local_offset: LocalOffset,
}

impl Default for GovernancePolicy {
    fn default() -> Self {
        Self {
            daily_limit: DEFAULT_DAILY_LIMIT,
            session_hard_limit: DEFAULT_SESSION_HARD_LIMIT,
            session_soft_limit: DEFAULT_SESSION_SOFT_LIMIT,
            confirmation_threshold: DEFAULT_CONFIRMATION_THRESHOLD,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            duplicate_window_ms: DEFAULT_DUPLICATE_WINDOW_MS,
            rapid_fire_window_ms: DEFAULT_RAPID_FIRE_WINDOW_MS,
            rapid_fire_limit: DEFAULT_RAPID_FIRE_LIMIT,
            lockout_ms: DEFAULT_LOCKOUT_MS,
            recent_calls_capacity: DEFAULT_RECENT_CALLS_CAPACITY,
            local_offset: LocalOffset::UTC,
        }
    }
}

// ============================================================================
// SECTION: Breaker Policy
// ============================================================================

/// Circuit breaker thresholds and backoff bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerPolicy {
    /// Consecutive failures at which the breaker trips.
    pub failure_threshold: u32,
    /// Backoff base delay; doubled per consecutive failure.
    pub base_delay_ms: u64,
    /// Backoff ceiling.
    pub max_delay_ms: u64,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_BREAKER_FAILURE_THRESHOLD,
            base_delay_ms: DEFAULT_BREAKER_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_BREAKER_MAX_DELAY_MS,
        }
    }
}

// ============================================================================
// SECTION: Cache Policy
// ============================================================================

/// Response cache TTL and size bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Entry lifetime; entries older than this are expired on lookup.
    pub ttl_ms: u64,
    /// Maximum entries retained; `None` leaves the cache unbounded.
    pub max_entries: Option<usize>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_CACHE_TTL_MS,
            max_entries: Some(DEFAULT_CACHE_MAX_ENTRIES),
        }
    }
}
