// crates/quota-gate-core/src/runtime/breaker.rs
// ============================================================================
// Module: Circuit Breaker
// Description: Consecutive failure tracking with capped exponential backoff.
// Purpose: Slow down retries against a failing upstream without vetoing them.
// Dependencies: crate::core::policy
// ============================================================================

//! ## Overview
//! The breaker counts consecutive upstream failures and trips once the count
//! reaches the policy threshold. A tripped breaker is advisory: user-initiated
//! calls wait out [`CircuitBreaker::backoff_delay_ms`] and still proceed, while
//! automatic re-queries are refused by the orchestrator. Only the rate
//! governor can hard-block a request.
//!
//! State lives in process memory only. The breaker never sleeps itself; the
//! host performs the wait so the core stays free of I/O.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::policy::BreakerPolicy;

// ============================================================================
// SECTION: Circuit Breaker
// ============================================================================

/// Consecutive failure counter with backoff computation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CircuitBreaker {
    /// Threshold and backoff bounds.
    policy: BreakerPolicy,
    /// Failures since the last success.
    consecutive_failures: u32,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    #[must_use]
    pub const fn new(policy: BreakerPolicy) -> Self {
        Self {
            policy,
            consecutive_failures: 0,
        }
    }

    /// Returns the active policy.
    #[must_use]
    pub const fn policy(&self) -> &BreakerPolicy {
        &self.policy
    }

    /// Returns failures recorded since the last success.
    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Returns true once consecutive failures reach the threshold.
    #[must_use]
    pub const fn should_break(&self) -> bool {
        self.consecutive_failures >= self.policy.failure_threshold
    }

    /// Returns `min(base * 2^failures, max)` in milliseconds.
    #[must_use]
    pub fn backoff_delay_ms(&self) -> u64 {
        2_u64
            .checked_pow(self.consecutive_failures)
            .and_then(|factor| self.policy.base_delay_ms.checked_mul(factor))
            .map_or(self.policy.max_delay_ms, |delay| delay.min(self.policy.max_delay_ms))
    }

    /// Resets on success and counts on failure.
    pub const fn on_result(&mut self, succeeded: bool) {
        if succeeded {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }
    }

    /// Closes the breaker.
    pub const fn reset(&mut self) {
        self.consecutive_failures = 0;
    }
}
