// crates/quota-gate-core/src/runtime/governor.rs
// ============================================================================
// Module: Rate Governor
// Description: Ordered quota rules evaluated against the usage ledger.
// Purpose: Decide whether a request may proceed, must be confirmed, or is blocked.
// Dependencies: crate::core, crate::runtime::keeper
// ============================================================================

//! ## Overview
//! Rules are evaluated strictly in order; the first match wins:
//!
//! 1. active lockout
//! 2. session hard limit
//! 3. daily hard limit
//! 4. duplicate suppression
//! 5. rapid fire (imposes a new lockout)
//! 6. confirmation threshold (skipped when a matching token is presented)
//! 7. allowed
//!
//! [`RateGovernor::evaluate`] is a pure function of the ledger. The lockout
//! written by rule 5 is applied by [`RateGovernor::govern`], which also rolls
//! the day over before any rule runs. Rule 5 is the only rule with a side
//! effect; the lockout must stick even if the caller never retries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::decision::BlockRule;
use crate::core::decision::ConfirmationToken;
use crate::core::decision::GovernanceDecision;
use crate::core::decision::UsageLevel;
use crate::core::decision::UsageSnapshot;
use crate::core::fingerprint::Fingerprint;
use crate::core::identifiers::EndpointId;
use crate::core::ledger::CallRecord;
use crate::core::ledger::UsageLedger;
use crate::core::policy::GovernancePolicy;
use crate::core::time::Timestamp;
use crate::runtime::keeper::LedgerKeeper;
use crate::runtime::keeper::PersistenceFault;

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Per-request evaluation context.
#[derive(Debug, Clone, Copy)]
pub struct GovernedRequest<'a> {
    /// Endpoint being called.
    pub endpoint_id: &'a EndpointId,
    /// Canonical request parameters.
    pub fingerprint: &'a Fingerprint,
    /// Confirmation granted for this request, if any.
    pub confirmation: Option<&'a ConfirmationToken>,
}

impl GovernedRequest<'_> {
    /// Returns true when a current token covering this request was presented.
    fn is_confirmed(&self, ledger: &UsageLedger) -> bool {
        self.confirmation.is_some_and(|token| {
            token.covers(self.endpoint_id, self.fingerprint) && token.is_current(ledger)
        })
    }
}

/// Decision plus any persistence faults raised while governing.
#[derive(Debug)]
pub struct Governed {
    /// The decision for the request.
    pub decision: GovernanceDecision,
    /// Storage failures to log; never affect the decision.
    pub faults: Vec<PersistenceFault>,
}

// ============================================================================
// SECTION: Rate Governor
// ============================================================================

/// Evaluates requests against the ledger and policy thresholds.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateGovernor {
    /// Active policy.
    policy: GovernancePolicy,
}

impl RateGovernor {
    /// Creates a governor for the policy.
    #[must_use]
    pub const fn new(policy: GovernancePolicy) -> Self {
        Self {
            policy,
        }
    }

    /// Returns the active policy.
    #[must_use]
    pub const fn policy(&self) -> &GovernancePolicy {
        &self.policy
    }

    /// Copies the ledger counters and display thresholds.
    #[must_use]
    pub const fn snapshot(&self, ledger: &UsageLedger) -> UsageSnapshot {
        UsageSnapshot {
            daily_count: ledger.daily_count(),
            session_count: ledger.session_count(),
            daily_limit: self.policy.daily_limit,
            warning_threshold: self.policy.warning_threshold,
            confirmation_threshold: self.policy.confirmation_threshold,
        }
    }

    /// Derives the advisory usage tier from the session count.
    #[must_use]
    pub const fn usage_level(&self, ledger: &UsageLedger) -> UsageLevel {
        let session = ledger.session_count();
        if session >= self.policy.session_soft_limit {
            UsageLevel::Critical
        } else if session >= self.policy.confirmation_threshold {
            UsageLevel::High
        } else if session >= self.policy.warning_threshold {
            UsageLevel::Warning
        } else {
            UsageLevel::Normal
        }
    }

    /// Evaluates the rules against the ledger without mutating it.
    ///
    /// A rapid-fire match is reported as [`BlockRule::RapidFire`] carrying the
    /// lockout expiry the caller must write back; see [`RateGovernor::govern`].
    #[must_use]
    pub fn evaluate(
        &self,
        ledger: &UsageLedger,
        request: &GovernedRequest<'_>,
        now: Timestamp,
    ) -> GovernanceDecision {
        let usage = self.snapshot(ledger);
        let policy = &self.policy;

        if let Some(until) = ledger.blocked_until()
            && now < until
        {
            return blocked(
                BlockRule::Lockout {
                    until,
                },
                format!(
                    "temporarily blocked until {}, too many rapid requests",
                    until.local_time_label(policy.local_offset)
                ),
                usage,
            );
        }

        if ledger.session_count() >= policy.session_hard_limit {
            return blocked(
                BlockRule::SessionLimit,
                format!("session limit reached ({} calls)", policy.session_hard_limit),
                usage,
            );
        }

        if ledger.daily_count() >= policy.daily_limit {
            return blocked(
                BlockRule::DailyLimit,
                format!("daily limit reached ({} calls)", policy.daily_limit),
                usage,
            );
        }

        if let Some(record) = self.find_duplicate(ledger, request, now) {
            let age = u64::try_from(now.millis_since(record.timestamp)).unwrap_or(0);
            let retry_after_ms = policy.duplicate_window_ms.saturating_sub(age);
            return blocked(
                BlockRule::Duplicate {
                    retry_after_ms,
                },
                format!("duplicate request, wait {} seconds", retry_after_ms.div_ceil(1_000)),
                usage,
            );
        }

        if self.is_rapid_fire(ledger, now) {
            return blocked(
                BlockRule::RapidFire {
                    until: now.saturating_add_millis(policy.lockout_ms),
                },
                format!("too many requests, locked {}s", policy.lockout_ms / 1_000),
                usage,
            );
        }

        if ledger.session_count() >= policy.confirmation_threshold
            && !request.is_confirmed(ledger)
        {
            return GovernanceDecision::RequiresConfirmation {
                reason: format!(
                    "you have made {} calls this session, continue?",
                    ledger.session_count()
                ),
                usage,
                token: ConfirmationToken::issue(
                    request.endpoint_id.clone(),
                    request.fingerprint.clone(),
                    ledger,
                    now,
                ),
            };
        }

        GovernanceDecision::Allowed {
            usage,
        }
    }

    /// Rolls the day over, evaluates, and applies the rapid-fire lockout.
    ///
    /// This is the read-evaluate-mutate-persist cycle; callers must hold
    /// exclusive access to the keeper for its duration.
    pub fn govern(
        &self,
        keeper: &mut LedgerKeeper,
        request: &GovernedRequest<'_>,
        now: Timestamp,
    ) -> Governed {
        let mut faults = Vec::new();
        faults.extend(keeper.rollover_if_new_day(now, &self.policy));
        faults.extend(keeper.clear_block_if_expired(now));
        let decision = self.evaluate(keeper.ledger(), request, now);
        if let GovernanceDecision::Blocked {
            rule: BlockRule::RapidFire {
                until,
            },
            ..
        } = &decision
        {
            faults.extend(keeper.set_blocked_until(*until));
        }
        Governed {
            decision,
            faults,
        }
    }

    /// Finds the most recent identical call inside the duplicate window.
    fn find_duplicate<'l>(
        &self,
        ledger: &'l UsageLedger,
        request: &GovernedRequest<'_>,
        now: Timestamp,
    ) -> Option<&'l CallRecord> {
        let window = millis_i64(self.policy.duplicate_window_ms);
        ledger.recent_calls().iter().rev().find(|record| {
            record.matches(request.endpoint_id, request.fingerprint)
                && now.millis_since(record.timestamp) < window
        })
    }

    /// Returns true when the rapid-fire window already holds the limit.
    fn is_rapid_fire(&self, ledger: &UsageLedger, now: Timestamp) -> bool {
        let window = millis_i64(self.policy.rapid_fire_window_ms);
        let recent = ledger
            .recent_calls()
            .iter()
            .filter(|record| now.millis_since(record.timestamp) < window)
            .count();
        recent >= self.policy.rapid_fire_limit
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a blocked decision.
const fn blocked(rule: BlockRule, reason: String, usage: UsageSnapshot) -> GovernanceDecision {
    GovernanceDecision::Blocked {
        rule,
        reason,
        usage,
    }
}

/// Converts a window length to signed milliseconds.
fn millis_i64(millis: u64) -> i64 {
    i64::try_from(millis).unwrap_or(i64::MAX)
}
