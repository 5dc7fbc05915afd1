// crates/quota-gate-core/src/core/decision.rs
// ============================================================================
// Module: Governance Decisions
// Description: Decision variants, block rules, usage snapshots, and tokens.
// Purpose: Give callers an immutable, typed outcome for every evaluation.
// Dependencies: serde, crate::core::{fingerprint, identifiers, ledger, time}
// ============================================================================

//! ## Overview
//! A [`GovernanceDecision`] is produced for every evaluated request. Each
//! variant carries a [`UsageSnapshot`] copied at decision time, so rendering
//! a decision can never race with later ledger mutation.
//!
//! `RequiresConfirmation` hands out a [`ConfirmationToken`] bound to the
//! request that triggered it. Presenting the token with the same request
//! grants confirmation for that request only, and only until the
//! ledger moves on.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::core::fingerprint::Fingerprint;
use crate::core::identifiers::EndpointId;
use crate::core::ledger::UsageLedger;
use crate::core::time::CalendarDate;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Usage Snapshot
// ============================================================================

/// Immutable copy of usage counters and display thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    /// Calls recorded today.
    pub daily_count: u64,
    /// Calls recorded this session.
    pub session_count: u64,
    /// Daily hard limit.
    pub daily_limit: u64,
    /// Session count for the warning level.
    pub warning_threshold: u64,
    /// Session count requiring confirmation.
    pub confirmation_threshold: u64,
}

/// Coarse usage tier for UI emphasis.
///
/// # Invariants
/// - Advisory only; never consulted by the governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageLevel {
    /// Below the warning threshold.
    Normal,
    /// At or above the warning threshold.
    Warning,
    /// At or above the confirmation threshold.
    High,
    /// At or above the session soft limit.
    Critical,
}

impl UsageLevel {
    /// Returns a stable label for the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Warning => "warning",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

// ============================================================================
// SECTION: Block Rules
// ============================================================================

/// Governor rule that produced a hard block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum BlockRule {
    /// A previously imposed lockout is still active.
    Lockout {
        /// Lockout expiry.
        until: Timestamp,
    },
    /// The session hard limit is reached.
    SessionLimit,
    /// The daily hard limit is reached.
    DailyLimit,
    /// An identical request was recorded inside the duplicate window.
    Duplicate {
        /// Milliseconds until the duplicate window closes.
        retry_after_ms: u64,
    },
    /// Rapid fire was detected and a new lockout imposed.
    RapidFire {
        /// Lockout expiry written to the ledger.
        until: Timestamp,
    },
}

impl BlockRule {
    /// Returns a stable label for the rule.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lockout {
                ..
            } => "lockout",
            Self::SessionLimit => "session_limit",
            Self::DailyLimit => "daily_limit",
            Self::Duplicate {
                ..
            } => "duplicate",
            Self::RapidFire {
                ..
            } => "rapid_fire",
        }
    }

    /// Returns the lockout expiry when the rule carries one.
    #[must_use]
    pub const fn blocked_until(self) -> Option<Timestamp> {
        match self {
            Self::Lockout {
                until,
            }
            | Self::RapidFire {
                until,
            } => Some(until),
            Self::SessionLimit
            | Self::DailyLimit
            | Self::Duplicate {
                ..
            } => None,
        }
    }
}

// ============================================================================
// SECTION: Confirmation Token
// ============================================================================

/// Capability granting confirmation for one specific pending request.
///
/// # Invariants
/// - Only the governor mints tokens.
/// - A token covers exactly the `(endpoint, fingerprint)` pair it was issued for.
/// - A token is pinned to the ledger state it was issued against. Any recorded
///   call, session reset, or day rollover moves that state and retires it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationToken {
    /// Endpoint of the request awaiting confirmation.
    endpoint_id: EndpointId,
    /// Fingerprint of the request awaiting confirmation.
    fingerprint: Fingerprint,
    /// Evaluation time that issued the token.
    issued_at: Timestamp,
    /// Ledger day the token was issued on.
    issued_on: CalendarDate,
    /// Daily count at issue.
    daily_count: u64,
    /// Session count at issue.
    session_count: u64,
}

impl ConfirmationToken {
    /// Mints a token for a pending request against the current ledger.
    pub(crate) fn issue(
        endpoint_id: EndpointId,
        fingerprint: Fingerprint,
        ledger: &UsageLedger,
        issued_at: Timestamp,
    ) -> Self {
        Self {
            endpoint_id,
            fingerprint,
            issued_at,
            issued_on: ledger.last_reset_date(),
            daily_count: ledger.daily_count(),
            session_count: ledger.session_count(),
        }
    }

    /// Returns true when the token covers the request.
    #[must_use]
    pub fn covers(&self, endpoint_id: &EndpointId, fingerprint: &Fingerprint) -> bool {
        self.endpoint_id == *endpoint_id && self.fingerprint == *fingerprint
    }

    /// Returns true while the ledger still matches the state at issue.
    #[must_use]
    pub fn is_current(&self, ledger: &UsageLedger) -> bool {
        self.issued_on == ledger.last_reset_date()
            && self.daily_count == ledger.daily_count()
            && self.session_count == ledger.session_count()
    }

    /// Returns the endpoint the token was issued for.
    #[must_use]
    pub const fn endpoint_id(&self) -> &EndpointId {
        &self.endpoint_id
    }

    /// Returns the time the token was issued.
    #[must_use]
    pub const fn issued_at(&self) -> Timestamp {
        self.issued_at
    }
}

// ============================================================================
// SECTION: Governance Decision
// ============================================================================

/// Outcome of evaluating one request against the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GovernanceDecision {
    /// The request may proceed.
    Allowed {
        /// Usage at decision time.
        usage: UsageSnapshot,
    },
    /// The request is rejected by a quota rule.
    Blocked {
        /// Rule that fired.
        rule: BlockRule,
        /// User-facing reason.
        reason: String,
        /// Usage at decision time.
        usage: UsageSnapshot,
    },
    /// The request needs explicit user confirmation before it may proceed.
    RequiresConfirmation {
        /// User-facing prompt.
        reason: String,
        /// Usage at decision time.
        usage: UsageSnapshot,
        /// Token to present with the retried request.
        token: ConfirmationToken,
    },
}

impl GovernanceDecision {
    /// Returns the usage snapshot captured with the decision.
    #[must_use]
    pub const fn usage(&self) -> &UsageSnapshot {
        match self {
            Self::Allowed {
                usage,
            }
            | Self::Blocked {
                usage,
                ..
            }
            | Self::RequiresConfirmation {
                usage,
                ..
            } => usage,
        }
    }

    /// Returns true when the request may proceed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    /// Returns the user-facing reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allowed {
                ..
            } => None,
            Self::Blocked {
                reason,
                ..
            }
            | Self::RequiresConfirmation {
                reason,
                ..
            } => Some(reason),
        }
    }

    /// Returns the block rule when the decision is a block.
    #[must_use]
    pub const fn block_rule(&self) -> Option<BlockRule> {
        match self {
            Self::Blocked {
                rule,
                ..
            } => Some(*rule),
            Self::Allowed {
                ..
            }
            | Self::RequiresConfirmation {
                ..
            } => None,
        }
    }

    /// Returns a stable label for the decision kind.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Allowed {
                ..
            } => "allowed",
            Self::Blocked {
                ..
            } => "blocked",
            Self::RequiresConfirmation {
                ..
            } => "requires_confirmation",
        }
    }
}
