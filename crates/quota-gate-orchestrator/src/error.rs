// crates/quota-gate-orchestrator/src/error.rs
// ============================================================================
// Module: Search Errors
// Description: Typed outcomes for a search that did not return a payload.
// Purpose: Let callers pick the right message without inspecting text.
// Dependencies: quota-gate-core, thiserror
// ============================================================================

//! ## Overview
//! [`SearchError`] separates network failures from quota outcomes. Only
//! [`SearchError::QuotaBlocked`] and [`SearchError::ConfirmationRequired`]
//! should ever be shown as quota messages; connectivity and upstream
//! failures get a plain error banner.

// ============================================================================
// SECTION: Imports
// ============================================================================

use quota_gate_core::BlockRule;
use quota_gate_core::ConfirmationToken;
use quota_gate_core::UsageSnapshot;
use thiserror::Error;

use crate::transport::TransportError;

// ============================================================================
// SECTION: Search Error
// ============================================================================

/// Reasons a search returned no payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// The request never reached the server or was aborted.
    #[error("connectivity failure: {0}")]
    Connectivity(String),
    /// The server answered with a non-success status.
    #[error("upstream returned http status {status}")]
    Upstream {
        /// HTTP status code.
        status: u16,
    },
    /// The server answered with an unusable body.
    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),
    /// A quota rule blocked the request; no network call was made.
    #[error("{reason}")]
    QuotaBlocked {
        /// Rule that fired.
        rule: BlockRule,
        /// User-facing reason.
        reason: String,
        /// Usage at decision time.
        usage: UsageSnapshot,
    },
    /// The request needs explicit confirmation before it may proceed.
    #[error("{reason}")]
    ConfirmationRequired {
        /// User-facing prompt.
        reason: String,
        /// Usage at decision time.
        usage: UsageSnapshot,
        /// Token to pass with the retried request.
        token: ConfirmationToken,
    },
    /// Automatic re-queries are halted after consecutive failures.
    #[error("paused after {consecutive_failures} consecutive failures, retry manually")]
    CircuitOpen {
        /// Consecutive failures seen by the breaker.
        consecutive_failures: u32,
    },
    /// The request was refused locally before dispatch.
    #[error("request refused: {0}")]
    Refused(String),
    /// The request parameters could not be canonicalized.
    #[error("invalid search request: {0}")]
    InvalidRequest(String),
}

impl SearchError {
    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connectivity(_) => "connectivity",
            Self::Upstream {
                ..
            } => "upstream",
            Self::MalformedResponse(_) => "malformed_response",
            Self::QuotaBlocked {
                ..
            } => "quota_blocked",
            Self::ConfirmationRequired {
                ..
            } => "confirmation_required",
            Self::CircuitOpen {
                ..
            } => "circuit_open",
            Self::Refused(_) => "refused",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }

    /// Returns true for outcomes produced by the quota rules.
    #[must_use]
    pub const fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaBlocked { .. } | Self::ConfirmationRequired { .. })
    }
}

impl From<TransportError> for SearchError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Connectivity(message) => Self::Connectivity(message),
            TransportError::Upstream {
                status,
            } => Self::Upstream {
                status,
            },
            TransportError::MalformedResponse(message) => Self::MalformedResponse(message),
            TransportError::Refused(message) => Self::Refused(message),
        }
    }
}
