// crates/quota-gate-core/src/core/mod.rs
// ============================================================================
// Module: Quota Gate Core Types
// Description: Ledger, decision, policy, and fingerprint data types.
// Purpose: Provide stable, serializable types for governance state and outcomes.
// Dependencies: serde, serde_json, serde_jcs, sha2, time
// ============================================================================

//! ## Overview
//! Core types define the persisted usage ledger, the policy thresholds, and
//! the decisions handed to callers. The ledger's serialized form is the
//! persisted schema and must stay stable.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod decision;
pub mod fingerprint;
pub mod hashing;
pub mod identifiers;
pub mod ledger;
pub mod policy;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use decision::BlockRule;
pub use decision::ConfirmationToken;
pub use decision::GovernanceDecision;
pub use decision::UsageLevel;
pub use decision::UsageSnapshot;
pub use fingerprint::Fingerprint;
pub use fingerprint::RequestParams;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use identifiers::EndpointId;
pub use ledger::CallRecord;
pub use ledger::UsageLedger;
pub use policy::BreakerPolicy;
pub use policy::CachePolicy;
pub use policy::GovernancePolicy;
pub use time::CalendarDate;
pub use time::LocalOffset;
pub use time::Timestamp;
