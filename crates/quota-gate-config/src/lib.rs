// crates/quota-gate-config/src/lib.rs
// ============================================================================
// Module: Quota Gate Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for quota-gate.toml semantics.
// Dependencies: quota-gate-core, quota-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `quota-gate-config` defines the configuration model for Quota Gate and
//! provides strict, fail-closed validation. Every governance threshold is
//! injected from here rather than hard-coded in the runtime.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
