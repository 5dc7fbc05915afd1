// crates/quota-gate-cli/src/lib.rs
// ============================================================================
// Module: Quota Gate CLI Library
// Description: Output rendering and the interactive session for the CLI.
// Purpose: Keep CLI behavior testable outside the binary entry point.
// Dependencies: quota-gate-orchestrator, serde, tokio
// ============================================================================

//! ## Overview
//! Shared pieces of the `quota-gate` binary: [`render`] turns search
//! outcomes, usage reports, and errors into user-facing text, and
//! [`session`] drives the line-oriented interactive mode, including the
//! confirm/cancel flow for searches that need explicit approval.

pub mod render;
pub mod session;
