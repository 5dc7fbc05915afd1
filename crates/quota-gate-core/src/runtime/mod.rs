// crates/quota-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Quota Gate Runtime
// Description: Governor, ledger keeper, response cache, breaker, and stores.
// Purpose: Turn ledger state and policy into decisions and keep state current.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules evaluate requests, apply ledger mutations, and track
//! upstream health. Nothing here performs network I/O or reads the clock;
//! hosts supply `now` and run the actual call.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod breaker;
pub mod cache;
pub mod governor;
pub mod keeper;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use breaker::CircuitBreaker;
pub use cache::ResponseCache;
pub use governor::Governed;
pub use governor::GovernedRequest;
pub use governor::RateGovernor;
pub use keeper::LedgerKeeper;
pub use keeper::LedgerOperation;
pub use keeper::PersistenceFault;
pub use store::InMemoryLedgerStore;
pub use store::SharedLedgerStore;
