//! # Replicator
//!
//! The engine's single entry point: [`Replicator::handle`] consumes one
//! leader order event at a time (from the Stream Consumer or Recovery)
//! and drives the follower account to match it — placements,
//! modifications, cancels, executions, and the bracket-order OCO
//! state machine. Owns the rate limiter, instrument cache, funds cache,
//! and per-order-id lock registry that the replication steps depend on.

pub mod bracket;
pub mod error;
pub mod funds_cache;
pub mod instrument_cache;
pub mod lock_registry;
pub mod rate_limiter;
pub mod replicator;

pub use error::ReplicatorError;
pub use funds_cache::FundsCache;
pub use instrument_cache::InstrumentCache;
pub use lock_registry::LockRegistry;
pub use rate_limiter::RateLimiter;
pub use replicator::{Replicator, SizingPolicy};
