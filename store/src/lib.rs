//! # Store
//!
//! Single-writer persistence for the order-replication engine, backed
//! by PostgreSQL via `sqlx`. [`traits::Store`] is the seam the
//! Replicator, Recovery, and the rate limiter depend on;
//! [`postgres::PostgresStore`] is the only implementation shipped here.

pub mod error;
pub mod postgres;
pub mod traits;

pub use error::StoreError;
pub use postgres::PostgresStore;
pub use traits::Store;
