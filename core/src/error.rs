//! Aggregating error type for the engine's top-level wiring.
//!
//! Subsystems (broker adapters, the store, the replicator) each carry
//! their own error enum; this one exists only so `main` and the
//! Supervisor have a single `Result` to propagate without a chain of
//! `map_err` calls at every call site.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Broker(#[from] copytrade_broker::BrokerError),

    #[error(transparent)]
    Store(#[from] copytrade_store::StoreError),

    #[error("task join failed: {0}")]
    Join(String),

    #[error("{0}")]
    Other(String),
}

impl From<tokio::task::JoinError> for CoreError {
    fn from(value: tokio::task::JoinError) -> Self {
        CoreError::Join(value.to_string())
    }
}
