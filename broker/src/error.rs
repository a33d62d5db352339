use thiserror::Error;

/// Broker-facing error taxonomy. `Rate limited` and `Transport` are
/// retried by the caller; the rest are surfaced to the Replicator as
/// domain errors recorded on the mapping row.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("transport: {0}")]
    Transport(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("authentication rejected: {0}")]
    Authentication(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("order rejected: {0}")]
    OrderRejected(String),

    #[error("order not found: {0}")]
    NotFound(String),

    #[error("malformed broker response: {0}")]
    Malformed(String),
}

impl BrokerError {
    /// Best-effort classification used by the Replicator to decide
    /// whether an error is locally retryable or must be recorded on the
    /// mapping row.
    pub fn is_transient(&self) -> bool {
        matches!(self, BrokerError::Transport(_) | BrokerError::RateLimited { .. })
    }
}

impl From<reqwest::Error> for BrokerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            BrokerError::Transport(err.to_string())
        } else if let Some(status) = err.status() {
            if status.as_u16() == 429 {
                BrokerError::RateLimited {
                    retry_after_ms: 1_000,
                }
            } else if status.is_server_error() {
                BrokerError::Transport(err.to_string())
            } else {
                BrokerError::OrderRejected(err.to_string())
            }
        } else {
            BrokerError::Transport(err.to_string())
        }
    }
}
