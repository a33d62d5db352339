use thiserror::Error;

/// Domain errors the Replicator can raise while handling one event.
/// Transport/rate-limit failures from the broker are classified and
/// recorded on the mapping row rather than propagated here — this enum
/// is for failures that abort the current event's processing outright.
#[derive(Debug, Error)]
pub enum ReplicatorError {
    #[error(transparent)]
    Store(#[from] copytrade_store::StoreError),

    #[error(transparent)]
    InstrumentCache(#[from] crate::instrument_cache::InstrumentCacheError),

    #[error("copy trading is disabled")]
    CopyDisabled,

    #[error("event references unknown leader order {0}")]
    UnknownLeaderOrder(copytrade_model::BrokerOrderId),

    #[error("event for a new order is missing required field `{0}`")]
    IncompleteEvent(&'static str),
}
