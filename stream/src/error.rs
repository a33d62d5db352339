use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Broker(#[from] copytrade_broker::BrokerError),

    #[error(transparent)]
    Store(#[from] copytrade_store::StoreError),

    #[error(transparent)]
    Replicator(#[from] copytrade_replicator::ReplicatorError),

    #[error("leader stream ended")]
    StreamEnded,

    #[error("heartbeat timeout elapsed")]
    HeartbeatTimeout,

    #[error("exceeded {0} consecutive reconnect attempts, giving up on the leader stream")]
    ReconnectAttemptsExhausted(u32),
}
