//! Owns the leader's push connection: tracks heartbeats, reconnects
//! with [`Backoff`] on any disconnect, and triggers [`Recovery`] after
//! every reconnect so nothing pushed during the gap is lost.

use crate::backoff::Backoff;
use crate::error::StreamError;
use crate::recovery::Recovery;
use copytrade_broker::{AccountStream, BrokerClient, StreamMessage};
use copytrade_core::metrics::Counters;
use copytrade_core::shutdown::Shutdown;
use copytrade_model::Account;
use copytrade_replicator::Replicator;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub struct StreamConsumer {
    broker: Arc<dyn BrokerClient>,
    replicator: Arc<Replicator>,
    recovery: Arc<Recovery>,
    heartbeat_timeout: Duration,
    backoff: Backoff,
    max_reconnect_attempts: u32,
    counters: Arc<Counters>,
}

impl StreamConsumer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        broker: Arc<dyn BrokerClient>,
        replicator: Arc<Replicator>,
        recovery: Arc<Recovery>,
        heartbeat_timeout: Duration,
        reconnect_backoff_min: Duration,
        reconnect_backoff_max: Duration,
        max_reconnect_attempts: u32,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            broker,
            replicator,
            recovery,
            heartbeat_timeout,
            backoff: Backoff::new(reconnect_backoff_min, reconnect_backoff_max, max_reconnect_attempts),
            max_reconnect_attempts,
            counters,
        }
    }

    /// Runs until `shutdown` fires or the leader stream has failed to
    /// reconnect `max_reconnect_attempts` times in a row, in which case
    /// this returns `Err` so the caller can escalate to the Supervisor
    /// and exit the process non-zero.
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<Shutdown>) -> Result<(), StreamError> {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("stream consumer received shutdown signal");
                    return Ok(());
                }
                result = self.connect_and_drain() => {
                    if let Err(err) = result {
                        tracing::warn!(error = %err, "leader stream disconnected");
                    }
                }
            }

            if let Err(err) = self.recovery.run().await {
                tracing::warn!(error = %err, "recovery replay failed after disconnect");
            }

            Counters::incr(&self.counters.reconnects);

            if self.backoff.record_attempt() {
                tracing::error!(
                    max_reconnect_attempts = self.max_reconnect_attempts,
                    "exhausted reconnect attempts against leader stream, giving up",
                );
                return Err(StreamError::ReconnectAttemptsExhausted(self.max_reconnect_attempts));
            }

            let delay = self.backoff.next_delay();
            tracing::info!(delay_secs = delay.as_secs(), "reconnecting to leader stream");
            tokio::time::sleep(delay).await;
        }
    }

    async fn connect_and_drain(&mut self) -> Result<(), StreamError> {
        let mut stream: AccountStream = self.broker.account_stream(Account::Leader).await?;
        self.backoff.reset();

        loop {
            match tokio::time::timeout(self.heartbeat_timeout, stream.next()).await {
                Ok(Some(Ok(StreamMessage::Order(event)))) => {
                    if let Err(err) = self.replicator.handle(&event).await {
                        tracing::warn!(
                            order_id = %event.order_id,
                            error = %err,
                            "event handling failed, continuing stream",
                        );
                    }
                }
                Ok(Some(Ok(StreamMessage::Heartbeat))) => {
                    tracing::trace!("heartbeat received");
                }
                Ok(Some(Ok(StreamMessage::Unknown(payload)))) => {
                    tracing::debug!(?payload, "unrecognised stream message, ignored");
                }
                Ok(Some(Err(err))) => return Err(StreamError::Broker(err)),
                Ok(None) => return Err(StreamError::StreamEnded),
                Err(_) => return Err(StreamError::HeartbeatTimeout),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemoryStore;
    use copytrade_broker::mock::MockBrokerClient;
    use copytrade_replicator::{FundsCache, InstrumentCache, LockRegistry, RateLimiter, SizingPolicy};
    use rust_decimal_macros::dec;

    fn build_consumer(broker: Arc<dyn BrokerClient>) -> StreamConsumer {
        let store: Arc<dyn copytrade_store::Store> = Arc::new(InMemoryStore::default());
        let rate_limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(1)));
        let instruments = Arc::new(InstrumentCache::new(store.clone(), broker.clone(), rate_limiter.clone()));
        let funds = Arc::new(FundsCache::new(
            store.clone(),
            broker.clone(),
            std::time::Duration::from_secs(30),
        ));
        let replicator = Arc::new(Replicator::new(
            store.clone(),
            broker.clone(),
            instruments,
            funds,
            rate_limiter,
            Arc::new(LockRegistry::new()),
            SizingPolicy {
                strategy: copytrade_model::SizingStrategy::CapitalProportional,
                fixed_ratio: dec!(1),
                max_position_pct: dec!(100),
            },
            chrono::Duration::seconds(60),
            Arc::new(copytrade_core::metrics::Counters::default()),
            Vec::new(),
        ));
        let recovery = Arc::new(Recovery::new(
            store,
            broker.clone(),
            replicator.clone(),
            chrono::Duration::hours(1),
        ));
        StreamConsumer::new(
            broker,
            replicator,
            recovery,
            Duration::from_millis(50),
            Duration::from_millis(1),
            Duration::from_millis(5),
            10,
            Arc::new(copytrade_core::metrics::Counters::default()),
        )
    }

    #[tokio::test]
    async fn heartbeat_timeout_is_treated_as_a_disconnect() {
        let broker_impl = MockBrokerClient::new();
        let broker: Arc<dyn BrokerClient> = Arc::new(broker_impl);
        let mut consumer = build_consumer(broker.clone());

        // No one ever pushes a heartbeat onto the opened stream, so the
        // very first read must time out.
        let result = consumer.connect_and_drain().await;
        assert!(matches!(result, Err(StreamError::HeartbeatTimeout)));
    }

    #[tokio::test]
    async fn run_gives_up_after_exhausting_reconnect_attempts() {
        let broker_impl = MockBrokerClient::new();
        let broker: Arc<dyn BrokerClient> = Arc::new(broker_impl);
        let mut consumer = build_consumer(broker.clone());
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        // The stream never carries a heartbeat, so every reconnect times
        // out immediately and the loop should escalate once it burns
        // through the configured attempt cap instead of retrying forever.
        let result = consumer.run(shutdown_rx).await;
        assert!(matches!(
            result,
            Err(StreamError::ReconnectAttemptsExhausted(10))
        ));
    }
}
