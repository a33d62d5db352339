//! Replay of missed leader activity after a reconnect (or at cold
//! start), fed through the same [`Replicator::handle`] entry point the
//! live stream uses.

use crate::error::StreamError;
use chrono::{DateTime, Utc};
use copytrade_broker::BrokerClient;
use copytrade_model::{config_kv::keys, Account, EventSource};
use copytrade_replicator::Replicator;
use copytrade_store::Store;
use std::sync::Arc;

pub struct Recovery {
    store: Arc<dyn Store>,
    broker: Arc<dyn BrokerClient>,
    replicator: Arc<Replicator>,
    cold_start_lookback: chrono::Duration,
}

impl Recovery {
    pub fn new(
        store: Arc<dyn Store>,
        broker: Arc<dyn BrokerClient>,
        replicator: Arc<Replicator>,
        cold_start_lookback: chrono::Duration,
    ) -> Self {
        Self {
            store,
            broker,
            replicator,
            cold_start_lookback,
        }
    }

    /// Fetches every leader order created since the persisted cursor (or
    /// `now - cold_start_lookback` if there is none yet), replays them
    /// oldest-first by create time through the Replicator, and returns
    /// how many were replayed. A single order failing to replay is
    /// logged and skipped rather than aborting the whole batch.
    pub async fn run(&self) -> Result<usize, StreamError> {
        let cursor = self.cursor().await?;

        let mut orders = self.broker.list_orders(Account::Leader).await?;
        orders.retain(|o| o.created_at > cursor);
        orders.sort_by_key(|o| o.created_at);

        let mut replayed = 0usize;
        for order in &orders {
            let mut event = copytrade_broker::convert::order_to_replication_event(order);
            event.source = EventSource::Recovery;
            if let Err(err) = self.replicator.handle(&event).await {
                tracing::warn!(
                    order_id = %order.order_id,
                    error = %err,
                    "recovery replay failed for one order, continuing",
                );
                continue;
            }
            replayed += 1;
        }

        tracing::info!(replayed, total = orders.len(), cursor = %cursor, "recovery replay complete");
        Ok(replayed)
    }

    async fn cursor(&self) -> Result<DateTime<Utc>, StreamError> {
        let persisted = self
            .store
            .get_config(keys::LAST_LEADER_EVENT_TS)
            .await?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc));
        Ok(persisted.unwrap_or_else(|| Utc::now() - self.cold_start_lookback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemoryStore;
    use copytrade_broker::mock::MockBrokerClient;
    use copytrade_replicator::{FundsCache, InstrumentCache, LockRegistry, RateLimiter, SizingPolicy};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    #[tokio::test]
    async fn cold_start_uses_lookback_when_no_cursor_persisted() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::default());
        let broker_impl = MockBrokerClient::new();
        broker_impl.set_funds(Account::Leader, dec!(1_000_000));
        broker_impl.set_funds(Account::Follower, dec!(1_000_000));
        let broker: Arc<dyn BrokerClient> = Arc::new(broker_impl);

        let rate_limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(1)));
        let instruments = Arc::new(InstrumentCache::new(store.clone(), broker.clone(), rate_limiter.clone()));
        let funds = Arc::new(FundsCache::new(
            store.clone(),
            broker.clone(),
            std::time::Duration::from_secs(30),
        ));
        let replicator = Arc::new(copytrade_replicator::Replicator::new(
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

        let recovery = Recovery::new(store, broker, replicator, chrono::Duration::hours(1));
        let replayed = recovery.run().await.unwrap();
        assert_eq!(replayed, 0);
    }
}
