//! TTL-cached available balance per account. Advisory only — the broker
//! remains the authoritative margin check — but good enough to drive
//! the Sizer without a broker round trip on every single event.

use copytrade_broker::BrokerClient;
use copytrade_model::{Account, FundsSnapshot};
use copytrade_store::Store;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

pub struct FundsCache {
    store: Arc<dyn Store>,
    broker: Arc<dyn BrokerClient>,
    ttl: chrono::Duration,
    // One refresh-in-flight mutex per account: concurrent callers for
    // the same account during a refresh wait rather than issuing
    // duplicate broker calls.
    refresh_locks: Mutex<HashMap<Account, Arc<tokio::sync::Mutex<()>>>>,
}

impl FundsCache {
    pub fn new(store: Arc<dyn Store>, broker: Arc<dyn BrokerClient>, ttl: StdDuration) -> Self {
        Self {
            store,
            broker,
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(30)),
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_balance(&self, account: Account) -> Result<Decimal, copytrade_store::StoreError> {
        if let Some(snapshot) = self.store.get_funds_snapshot(account).await? {
            if !snapshot.is_stale(chrono::Utc::now(), self.ttl) {
                return Ok(snapshot.available_balance);
            }
        }
        self.refresh(account).await
    }

    /// Forces a refresh, bypassing the TTL. Called after a placement
    /// fails with an insufficient-funds classification.
    pub async fn invalidate_and_refresh(
        &self,
        account: Account,
    ) -> Result<Decimal, copytrade_store::StoreError> {
        self.refresh(account).await
    }

    async fn refresh(&self, account: Account) -> Result<Decimal, copytrade_store::StoreError> {
        let lock = {
            let mut locks = self.refresh_locks.lock();
            locks
                .entry(account)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        let _guard = lock.lock().await;

        if let Some(snapshot) = self.store.get_funds_snapshot(account).await? {
            if !snapshot.is_stale(chrono::Utc::now(), self.ttl) {
                return Ok(snapshot.available_balance);
            }
        }

        let balance = self
            .broker
            .get_funds(account)
            .await
            .unwrap_or(Decimal::ZERO);
        let snapshot = FundsSnapshot {
            account,
            available_balance: balance,
            fetched_at: chrono::Utc::now(),
        };
        self.store.upsert_funds_snapshot(&snapshot).await?;
        Ok(balance)
    }
}
