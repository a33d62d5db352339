//! Lot size / tick size lookups, populated lazily from the store and,
//! on miss, from the broker — consistent within a single replication
//! pass since entries are never evicted, only inserted.

use crate::rate_limiter::RateLimiter;
use copytrade_broker::BrokerClient;
use copytrade_model::{Account, Instrument, SecurityId};
use copytrade_store::Store;
use dashmap::DashMap;
use std::sync::Arc;

pub struct InstrumentCache {
    store: Arc<dyn Store>,
    broker: Arc<dyn BrokerClient>,
    rate_limiter: Arc<RateLimiter>,
    entries: DashMap<SecurityId, Instrument>,
}

impl InstrumentCache {
    pub fn new(store: Arc<dyn Store>, broker: Arc<dyn BrokerClient>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            store,
            broker,
            rate_limiter,
            entries: DashMap::new(),
        }
    }

    /// Returns the instrument for `security_id`, populating the
    /// in-memory cache (and persisting to the store on a fresh broker
    /// fetch) if this is the first lookup for it.
    pub async fn get(&self, security_id: SecurityId) -> Result<Instrument, InstrumentCacheError> {
        if let Some(entry) = self.entries.get(&security_id) {
            return Ok(entry.clone());
        }

        if let Some(instrument) = self
            .store
            .get_instrument(security_id)
            .await
            .map_err(InstrumentCacheError::Store)?
        {
            self.entries.insert(security_id, instrument.clone());
            return Ok(instrument);
        }

        // Cache and store miss: a genuine broker-side metadata lookup,
        // admission-controlled like any other follower-side call since
        // it can land on the hot path of a symbol's first-ever placement.
        self.rate_limiter.acquire(Account::Follower).await;
        let instrument = self
            .broker
            .get_instrument(security_id)
            .await
            .map_err(InstrumentCacheError::Broker)?;

        self.store
            .upsert_instrument(&instrument)
            .await
            .map_err(InstrumentCacheError::Store)?;
        self.entries.insert(security_id, instrument.clone());
        Ok(instrument)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InstrumentCacheError {
    #[error(transparent)]
    Store(#[from] copytrade_store::StoreError),
    #[error(transparent)]
    Broker(#[from] copytrade_broker::BrokerError),
}
