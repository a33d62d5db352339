//! Minimal in-memory [`Store`] used only by this crate's own tests —
//! exercising the Stream Consumer and Recovery doesn't need a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use copytrade_model::{
    Account, AuditLog, BracketLeg, BrokerOrderId, CopyMapping, CorrelationId, FundsSnapshot,
    Instrument, Order, OrderEvent, SecurityId,
};
use copytrade_store::{Store, StoreError};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
pub struct InMemoryStore {
    orders: Mutex<HashMap<BrokerOrderId, Order>>,
    mappings: Mutex<HashMap<BrokerOrderId, CopyMapping>>,
    legs: Mutex<Vec<BracketLeg>>,
    events: Mutex<Vec<OrderEvent>>,
    audits: Mutex<Vec<AuditLog>>,
    config: Mutex<HashMap<String, String>>,
    funds: Mutex<HashMap<Account, FundsSnapshot>>,
    instruments: Mutex<HashMap<SecurityId, Instrument>>,
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_order(&self, order: &Order) -> Result<(), StoreError> {
        self.orders.lock().await.insert(order.order_id.clone(), order.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: &BrokerOrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.lock().await.get(order_id).cloned())
    }

    async fn get_order_by_correlation(
        &self,
        correlation_id: &CorrelationId,
    ) -> Result<Option<Order>, StoreError> {
        Ok(self
            .orders
            .lock()
            .await
            .values()
            .find(|o| o.correlation_id.as_ref() == Some(correlation_id))
            .cloned())
    }

    async fn commit_replicated_placement(
        &self,
        follower_order: &Order,
        mapping: &CopyMapping,
        cursor_ts: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.orders
            .lock()
            .await
            .insert(follower_order.order_id.clone(), follower_order.clone());
        self.mappings
            .lock()
            .await
            .insert(mapping.leader_order_id.clone(), mapping.clone());
        self.config.lock().await.insert(
            copytrade_model::config_kv::keys::LAST_LEADER_EVENT_TS.to_string(),
            cursor_ts.to_rfc3339(),
        );
        Ok(())
    }

    async fn upsert_mapping(&self, mapping: &CopyMapping) -> Result<(), StoreError> {
        self.mappings
            .lock()
            .await
            .insert(mapping.leader_order_id.clone(), mapping.clone());
        Ok(())
    }

    async fn get_mapping_by_leader(
        &self,
        leader_order_id: &BrokerOrderId,
    ) -> Result<Option<CopyMapping>, StoreError> {
        Ok(self.mappings.lock().await.get(leader_order_id).cloned())
    }

    async fn upsert_bracket_leg(&self, leg: &BracketLeg) -> Result<(), StoreError> {
        let mut legs = self.legs.lock().await;
        legs.retain(|l| {
            !(l.parent_order_id == leg.parent_order_id
                && l.leg_type == leg.leg_type
                && l.account == leg.account)
        });
        legs.push(leg.clone());
        Ok(())
    }

    async fn list_bracket_legs(
        &self,
        parent_order_id: &BrokerOrderId,
    ) -> Result<Vec<BracketLeg>, StoreError> {
        Ok(self
            .legs
            .lock()
            .await
            .iter()
            .filter(|l| &l.parent_order_id == parent_order_id)
            .cloned()
            .collect())
    }

    async fn append_event(&self, event: &OrderEvent) -> Result<(), StoreError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }

    async fn get_config(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.config.lock().await.get(key).cloned())
    }

    async fn set_config(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.config.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn log_audit(&self, entry: &AuditLog) -> Result<(), StoreError> {
        self.audits.lock().await.push(entry.clone());
        Ok(())
    }

    async fn get_funds_snapshot(&self, account: Account) -> Result<Option<FundsSnapshot>, StoreError> {
        Ok(self.funds.lock().await.get(&account).cloned())
    }

    async fn upsert_funds_snapshot(&self, snapshot: &FundsSnapshot) -> Result<(), StoreError> {
        self.funds.lock().await.insert(snapshot.account, *snapshot);
        Ok(())
    }

    async fn get_instrument(&self, security_id: SecurityId) -> Result<Option<Instrument>, StoreError> {
        Ok(self.instruments.lock().await.get(&security_id).cloned())
    }

    async fn upsert_instrument(&self, instrument: &Instrument) -> Result<(), StoreError> {
        self.instruments
            .lock()
            .await
            .insert(instrument.security_id, instrument.clone());
        Ok(())
    }

    async fn list_active_orders(&self, account: Account) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .orders
            .lock()
            .await
            .values()
            .filter(|o| o.account == account && o.status.is_active())
            .cloned()
            .collect())
    }
}
