use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use copytrade_model::{
    AuditLog, BracketLeg, BrokerOrderId, ConfigKv, CopyMapping, CorrelationId, FundsSnapshot,
    Instrument, Order, OrderEvent, SecurityId,
};

/// Persistence boundary the Replicator, Recovery, and the rate limiter
/// depend on. [`PostgresStore`](crate::postgres::PostgresStore) is the
/// only implementation this workspace ships; the trait exists so
/// integration tests can swap in an in-memory fake without touching a
/// real database.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a new order row, or updates it in place if `order_id`
    /// already exists. Orders are never deleted.
    async fn upsert_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn get_order(&self, order_id: &BrokerOrderId) -> Result<Option<Order>, StoreError>;

    async fn get_order_by_correlation(
        &self,
        correlation_id: &CorrelationId,
    ) -> Result<Option<Order>, StoreError>;

    /// Atomically commits the result of successfully replicating a
    /// placement: the new follower order row, the mapping linking it to
    /// the leader order, and the advanced replay cursor, all in one
    /// transaction. A crash between these three writes must never leave
    /// a follower order with no mapping, or a mapping pointing at an
    /// order row that doesn't exist.
    async fn commit_replicated_placement(
        &self,
        follower_order: &Order,
        mapping: &CopyMapping,
        cursor_ts: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn upsert_mapping(&self, mapping: &CopyMapping) -> Result<(), StoreError>;

    async fn get_mapping_by_leader(
        &self,
        leader_order_id: &BrokerOrderId,
    ) -> Result<Option<CopyMapping>, StoreError>;

    async fn upsert_bracket_leg(&self, leg: &BracketLeg) -> Result<(), StoreError>;

    async fn list_bracket_legs(
        &self,
        parent_order_id: &BrokerOrderId,
    ) -> Result<Vec<BracketLeg>, StoreError>;

    async fn append_event(&self, event: &OrderEvent) -> Result<(), StoreError>;

    async fn get_config(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_config(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn log_audit(&self, entry: &AuditLog) -> Result<(), StoreError>;

    async fn get_funds_snapshot(
        &self,
        account: copytrade_model::Account,
    ) -> Result<Option<FundsSnapshot>, StoreError>;

    async fn upsert_funds_snapshot(&self, snapshot: &FundsSnapshot) -> Result<(), StoreError>;

    async fn get_instrument(
        &self,
        security_id: SecurityId,
    ) -> Result<Option<Instrument>, StoreError>;

    async fn upsert_instrument(&self, instrument: &Instrument) -> Result<(), StoreError>;

    /// Every order the given account currently has in a non-terminal
    /// status, oldest first. Used by Recovery to decide what to replay
    /// after a reconnect, and nowhere else — callers that only need one
    /// order should use [`Store::get_order`].
    async fn list_active_orders(
        &self,
        account: copytrade_model::Account,
    ) -> Result<Vec<Order>, StoreError>;
}
