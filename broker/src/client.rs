use crate::error::BrokerError;
use crate::request::{CancelOrderRequest, ModifyOrderRequest, PlaceOrderRequest};
use crate::response::{OrderAck, PlaceSliceResponse, Trade};
use crate::stream::AccountStream;
use async_trait::async_trait;
use copytrade_model::{Account, BrokerOrderId, CorrelationId, Instrument, Order, SecurityId};
use rust_decimal::Decimal;

/// The broker's REST + push-stream surface. Implementations
/// are adapters: [`crate::mock::MockBrokerClient`] for tests and paper
/// trading, [`crate::rest::RestBrokerClient`] for the live HTTP API.
///
/// The Replicator and Recovery depend only on this trait — never on a
/// concrete client — so the core replication logic is broker-agnostic
/// modulo the enumerations in `copytrade_model::enums`.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn place_order(
        &self,
        account: Account,
        request: PlaceOrderRequest,
    ) -> Result<OrderAck, BrokerError>;

    async fn place_slice_order(
        &self,
        account: Account,
        request: PlaceOrderRequest,
    ) -> Result<PlaceSliceResponse, BrokerError>;

    async fn modify_order(
        &self,
        account: Account,
        request: ModifyOrderRequest,
    ) -> Result<OrderAck, BrokerError>;

    async fn cancel_order(
        &self,
        account: Account,
        request: CancelOrderRequest,
    ) -> Result<OrderAck, BrokerError>;

    async fn get_order(
        &self,
        account: Account,
        order_id: &BrokerOrderId,
    ) -> Result<Order, BrokerError>;

    async fn get_order_by_correlation(
        &self,
        account: Account,
        correlation_id: &CorrelationId,
    ) -> Result<Order, BrokerError>;

    /// Used by Recovery to fetch the full order book for replay after
    /// a reconnect.
    async fn list_orders(&self, account: Account) -> Result<Vec<Order>, BrokerError>;

    async fn list_trades(
        &self,
        account: Account,
        order_ids: &[BrokerOrderId],
    ) -> Result<Vec<Trade>, BrokerError>;

    async fn get_funds(&self, account: Account) -> Result<Decimal, BrokerError>;

    /// Opens the account's push stream of order-update messages.
    async fn account_stream(&self, account: Account) -> Result<AccountStream, BrokerError>;

    /// Looks up lot size, tick size, and segment/symbol metadata for a
    /// security. Called by the Replicator's instrument cache on a cache
    /// miss, through the same rate limiter as order placement.
    async fn get_instrument(&self, security_id: SecurityId) -> Result<Instrument, BrokerError>;
}
