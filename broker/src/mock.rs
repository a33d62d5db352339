//! In-memory [`BrokerClient`] used by integration tests and paper
//! trading. Mirrors the call surface of a real broker closely enough
//! that the Replicator cannot tell the difference, while letting tests
//! script rejections, slow responses, and stream messages.

use crate::client::BrokerClient;
use crate::error::BrokerError;
use crate::request::{CancelOrderRequest, ModifyOrderRequest, PlaceOrderRequest};
use crate::response::{OrderAck, PlaceSliceResponse, Trade};
use crate::stream::{AccountStream, AccountStreamItem, StreamMessage};
use async_trait::async_trait;
use chrono::Utc;
use copytrade_model::{Account, BrokerOrderId, CorrelationId, Instrument, Order, OrderStatus, SecurityId};
use futures::stream;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Default)]
struct Inner {
    orders: HashMap<(Account, BrokerOrderId), Order>,
    funds: HashMap<Account, Decimal>,
    instruments: HashMap<SecurityId, Instrument>,
    /// Queued errors returned by the next N `place_order` calls, FIFO.
    scripted_place_errors: Vec<BrokerError>,
    stream_senders: HashMap<Account, mpsc::UnboundedSender<AccountStreamItem>>,
}

pub struct MockBrokerClient {
    inner: Arc<Mutex<Inner>>,
    next_id: AtomicU64,
}

impl Default for MockBrokerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBrokerClient {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn set_funds(&self, account: Account, balance: Decimal) {
        self.inner.lock().funds.insert(account, balance);
    }

    /// Registers the metadata `get_instrument` returns for `security_id`.
    /// Without a registered instrument, lookups fail with
    /// [`BrokerError::NotFound`] rather than guessing at a lot size.
    pub fn set_instrument(&self, instrument: Instrument) {
        self.inner
            .lock()
            .instruments
            .insert(instrument.security_id, instrument);
    }

    /// Make the next `place_order` call fail with `error` instead of
    /// succeeding, for exercising error-handling paths in tests.
    pub fn script_place_error(&self, error: BrokerError) {
        self.inner.lock().scripted_place_errors.push(error);
    }

    /// Directly mutate a stored order (used by tests to simulate the
    /// broker advancing an order to PARTIAL/EXECUTED out of band) and
    /// push the corresponding message onto that account's stream.
    pub fn push_order_update(&self, account: Account, order: Order) {
        let mut inner = self.inner.lock();
        let event = crate::convert::order_to_replication_event(&order);
        inner
            .orders
            .insert((account, order.order_id.clone()), order);
        if let Some(tx) = inner.stream_senders.get(&account) {
            let _ = tx.send(Ok(StreamMessage::Order(event)));
        }
    }

    pub fn get_stored_order(&self, account: Account, order_id: &BrokerOrderId) -> Option<Order> {
        self.inner
            .lock()
            .orders
            .get(&(account, order_id.clone()))
            .cloned()
    }

    fn allocate_id(&self) -> BrokerOrderId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        BrokerOrderId::new(SmolStr::new(format!("MOCK-{n}")))
    }
}

#[async_trait]
impl BrokerClient for MockBrokerClient {
    async fn place_order(
        &self,
        account: Account,
        request: PlaceOrderRequest,
    ) -> Result<OrderAck, BrokerError> {
        let mut inner = self.inner.lock();
        if let Some(err) = pop_scripted(&mut inner.scripted_place_errors) {
            return Err(err);
        }
        drop(inner);

        let order_id = self.allocate_id();
        let now = Utc::now();
        let order = Order {
            order_id: order_id.clone(),
            account,
            correlation_id: request.correlation_id,
            security_id: request.security_id,
            exchange_segment: request.exchange_segment,
            trading_symbol: request.trading_symbol,
            side: request.side,
            product: request.product,
            order_type: request.order_type,
            validity: request.validity,
            quantity: request.quantity,
            disclosed_qty: request.disclosed_qty,
            price: request.price,
            trigger_price: request.trigger_price.unwrap_or(Decimal::ZERO),
            filled_qty: Decimal::ZERO,
            remaining_qty: request.quantity,
            avg_price: Decimal::ZERO,
            status: OrderStatus::Open,
            is_amo: request.is_amo,
            bo_profit_value: request.bo_profit_value,
            bo_stop_loss_value: request.bo_stop_loss_value,
            co_stop_loss_value: request.co_stop_loss_value,
            parent_order_id: None,
            leg_type: None,
            slice_group_id: None,
            slice_index: None,
            created_at: now,
            updated_at: now,
            raw_request: None,
            raw_response: None,
        };

        self.inner
            .lock()
            .orders
            .insert((account, order_id.clone()), order);

        Ok(OrderAck {
            order_id,
            status: OrderStatus::Open,
        })
    }

    async fn place_slice_order(
        &self,
        account: Account,
        request: PlaceOrderRequest,
    ) -> Result<PlaceSliceResponse, BrokerError> {
        let ack = self.place_order(account, request).await?;
        Ok(PlaceSliceResponse { acks: vec![ack] })
    }

    async fn modify_order(
        &self,
        account: Account,
        request: ModifyOrderRequest,
    ) -> Result<OrderAck, BrokerError> {
        let mut inner = self.inner.lock();
        let order = inner
            .orders
            .get_mut(&(account, request.order_id.clone()))
            .ok_or_else(|| BrokerError::NotFound(request.order_id.to_string()))?;

        if order.status.is_terminal() {
            return Err(BrokerError::OrderRejected(
                "cannot modify terminal order".into(),
            ));
        }

        order.quantity = request.quantity;
        order.remaining_qty = request.quantity - order.filled_qty;
        order.price = request.price;
        order.trigger_price = request.trigger_price.unwrap_or(order.trigger_price);
        order.order_type = request.order_type;
        order.validity = request.validity;
        order.bo_profit_value = request.bo_profit_value.or(order.bo_profit_value);
        order.bo_stop_loss_value = request.bo_stop_loss_value.or(order.bo_stop_loss_value);
        order.co_stop_loss_value = request.co_stop_loss_value.or(order.co_stop_loss_value);
        order.updated_at = Utc::now();

        Ok(OrderAck {
            order_id: order.order_id.clone(),
            status: order.status,
        })
    }

    async fn cancel_order(
        &self,
        account: Account,
        request: CancelOrderRequest,
    ) -> Result<OrderAck, BrokerError> {
        let mut inner = self.inner.lock();
        let order = inner
            .orders
            .get_mut(&(account, request.order_id.clone()))
            .ok_or_else(|| BrokerError::NotFound(request.order_id.to_string()))?;

        if order.status.is_terminal() {
            return Ok(OrderAck {
                order_id: order.order_id.clone(),
                status: order.status,
            });
        }

        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();

        Ok(OrderAck {
            order_id: order.order_id.clone(),
            status: OrderStatus::Cancelled,
        })
    }

    async fn get_order(
        &self,
        account: Account,
        order_id: &BrokerOrderId,
    ) -> Result<Order, BrokerError> {
        self.inner
            .lock()
            .orders
            .get(&(account, order_id.clone()))
            .cloned()
            .ok_or_else(|| BrokerError::NotFound(order_id.to_string()))
    }

    async fn get_order_by_correlation(
        &self,
        account: Account,
        correlation_id: &CorrelationId,
    ) -> Result<Order, BrokerError> {
        self.inner
            .lock()
            .orders
            .values()
            .find(|o| o.account == account && o.correlation_id.as_ref() == Some(correlation_id))
            .cloned()
            .ok_or_else(|| BrokerError::NotFound(correlation_id.to_string()))
    }

    async fn list_orders(&self, account: Account) -> Result<Vec<Order>, BrokerError> {
        Ok(self
            .inner
            .lock()
            .orders
            .values()
            .filter(|o| o.account == account)
            .cloned()
            .collect())
    }

    async fn list_trades(
        &self,
        account: Account,
        order_ids: &[BrokerOrderId],
    ) -> Result<Vec<Trade>, BrokerError> {
        let inner = self.inner.lock();
        Ok(order_ids
            .iter()
            .filter_map(|id| inner.orders.get(&(account, id.clone())))
            .filter(|o| o.filled_qty > Decimal::ZERO)
            .map(|o| Trade {
                order_id: o.order_id.clone(),
                fill_qty: o.filled_qty,
                fill_price: o.avg_price,
                trade_time: o.updated_at,
            })
            .collect())
    }

    async fn get_funds(&self, account: Account) -> Result<Decimal, BrokerError> {
        Ok(self
            .inner
            .lock()
            .funds
            .get(&account)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn account_stream(&self, account: Account) -> Result<AccountStream, BrokerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().stream_senders.insert(account, tx);
        Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }

    async fn get_instrument(&self, security_id: SecurityId) -> Result<Instrument, BrokerError> {
        self.inner
            .lock()
            .instruments
            .get(&security_id)
            .cloned()
            .ok_or_else(|| BrokerError::NotFound(format!("instrument {security_id}")))
    }
}

fn pop_scripted(queue: &mut Vec<BrokerError>) -> Option<BrokerError> {
    if queue.is_empty() {
        None
    } else {
        Some(queue.remove(0))
    }
}
