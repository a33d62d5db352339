use crate::enums::{EventSource, OrderStatus};
use crate::ids::BrokerOrderId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An append-only record of an order update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: BrokerOrderId,
    pub event_type: OrderStatus,
    pub source: EventSource,
    pub sequence: i64,
    pub payload: Value,
    pub event_ts: DateTime<Utc>,
}

/// The fields the Stream Consumer extracts from a leader broker push
/// message, and the shape fed to `Replicator::handle` from either the
/// stream or Recovery. The broker's push payload is duck-typed per
/// message kind; the Stream Consumer translates it into this tagged
/// shape once, at the boundary, so nothing downstream re-parses JSON.
///
/// `fields` carries whatever subset of order fields the broker included
/// in this particular update — placements typically carry the full
/// order, while a bare status transition may carry only the changed
/// fields plus timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationEvent {
    pub order_id: BrokerOrderId,
    pub status: OrderStatus,
    pub source: EventSource,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    pub fields: OrderFields,
}

/// Subset of [`crate::Order`] fields that a given update actually carries.
/// Unknown/absent fields are `None` rather than defaulted, so the
/// Replicator can tell "unchanged" from "broker sent zero".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderFields {
    pub security_id: Option<crate::ids::SecurityId>,
    pub side: Option<crate::enums::Side>,
    pub product: Option<crate::enums::Product>,
    pub order_type: Option<crate::enums::OrderType>,
    pub validity: Option<crate::enums::Validity>,
    pub quantity: Option<Decimal>,
    pub disclosed_qty: Option<Decimal>,
    pub price: Option<Decimal>,
    pub trigger_price: Option<Decimal>,
    pub filled_qty: Option<Decimal>,
    pub avg_price: Option<Decimal>,
    pub bo_profit_value: Option<Decimal>,
    pub bo_stop_loss_value: Option<Decimal>,
    pub co_stop_loss_value: Option<Decimal>,
    pub parent_order_id: Option<BrokerOrderId>,
    pub leg_type: Option<crate::enums::LegType>,
    pub correlation_id: Option<crate::ids::CorrelationId>,
    pub is_amo: Option<bool>,
    pub raw: Option<Value>,
}
