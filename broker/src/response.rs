use copytrade_model::{BrokerOrderId, OrderStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Minimal `{order_id, status}` response shared by place/modify/cancel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: BrokerOrderId,
    pub status: OrderStatus,
}

/// Response to `PlaceSliceOrder`. The broker's slicing endpoint may
/// return either one aggregate id or N slice ids — both shapes collapse
/// to this `Vec`, with a single aggregate response represented as a
/// one-element vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSliceResponse {
    pub acks: Vec<OrderAck>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub order_id: BrokerOrderId,
    pub fill_qty: Decimal,
    pub fill_price: Decimal,
    pub trade_time: DateTime<Utc>,
}
