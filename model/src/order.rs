use crate::enums::{Account, OrderStatus, OrderType, Product, Side, Validity};
use crate::ids::{BrokerOrderId, CorrelationId, SecurityId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// An order on either the leader or the follower account.
///
/// Orders are created on first observation (stream or recovery), mutated
/// by subsequent events carrying the same [`BrokerOrderId`], and never
/// deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: BrokerOrderId,
    pub account: Account,
    pub correlation_id: Option<CorrelationId>,

    pub security_id: SecurityId,
    pub exchange_segment: SmolStr,
    pub trading_symbol: SmolStr,

    pub side: Side,
    pub product: Product,
    pub order_type: OrderType,
    pub validity: Validity,

    pub quantity: Decimal,
    pub disclosed_qty: Decimal,
    pub price: Decimal,
    pub trigger_price: Decimal,
    pub filled_qty: Decimal,
    pub remaining_qty: Decimal,
    pub avg_price: Decimal,

    pub status: OrderStatus,

    /// After Market Order — leader placed this outside trading hours for
    /// queued execution at the next session open.
    pub is_amo: bool,

    /// Populated when `product == Bo`.
    pub bo_profit_value: Option<Decimal>,
    pub bo_stop_loss_value: Option<Decimal>,
    /// Populated when `product == Co`.
    pub co_stop_loss_value: Option<Decimal>,

    /// Set on BO child legs; `None` on the entry/standalone order.
    pub parent_order_id: Option<BrokerOrderId>,
    pub leg_type: Option<crate::enums::LegType>,

    /// Set when this order was produced by the broker's slicing endpoint.
    pub slice_group_id: Option<SmolStr>,
    pub slice_index: Option<i32>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Raw broker request/response payloads, kept for audit/debugging.
    pub raw_request: Option<serde_json::Value>,
    pub raw_response: Option<serde_json::Value>,
}

impl Order {
    pub fn is_bo_leg(&self) -> bool {
        self.parent_order_id.is_some()
    }
}
