use copytrade_model::{BrokerOrderId, CorrelationId, OrderType, Product, SecurityId, Side, Validity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A place-order request built by `Replicator::replicate_placement`.
/// Fields are conditionally populated by the caller; the broker adapter
/// is responsible for omitting fields the wire format doesn't want
/// (e.g. `trigger_price` for a MARKET order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
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
    pub trigger_price: Option<Decimal>,
    pub bo_profit_value: Option<Decimal>,
    pub bo_stop_loss_value: Option<Decimal>,
    pub co_stop_loss_value: Option<Decimal>,
    pub is_amo: bool,
}

/// Absolute-value modify request — the broker's modify semantics are
/// absolute, not delta, so every field here replaces the order's current
/// value rather than adjusting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyOrderRequest {
    pub order_id: BrokerOrderId,
    pub quantity: Decimal,
    pub price: Decimal,
    pub trigger_price: Option<Decimal>,
    pub order_type: OrderType,
    pub validity: Validity,
    pub bo_profit_value: Option<Decimal>,
    pub bo_stop_loss_value: Option<Decimal>,
    pub co_stop_loss_value: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    pub order_id: BrokerOrderId,
}
