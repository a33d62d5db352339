use crate::enums::{MappingStatus, SizingStrategy};
use crate::ids::BrokerOrderId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Persistent link between a leader order and its follower counterpart.
/// Unique by `leader_order_id`: a leader order id maps to at most one
/// follower order id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyMapping {
    pub leader_order_id: BrokerOrderId,
    pub follower_order_id: Option<BrokerOrderId>,

    pub leader_qty: Decimal,
    pub follower_qty: Decimal,
    pub sizing_strategy: SizingStrategy,
    pub capital_ratio: Decimal,

    pub status: MappingStatus,
    pub error_message: Option<String>,
}

impl CopyMapping {
    pub fn pending(leader_order_id: BrokerOrderId, sizing_strategy: SizingStrategy) -> Self {
        Self {
            leader_order_id,
            follower_order_id: None,
            leader_qty: Decimal::ZERO,
            follower_qty: Decimal::ZERO,
            sizing_strategy,
            capital_ratio: Decimal::ZERO,
            status: MappingStatus::Pending,
            error_message: None,
        }
    }

    pub fn failed(mut self, reason: impl Into<String>) -> Self {
        self.status = MappingStatus::Failed;
        self.error_message = Some(reason.into());
        self
    }
}
