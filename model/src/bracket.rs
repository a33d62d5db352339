use crate::enums::{Account, LegType, OrderStatus};
use crate::ids::BrokerOrderId;
use serde::{Deserialize, Serialize};

/// One leg of a BO parent order, unique by `(parent_order_id, leg_type,
/// account)`. Kept as a flat table rather than a pointer graph so OCO
/// evaluation is a lookup, not a traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketLeg {
    pub parent_order_id: BrokerOrderId,
    pub leg_order_id: BrokerOrderId,
    pub leg_type: LegType,
    pub account: Account,
    pub status: OrderStatus,
}

/// The three-leg state of a BO parent, reassembled from the flat
/// [`BracketLeg`] table for OCO evaluation.
#[derive(Debug, Clone, Default)]
pub struct BracketLegs {
    pub entry: Option<BracketLeg>,
    pub target: Option<BracketLeg>,
    pub sl: Option<BracketLeg>,
}

impl BracketLegs {
    pub fn from_rows(rows: Vec<BracketLeg>) -> Self {
        let mut legs = BracketLegs::default();
        for row in rows {
            match row.leg_type {
                LegType::Entry => legs.entry = Some(row),
                LegType::Target => legs.target = Some(row),
                LegType::Sl => legs.sl = Some(row),
            }
        }
        legs
    }

    /// The sibling exit leg of `leg_type`, per OCO pairing of TARGET/SL.
    pub fn sibling_of(&self, leg_type: LegType) -> Option<&BracketLeg> {
        match leg_type {
            LegType::Target => self.sl.as_ref(),
            LegType::Sl => self.target.as_ref(),
            LegType::Entry => None,
        }
    }
}
