//! Pure OCO decision logic over a BO parent's reassembled leg table.
//! Re-evaluates the whole table on every execution event rather than
//! tracking a running state transition, so arriving events out of order
//! still converge to the right answer.

use copytrade_model::{BracketLegs, BrokerOrderId, LegType, OrderStatus};

/// Given that `leg_type` just reached `new_status` on `legs`, returns the
/// sibling order id that should be cancelled, if any. Returns `None`
/// when `leg_type` isn't an exit leg, the new status isn't a terminal
/// execution, or the sibling is already terminal (idempotent no-op).
pub fn sibling_to_cancel_on_execution(
    legs: &BracketLegs,
    leg_type: LegType,
    new_status: OrderStatus,
) -> Option<BrokerOrderId> {
    if new_status != OrderStatus::Executed {
        return None;
    }
    let sibling = legs.sibling_of(leg_type)?;
    if sibling.status.is_terminal() {
        return None;
    }
    Some(sibling.leg_order_id.clone())
}

/// All non-terminal leg order ids for a parent being cancelled outright
/// (user-initiated cancel of the BO parent itself).
pub fn non_terminal_legs(legs: &BracketLegs) -> Vec<BrokerOrderId> {
    [&legs.entry, &legs.target, &legs.sl]
        .into_iter()
        .flatten()
        .filter(|leg| !leg.status.is_terminal())
        .map(|leg| leg.leg_order_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use copytrade_model::{Account, BracketLeg};

    fn leg(id: &str, leg_type: LegType, status: OrderStatus) -> BracketLeg {
        BracketLeg {
            parent_order_id: BrokerOrderId::new("PARENT"),
            leg_order_id: BrokerOrderId::new(id),
            leg_type,
            account: Account::Follower,
            status,
        }
    }

    #[test]
    fn target_executed_cancels_open_sl() {
        let legs = BracketLegs {
            entry: Some(leg("ENTRY", LegType::Entry, OrderStatus::Executed)),
            target: Some(leg("TGT", LegType::Target, OrderStatus::Executed)),
            sl: Some(leg("SL", LegType::Sl, OrderStatus::Open)),
        };
        let result =
            sibling_to_cancel_on_execution(&legs, LegType::Target, OrderStatus::Executed);
        assert_eq!(result, Some(BrokerOrderId::new("SL")));
    }

    #[test]
    fn already_terminal_sibling_is_a_no_op() {
        let legs = BracketLegs {
            entry: Some(leg("ENTRY", LegType::Entry, OrderStatus::Executed)),
            target: Some(leg("TGT", LegType::Target, OrderStatus::Executed)),
            sl: Some(leg("SL", LegType::Sl, OrderStatus::Cancelled)),
        };
        let result =
            sibling_to_cancel_on_execution(&legs, LegType::Target, OrderStatus::Executed);
        assert_eq!(result, None);
    }

    #[test]
    fn partial_fill_does_not_trigger_oco() {
        let legs = BracketLegs {
            entry: Some(leg("ENTRY", LegType::Entry, OrderStatus::Executed)),
            target: Some(leg("TGT", LegType::Target, OrderStatus::Partial)),
            sl: Some(leg("SL", LegType::Sl, OrderStatus::Open)),
        };
        let result =
            sibling_to_cancel_on_execution(&legs, LegType::Target, OrderStatus::Partial);
        assert_eq!(result, None);
    }

    #[test]
    fn non_terminal_legs_excludes_executed_and_cancelled() {
        let legs = BracketLegs {
            entry: Some(leg("ENTRY", LegType::Entry, OrderStatus::Executed)),
            target: Some(leg("TGT", LegType::Target, OrderStatus::Open)),
            sl: Some(leg("SL", LegType::Sl, OrderStatus::Cancelled)),
        };
        assert_eq!(non_terminal_legs(&legs), vec![BrokerOrderId::new("TGT")]);
    }
}
