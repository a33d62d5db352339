//! # Sizer
//!
//! Pure, deterministic position-sizing. No I/O, no clock, no broker
//! calls — callers resolve `leader_balance`/`follower_balance`/
//! `premium`/`lot_size` via the Instrument Cache and Funds Snapshot
//! before calling in.

use copytrade_model::SizingStrategy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Inputs to a single sizing computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingInput {
    pub leader_qty: Decimal,
    pub leader_balance: Decimal,
    pub follower_balance: Decimal,
    pub lot_size: Decimal,
    /// Limit price if present, else a last-trade-price proxy.
    pub premium: Decimal,
    pub strategy: SizingStrategy,
    /// Strategy-specific ratio, used by `FixedRatio`.
    pub fixed_ratio: Decimal,
    /// Used by `RiskBased`, expressed as a percentage (e.g. `dec!(2)` for 2%).
    pub max_position_pct: Decimal,
    /// Leader's disclosed (iceberg) quantity, if the leader order set one.
    pub leader_disclosed_qty: Option<Decimal>,
}

/// Output of a sizing computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingOutput {
    pub follower_qty: Decimal,
    pub disclosed_qty: Option<Decimal>,
}

impl SizingOutput {
    pub fn zero() -> Self {
        Self {
            follower_qty: Decimal::ZERO,
            disclosed_qty: None,
        }
    }
}

/// Rounds `value` down to the nearest non-negative multiple of `lot_size`.
/// Returns zero if `lot_size` is not strictly positive (can't express a
/// "lot" of zero or negative size).
fn floor_to_lot(value: Decimal, lot_size: Decimal) -> Decimal {
    if lot_size <= Decimal::ZERO || value <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (value / lot_size).floor() * lot_size
}

/// Computes the follower quantity for a single leader event.
///
/// Post-conditions: the result is always a non-negative multiple of
/// `lot_size`. A result below one lot is reported as zero — the caller
/// (`Replicator::replicate_placement`) must not place an order when
/// `follower_qty == 0`.
pub fn compute(input: SizingInput) -> SizingOutput {
    let raw = match input.strategy {
        SizingStrategy::CapitalProportional => {
            if input.leader_balance <= Decimal::ZERO {
                Decimal::ZERO
            } else {
                input.leader_qty * (input.follower_balance / input.leader_balance)
            }
        }
        SizingStrategy::FixedRatio => input.leader_qty * input.fixed_ratio,
        SizingStrategy::RiskBased => {
            let max_notional =
                input.follower_balance * (input.max_position_pct / Decimal::from(100));
            let denom = input.premium * input.lot_size;
            if denom <= Decimal::ZERO {
                Decimal::ZERO
            } else {
                let lots = (max_notional / denom).floor();
                lots * input.lot_size
            }
        }
    };

    let follower_qty = match input.strategy {
        SizingStrategy::RiskBased => {
            // `raw` above is already `lots * lot_size`; re-floor defensively
            // in case `lots` was fractional due to a non-integer lot_size.
            floor_to_lot(raw, input.lot_size)
        }
        _ => floor_to_lot(raw, input.lot_size),
    };

    if follower_qty < input.lot_size {
        return SizingOutput::zero();
    }

    let disclosed_qty = input.leader_disclosed_qty.and_then(|leader_disclosed| {
        if leader_disclosed <= Decimal::ZERO || input.leader_qty <= Decimal::ZERO {
            return None;
        }
        let scaled = (leader_disclosed * follower_qty / input.leader_qty).round();
        Some(scaled.clamp(input.lot_size, follower_qty))
    });

    SizingOutput {
        follower_qty,
        disclosed_qty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_input(strategy: SizingStrategy) -> SizingInput {
        SizingInput {
            leader_qty: dec!(50),
            leader_balance: dec!(1_000_000),
            follower_balance: dec!(500_000),
            lot_size: dec!(1),
            premium: dec!(100),
            strategy,
            fixed_ratio: dec!(0.5),
            max_position_pct: dec!(2),
            leader_disclosed_qty: None,
        }
    }

    #[test]
    fn capital_proportional_basic_scenario() {
        // Lot size 1 here to get a non-zero result from the basic ratio.
        let input = base_input(SizingStrategy::CapitalProportional);
        let out = compute(input);
        assert_eq!(out.follower_qty, dec!(25));
    }

    #[test]
    fn capital_proportional_with_lot_50_yields_zero() {
        let mut input = base_input(SizingStrategy::CapitalProportional);
        input.lot_size = dec!(50);
        let out = compute(input);
        assert_eq!(out.follower_qty, Decimal::ZERO);
    }

    #[test]
    fn fixed_ratio_scales_by_ratio_and_floors_to_lot() {
        let mut input = base_input(SizingStrategy::FixedRatio);
        input.lot_size = dec!(1);
        input.fixed_ratio = dec!(0.5);
        input.leader_qty = dec!(100);
        let out = compute(input);
        assert_eq!(out.follower_qty, dec!(50));
    }

    #[test]
    fn risk_based_caps_by_notional() {
        let mut input = base_input(SizingStrategy::RiskBased);
        input.follower_balance = dec!(100_000);
        input.max_position_pct = dec!(10); // 10% -> 10,000 notional cap
        input.premium = dec!(100);
        input.lot_size = dec!(1);
        let out = compute(input);
        // lots = floor(10_000 / (100*1)) = 100
        assert_eq!(out.follower_qty, dec!(100));
    }

    #[test]
    fn zero_leader_balance_does_not_panic() {
        let mut input = base_input(SizingStrategy::CapitalProportional);
        input.leader_balance = Decimal::ZERO;
        let out = compute(input);
        assert_eq!(out.follower_qty, Decimal::ZERO);
    }

    #[test]
    fn disclosed_quantity_scales_and_clamps() {
        let mut input = base_input(SizingStrategy::CapitalProportional);
        input.lot_size = dec!(1);
        input.leader_qty = dec!(100);
        input.follower_balance = dec!(1_000_000);
        input.leader_balance = dec!(1_000_000);
        input.leader_disclosed_qty = Some(dec!(10));
        let out = compute(input);
        assert_eq!(out.follower_qty, dec!(100));
        // scaled = round(10 * 100 / 100) = 10, clamped to [1, 100]
        assert_eq!(out.disclosed_qty, Some(dec!(10)));
    }

    proptest::proptest! {
        #[test]
        fn follower_qty_is_always_a_non_negative_multiple_of_lot_size(
            leader_qty in 1i64..100_000,
            leader_balance in 1i64..10_000_000,
            follower_balance in 0i64..10_000_000,
            lot_size in 1i64..1_000,
        ) {
            let input = SizingInput {
                leader_qty: Decimal::from(leader_qty),
                leader_balance: Decimal::from(leader_balance),
                follower_balance: Decimal::from(follower_balance),
                lot_size: Decimal::from(lot_size),
                premium: dec!(1),
                strategy: SizingStrategy::CapitalProportional,
                fixed_ratio: dec!(1),
                max_position_pct: dec!(100),
                leader_disclosed_qty: None,
            };
            let out = compute(input);
            prop_assert!(out.follower_qty >= Decimal::ZERO);
            prop_assert_eq!(out.follower_qty % Decimal::from(lot_size), Decimal::ZERO);
        }
    }
}
