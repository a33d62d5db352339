use crate::ids::SecurityId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Lot size / tick size / option metadata for a security.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub security_id: SecurityId,
    pub exchange_segment: SmolStr,
    pub trading_symbol: SmolStr,
    pub lot_size: i64,
    pub tick_size: Decimal,
    /// `Some` when the instrument is an option contract.
    pub option_expiry: Option<chrono::NaiveDate>,
    pub option_strike: Option<Decimal>,
}
