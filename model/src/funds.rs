use crate::enums::Account;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Last known available balance for an account. Advisory only — the
/// broker remains the authoritative margin check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FundsSnapshot {
    pub account: Account,
    pub available_balance: Decimal,
    pub fetched_at: DateTime<Utc>,
}

impl FundsSnapshot {
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.fetched_at > ttl
    }
}
