//! Newtype identifiers, following this workspace's convention of wrapping
//! exchange-facing strings rather than passing bare `String`s around.

use derive_more::{Constructor, Display, From};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Broker-assigned order id — the primary key of [`crate::Order`].
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Deserialize, Serialize,
)]
pub struct BrokerOrderId(pub SmolStr);

impl BrokerOrderId {
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }
}

impl From<String> for BrokerOrderId {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

/// Optional user-supplied tag correlating a leader request with its response.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Deserialize, Serialize,
)]
pub struct CorrelationId(pub SmolStr);

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

/// Exchange-assigned security identifier (not the trading symbol).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    From,
    Constructor,
    Deserialize,
    Serialize,
)]
pub struct SecurityId(pub i64);
