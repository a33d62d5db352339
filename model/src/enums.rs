//! Broker-defined enumerations forwarded verbatim between leader and
//! follower requests. Values are kept broker-shaped rather than renamed
//! to a "nicer" internal vocabulary, since the Replicator must copy them
//! through unchanged.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Account {
    Leader,
    Follower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Side {
    Buy,
    Sell,
}

/// `productType`. BO/CO product detection is by equality to `Bo`/`Co` —
/// never by the mere presence of bracket/cover fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Product {
    Cnc,
    Intraday,
    Margin,
    Mtf,
    Co,
    Bo,
}

impl Product {
    pub fn is_bracket(self) -> bool {
        matches!(self, Product::Bo)
    }

    pub fn is_cover(self) -> bool {
        matches!(self, Product::Co)
    }
}

/// `orderType`. Note the broker's wire values are `STOP_LOSS` /
/// `STOP_LOSS_MARKET`; `Sl`/`SlM` are the internal shorthand used
/// throughout this crate and mapped at the broker adapter boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum OrderType {
    Market,
    Limit,
    Sl,
    SlM,
}

impl OrderType {
    /// `true` when a `trigger_price` is meaningful for this order type.
    pub fn requires_trigger_price(self) -> bool {
        matches!(self, OrderType::Sl | OrderType::SlM)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Validity {
    Day,
    Ioc,
}

/// `orderStatus`. Lifecycle: `{Pending,Transit}` -> `Open` ->
/// `{Partial -> Executed | Cancelled | Rejected}`, with
/// `Executed`/`Cancelled`/`Rejected` terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum OrderStatus {
    Pending,
    Transit,
    Open,
    Partial,
    Executed,
    Cancelled,
    Rejected,
    /// Broker-reported modification acknowledgement; not itself terminal
    /// or non-terminal — the Replicator dispatches it to `replicateModify`
    /// and the order's own `status` field tracks the real lifecycle state.
    Modified,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Executed | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    pub fn is_active(self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Transit | OrderStatus::Open | OrderStatus::Partial
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum LegType {
    Entry,
    Target,
    Sl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum MappingStatus {
    Pending,
    Placed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum SizingStrategy {
    CapitalProportional,
    FixedRatio,
    RiskBased,
}

/// `OrderEvent.source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum EventSource {
    Stream,
    Rest,
    Recovery,
}
