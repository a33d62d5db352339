//! # Data Model
//!
//! Shared entities for the order-replication engine: the [`Order`] the
//! leader/follower brokers expose, the [`CopyMapping`] linking a leader
//! order to its follower counterpart, [`BracketLeg`] rows for BO/CO
//! child legs, append-only [`OrderEvent`]s, and the supporting
//! [`FundsSnapshot`], [`Instrument`], [`AuditLog`] and [`ConfigKv`]
//! records.
//!
//! This crate has no I/O of its own — [`copytrade_store`](../copytrade_store)
//! persists these types and [`copytrade_broker`](../copytrade_broker) maps
//! them on and off the wire.

pub mod audit;
pub mod bracket;
pub mod config_kv;
pub mod enums;
pub mod event;
pub mod funds;
pub mod ids;
pub mod instrument;
pub mod mapping;
pub mod order;

pub use audit::AuditLog;
pub use bracket::{BracketLeg, BracketLegs};
pub use config_kv::ConfigKv;
pub use enums::{
    Account, EventSource, LegType, MappingStatus, OrderStatus, OrderType, Product, Side,
    SizingStrategy, Validity,
};
pub use event::{OrderEvent, OrderFields, ReplicationEvent};
pub use funds::FundsSnapshot;
pub use ids::{BrokerOrderId, CorrelationId, SecurityId};
pub use instrument::Instrument;
pub use mapping::CopyMapping;
pub use order::Order;
