//! # Broker
//!
//! The abstracted broker interface: REST placement/modify/
//! cancel/list operations plus a push stream of order updates, shared
//! identically by the leader and follower accounts. [`BrokerClient`] is
//! the seam the Replicator and Recovery depend on; [`mock::MockBrokerClient`]
//! and [`rest::RestBrokerClient`] are the two adapters this workspace
//! ships behind it.

pub mod client;
pub mod convert;
pub mod error;
pub mod mock;
pub mod request;
pub mod response;
pub mod rest;
pub mod stream;
pub mod ws;

pub use client::BrokerClient;
pub use error::BrokerError;
pub use request::{CancelOrderRequest, ModifyOrderRequest, PlaceOrderRequest};
pub use response::{OrderAck, PlaceSliceResponse, Trade};
pub use stream::{AccountStream, AccountStreamItem, StreamMessage};
