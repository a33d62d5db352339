//! # Stream Consumer + Recovery
//!
//! [`consumer::StreamConsumer`] owns the leader's long-lived push
//! connection, tracks heartbeats, and reconnects with backoff; every
//! reconnect triggers [`recovery::Recovery`] to replay whatever the
//! gap might have missed through the same [`copytrade_replicator::Replicator::handle`]
//! entry point the live stream uses.

pub mod backoff;
pub mod consumer;
pub mod error;
pub mod recovery;

#[cfg(test)]
pub mod test_support;

pub use backoff::Backoff;
pub use consumer::StreamConsumer;
pub use error::StreamError;
pub use recovery::Recovery;
