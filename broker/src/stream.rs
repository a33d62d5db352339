use crate::error::BrokerError;
use copytrade_model::ReplicationEvent;
use futures::stream::BoxStream;

/// A single message off the leader's push stream. `Unknown` covers
/// message kinds the broker may emit that this system doesn't model
/// yet — routed to a debug log and counted, never treated as a fault.
#[derive(Debug, Clone)]
pub enum StreamMessage {
    Order(ReplicationEvent),
    Heartbeat,
    Unknown(serde_json::Value),
}

/// The push connection's item type: either a parsed message, or a
/// transport-level error observed mid-stream (malformed frame, etc.)
/// that doesn't necessarily end the stream.
pub type AccountStreamItem = Result<StreamMessage, BrokerError>;

/// A boxed stream of account push messages. Termination of the stream
/// (not just an `Err` item) is what the Stream Consumer treats as a
/// disconnect.
pub type AccountStream = BoxStream<'static, AccountStreamItem>;
