//! A concrete WebSocket account-stream reader, for brokers whose push
//! transport is a plain JSON-over-WebSocket feed. Not wired into
//! [`crate::rest::RestBrokerClient`] by default because exact framing is
//! broker-specific — construct one of these directly when the target
//! broker's feed matches this shape.

use crate::error::BrokerError;
use crate::stream::{AccountStream, StreamMessage};
use copytrade_model::ReplicationEvent;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Opens a WebSocket connection and maps each text frame to a
/// [`StreamMessage`]. Frames that don't parse as a [`ReplicationEvent`]
/// are forwarded as `StreamMessage::Unknown` rather than dropped, so an
/// unrecognised message kind gets counted instead of faulting the
/// stream.
pub async fn connect_json_stream(url: Url) -> Result<AccountStream, BrokerError> {
    let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| BrokerError::Transport(e.to_string()))?;

    let (mut write, read) = ws.split();

    // Most broker feeds require a subscribe/login frame before they start
    // pushing updates; send an empty ping so the connection is proven live.
    let _ = write.send(Message::Ping(Vec::new().into())).await;

    let mapped = read.filter_map(|msg| async move {
        match msg {
            Ok(Message::Text(text)) => Some(Ok(parse_frame(&text))),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => Some(Ok(StreamMessage::Heartbeat)),
            Ok(Message::Close(_)) => None,
            Ok(_) => None,
            Err(e) => Some(Err(BrokerError::Transport(e.to_string()))),
        }
    });

    Ok(Box::pin(mapped))
}

fn parse_frame(text: &str) -> StreamMessage {
    match serde_json::from_str::<ReplicationEvent>(text) {
        Ok(event) => StreamMessage::Order(event),
        Err(_) => match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => StreamMessage::Unknown(value),
            Err(_) => StreamMessage::Unknown(serde_json::Value::String(text.to_string())),
        },
    }
}
