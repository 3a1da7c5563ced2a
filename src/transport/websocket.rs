//! WebSocket transport
//!
//! One connection per turn: the request goes out as a JSON text frame, chunks
//! come back as JSON text frames, and `{"type": "completion"}` ends the turn.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use super::{ChunkStream, StreamTransport, TransportError};
use crate::protocol::{ChatRequest, ChatStreamChunk};

const COMPLETION: &str = "completion";

pub struct WebSocketTransport {
    url: String,
    connect_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
        }
    }

    fn connect_error(&self, reason: impl ToString) -> TransportError {
        TransportError::Connect {
            url: self.url.clone(),
            reason: reason.to_string(),
        }
    }
}

/// What one inbound frame means for the turn
#[derive(Debug)]
enum Frame {
    Chunk(ChatStreamChunk),
    Complete,
    Skip,
    Closed,
}

fn classify(message: Message) -> Result<Frame, TransportError> {
    let text = match message {
        Message::Text(text) => text,
        Message::Binary(bytes) => {
            String::from_utf8(bytes).map_err(|e| TransportError::Decode(e.to_string()))?
        }
        Message::Close(_) => return Ok(Frame::Closed),
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => return Ok(Frame::Skip),
    };
    let chunk: ChatStreamChunk =
        serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))?;
    if chunk.kind.as_deref() == Some(COMPLETION) {
        return Ok(Frame::Complete);
    }
    Ok(Frame::Chunk(chunk))
}

#[async_trait]
impl StreamTransport for WebSocketTransport {
    fn name(&self) -> &'static str {
        "websocket"
    }

    async fn connect(&self, request: &ChatRequest) -> Result<ChunkStream, TransportError> {
        tracing::debug!("Connecting to {}", self.url);
        let (mut socket, _) = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(self.url.as_str()),
        )
        .await
        .map_err(|_| self.connect_error("handshake timed out"))?
        .map_err(|e| self.connect_error(e))?;

        let payload =
            serde_json::to_string(request).map_err(|e| TransportError::Decode(e.to_string()))?;
        socket
            .send(Message::Text(payload))
            .await
            .map_err(|e| self.connect_error(e))?;

        let chunks = stream::unfold(Some(socket), |state| async move {
            let mut socket = state?;
            loop {
                let Some(message) = socket.next().await else {
                    return Some((Err(TransportError::Truncated), None));
                };
                let frame = message
                    .map_err(|e| TransportError::Stream(e.to_string()))
                    .and_then(classify);
                match frame {
                    Ok(Frame::Chunk(chunk)) => return Some((Ok(chunk), Some(socket))),
                    Ok(Frame::Skip) => continue,
                    Ok(Frame::Complete) => {
                        tracing::debug!("WebSocket turn complete");
                        if let Err(e) = socket.close(None).await {
                            tracing::debug!("WebSocket close failed: {}", e);
                        }
                        return None;
                    }
                    Ok(Frame::Closed) => return Some((Err(TransportError::Truncated), None)),
                    Err(e) => return Some((Err(e), None)),
                }
            }
        });
        Ok(chunks.boxed())
    }
}
