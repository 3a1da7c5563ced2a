//! Server-sent events transport
//!
//! POSTs the request as JSON and reads `data:` frames, each one a JSON
//! `ChatStreamChunk`. `data: [DONE]` ends the turn.

use std::fmt::Display;

use async_trait::async_trait;
use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::stream::{self, Stream};
use futures::StreamExt;
use reqwest::header::ACCEPT;

use super::{ChunkStream, StreamTransport, TransportError};
use crate::protocol::{ChatRequest, ChatStreamChunk, DONE_SENTINEL};

pub struct SseTransport {
    client: reqwest::Client,
    url: String,
}

impl SseTransport {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl StreamTransport for SseTransport {
    fn name(&self) -> &'static str {
        "sse"
    }

    async fn connect(&self, request: &ChatRequest) -> Result<ChunkStream, TransportError> {
        tracing::debug!("POST {} (request {})", self.url, request.request_id);
        let response = self
            .client
            .post(&self.url)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Connect {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        Ok(chunk_stream(response.bytes_stream().eventsource()))
    }
}

/// Map SSE events to chunks, ending at the sentinel
///
/// The first read or parse failure is yielded as an error and ends the
/// stream; so does a connection that closes before `[DONE]`.
pub(crate) fn chunk_stream<S, E>(events: S) -> ChunkStream
where
    S: Stream<Item = Result<Event, EventStreamError<E>>> + Send + 'static,
    E: Display + Send + 'static,
{
    stream::unfold(Some(Box::pin(events)), |state| async move {
        let mut events = state?;
        loop {
            match events.next().await {
                Some(Ok(event)) => {
                    let data = event.data.trim();
                    if data.is_empty() {
                        continue;
                    }
                    if data == DONE_SENTINEL {
                        tracing::debug!("SSE stream complete");
                        return None;
                    }
                    return match serde_json::from_str::<ChatStreamChunk>(data) {
                        Ok(chunk) => Some((Ok(chunk), Some(events))),
                        Err(e) => Some((Err(TransportError::Decode(e.to_string())), None)),
                    };
                }
                Some(Err(e)) => return Some((Err(TransportError::Stream(e.to_string())), None)),
                None => return Some((Err(TransportError::Truncated), None)),
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SSE_PATH: &str = "/api/vanna/v2/chat_sse";

    fn sse_response(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/event-stream")
            .set_body_string(body.to_string())
    }

    async fn transport_for(server: &MockServer) -> SseTransport {
        SseTransport::new(reqwest::Client::new(), format!("{}{}", server.uri(), SSE_PATH))
    }

    #[tokio::test]
    async fn test_streams_chunks_until_done() {
        let server = MockServer::start().await;
        let body = format!(
            "data: {}\n\ndata: {}\n\ndata: [DONE]\n\n",
            json!({"rich": {"id": "t1", "type": "text", "lifecycle": "create", "data": {"content": "hi"}}, "timestamp": 1700000000.5}),
            json!({"text": "plain"}),
        );
        Mock::given(method("POST"))
            .and(path(SSE_PATH))
            .and(header("accept", "text/event-stream"))
            .and(body_partial_json(json!({"message": "hello", "conversation_id": "c1"})))
            .respond_with(sse_response(&body))
            .mount(&server)
            .await;

        let transport = transport_for(&server).await;
        let items: Vec<_> = transport
            .connect(&ChatRequest::new("hello", "c1"))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(items.len(), 2);
        let first = items[0].as_ref().unwrap();
        assert_eq!(first.rich.as_ref().unwrap()["id"], "t1");
        assert_eq!(first.timestamp, Some(json!(1700000000.5)));
        assert_eq!(items[1].as_ref().unwrap().text.as_deref(), Some("plain"));
    }

    #[tokio::test]
    async fn test_missing_sentinel_is_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SSE_PATH))
            .respond_with(sse_response("data: {\"text\": \"partial\"}\n\n"))
            .mount(&server)
            .await;

        let items: Vec<_> = transport_for(&server)
            .await
            .connect(&ChatRequest::new("hello", "c1"))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(TransportError::Truncated)));
    }

    #[tokio::test]
    async fn test_malformed_frame_ends_with_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SSE_PATH))
            .respond_with(sse_response("data: {not json\n\ndata: [DONE]\n\n"))
            .mount(&server)
            .await;

        let items: Vec<_> = transport_for(&server)
            .await
            .connect(&ChatRequest::new("hello", "c1"))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(TransportError::Decode(_))));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SSE_PATH))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = transport_for(&server)
            .await
            .connect(&ChatRequest::new("hello", "c1"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::Status(502)));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let transport = SseTransport::new(reqwest::Client::new(), "http://127.0.0.1:1/chat_sse");
        let err = transport
            .connect(&ChatRequest::new("hello", "c1"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[tokio::test]
    async fn test_in_band_error_frame_is_a_chunk() {
        let server = MockServer::start().await;
        let body = format!(
            "data: {}\n\n",
            json!({"type": "error", "data": {"message": "boom"}, "conversation_id": "c1", "request_id": "r1"})
        );
        Mock::given(method("POST"))
            .and(path(SSE_PATH))
            .respond_with(sse_response(&body))
            .mount(&server)
            .await;

        let items: Vec<_> = transport_for(&server)
            .await
            .connect(&ChatRequest::new("hello", "c1"))
            .await
            .unwrap()
            .collect()
            .await;
        let chunk = items[0].as_ref().unwrap();
        assert_eq!(chunk.kind.as_deref(), Some("error"));
        assert_eq!(chunk.data.as_ref().unwrap()["message"], "boom");
    }
}
