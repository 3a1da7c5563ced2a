//! Transport client: one outbound request, one ordered chunk stream
//!
//! A primary server-push transport (SSE or WebSocket) is tried first. If it
//! cannot connect, errors mid-stream, or ends without its end-of-stream
//! marker, the client replays the same request through the polling transport
//! exactly once. There is no reconnection and no third tier.

pub mod demo;
pub mod poll;
pub mod sse;
pub mod websocket;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use thiserror::Error;

use crate::config::{Config, TransportKind};
use crate::protocol::{ChatRequest, ChatResponse, ChatStreamChunk, ChunkOrigin};

pub use demo::DemoTransport;
pub use poll::PollTransport;
pub use sse::SseTransport;
pub use websocket::WebSocketTransport;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("backend answered HTTP {0}")]
    Status(u16),

    #[error("stream read failed: {0}")]
    Stream(String),

    #[error("malformed chunk: {0}")]
    Decode(String),

    #[error("stream ended before the end-of-stream marker")]
    Truncated,

    #[error("{primary}; polling fallback also failed: {fallback}")]
    Exhausted { primary: String, fallback: String },
}

/// Ordered chunks of one turn; ends after the end-of-stream marker
pub type ChunkStream = BoxStream<'static, Result<ChatStreamChunk, TransportError>>;

/// Persistent server-push transport
///
/// Implementations must end the stream cleanly only after the end-of-stream
/// marker and yield `TransportError::Truncated` if the connection closes
/// before it.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn connect(&self, request: &ChatRequest) -> Result<ChunkStream, TransportError>;
}

/// Request/response transport used as the single fallback
#[async_trait]
pub trait PollingTransport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn poll(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError>;
}

#[derive(Clone)]
pub struct TransportClient {
    primary: Arc<dyn StreamTransport>,
    fallback: Option<Arc<dyn PollingTransport>>,
}

impl TransportClient {
    pub fn new(primary: Arc<dyn StreamTransport>, fallback: Option<Arc<dyn PollingTransport>>) -> Self {
        Self { primary, fallback }
    }

    /// Build the transport chain described by `config`
    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        if config.demo_mode {
            tracing::info!("Demo mode: using in-process scripted backend");
            return Ok(Self::new(Arc::new(DemoTransport::new()), None));
        }

        let timeout = Duration::from_secs(config.transport.connect_timeout_secs);
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connect {
                url: config.base_url.clone(),
                reason: e.to_string(),
            })?;

        let primary: Arc<dyn StreamTransport> = match config.transport.primary {
            TransportKind::Sse => Arc::new(SseTransport::new(http.clone(), config.sse_url())),
            TransportKind::WebSocket => {
                Arc::new(WebSocketTransport::new(config.websocket_url(), timeout))
            }
        };
        let fallback: Option<Arc<dyn PollingTransport>> = config
            .transport
            .fallback_enabled
            .then(|| Arc::new(PollTransport::new(http, config.poll_url())) as Arc<dyn PollingTransport>);

        Ok(Self::new(primary, fallback))
    }

    pub fn describe(&self) -> String {
        match &self.fallback {
            Some(fallback) => format!("{} → {}", self.primary.name(), fallback.name()),
            None => self.primary.name().to_string(),
        }
    }

    /// Open one turn
    ///
    /// Connection failures fall back before this returns; mid-stream failures
    /// fall back inside the returned stream. Chunks already delivered by the
    /// primary are replayed by the fallback; every chunk carries its position
    /// in the turn, restarting at zero for the replay, so replayed chunks map
    /// onto the components they created the first time.
    pub async fn open(&self, request: &ChatRequest) -> Result<ChunkStream, TransportError> {
        match self.primary.connect(request).await {
            Ok(stream) => Ok(self.with_fallback(stream, request.clone())),
            Err(primary) => {
                let Some(fallback) = self.fallback.clone() else {
                    tracing::error!("{} failed: {}", self.primary.name(), primary);
                    return Err(primary);
                };
                tracing::warn!(
                    "{} failed to connect ({}), falling back to {}",
                    self.primary.name(),
                    primary,
                    fallback.name()
                );
                match fallback.poll(request).await {
                    Ok(response) => Ok(replay(response, &request.request_id)),
                    Err(e) => {
                        tracing::error!("{} fallback failed: {}", fallback.name(), e);
                        Err(TransportError::Exhausted {
                            primary: primary.to_string(),
                            fallback: e.to_string(),
                        })
                    }
                }
            }
        }
    }

    fn with_fallback(&self, stream: ChunkStream, request: ChatRequest) -> ChunkStream {
        let chain = Chain {
            phase: Phase::Primary(stream),
            primary_name: self.primary.name(),
            fallback: self.fallback.clone(),
            request,
            sequence: 0,
        };

        stream::unfold(chain, |mut chain| async move {
            loop {
                match &mut chain.phase {
                    Phase::Primary(stream) => match stream.next().await {
                        Some(Ok(chunk)) => {
                            let chunk = chain.stamp(chunk);
                            return Some((Ok(chunk), chain));
                        }
                        None => {
                            chain.phase = Phase::Finished;
                            return None;
                        }
                        Some(Err(primary)) => {
                            let Some(fallback) = chain.fallback.take() else {
                                tracing::error!("{} failed: {}", chain.primary_name, primary);
                                chain.phase = Phase::Finished;
                                return Some((Err(primary), chain));
                            };
                            tracing::warn!(
                                "{} failed mid-stream ({}), replaying via {}",
                                chain.primary_name,
                                primary,
                                fallback.name()
                            );
                            match fallback.poll(&chain.request).await {
                                Ok(response) => {
                                    chain.sequence = 0;
                                    chain.phase = Phase::Replay(response.chunks.into_iter());
                                }
                                Err(e) => {
                                    tracing::error!("{} fallback failed: {}", fallback.name(), e);
                                    chain.phase = Phase::Finished;
                                    let exhausted = TransportError::Exhausted {
                                        primary: primary.to_string(),
                                        fallback: e.to_string(),
                                    };
                                    return Some((Err(exhausted), chain));
                                }
                            }
                        }
                    },
                    Phase::Replay(chunks) => {
                        let Some(chunk) = chunks.next() else {
                            return None;
                        };
                        let chunk = chain.stamp(chunk);
                        return Some((Ok(chunk), chain));
                    }
                    Phase::Finished => return None,
                }
            }
        })
        .boxed()
    }
}

struct Chain {
    phase: Phase,
    primary_name: &'static str,
    fallback: Option<Arc<dyn PollingTransport>>,
    request: ChatRequest,
    sequence: usize,
}

impl Chain {
    fn stamp(&mut self, chunk: ChatStreamChunk) -> ChatStreamChunk {
        let chunk = stamp(chunk, &self.request.request_id, self.sequence);
        self.sequence += 1;
        chunk
    }
}

enum Phase {
    Primary(ChunkStream),
    Replay(std::vec::IntoIter<ChatStreamChunk>),
    Finished,
}

/// A polling response as a chunk stream; the end of `chunks` ends the turn
fn replay(response: ChatResponse, request_id: &str) -> ChunkStream {
    tracing::debug!(
        "Replaying {} polled chunks for {}",
        response.chunks.len(),
        response.request_id
    );
    let request_id = request_id.to_string();
    let chunks = response
        .chunks
        .into_iter()
        .enumerate()
        .map(move |(sequence, chunk)| Ok(stamp(chunk, &request_id, sequence)));
    stream::iter(chunks).boxed()
}

fn stamp(mut chunk: ChatStreamChunk, request_id: &str, sequence: usize) -> ChatStreamChunk {
    chunk.origin = Some(ChunkOrigin {
        request_id: request_id.to_string(),
        sequence,
    });
    chunk
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn chunk(text: &str) -> ChatStreamChunk {
        ChatStreamChunk {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn texts(items: &[Result<ChatStreamChunk, TransportError>]) -> Vec<String> {
        items
            .iter()
            .map(|item| match item {
                Ok(c) => c.text.clone().unwrap_or_default(),
                Err(e) => format!("ERR {}", e),
            })
            .collect()
    }

    /// Scripted primary: either refuses to connect or yields the given items
    struct FakeStream {
        refuse: bool,
        items: Vec<Result<&'static str, &'static str>>,
    }

    #[async_trait]
    impl StreamTransport for FakeStream {
        fn name(&self) -> &'static str {
            "fake-stream"
        }

        async fn connect(&self, _request: &ChatRequest) -> Result<ChunkStream, TransportError> {
            if self.refuse {
                return Err(TransportError::Connect {
                    url: "fake://".into(),
                    reason: "refused".into(),
                });
            }
            let items: Vec<_> = self
                .items
                .iter()
                .map(|item| match item {
                    Ok(text) => Ok(chunk(text)),
                    Err(e) => Err(TransportError::Stream(e.to_string())),
                })
                .collect();
            Ok(stream::iter(items).boxed())
        }
    }

    struct FakePoll {
        calls: Arc<AtomicUsize>,
        result: Result<Vec<&'static str>, u16>,
    }

    #[async_trait]
    impl PollingTransport for FakePoll {
        fn name(&self) -> &'static str {
            "fake-poll"
        }

        async fn poll(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(texts) => Ok(ChatResponse {
                    chunks: texts.iter().map(|t| chunk(t)).collect(),
                    conversation_id: request.conversation_id.clone(),
                    request_id: request.request_id.clone(),
                    total_chunks: texts.len(),
                }),
                Err(status) => Err(TransportError::Status(*status)),
            }
        }
    }

    fn client(
        primary: FakeStream,
        poll: Option<Result<Vec<&'static str>, u16>>,
    ) -> (TransportClient, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fallback = poll.map(|result| {
            Arc::new(FakePoll {
                calls: calls.clone(),
                result,
            }) as Arc<dyn PollingTransport>
        });
        (TransportClient::new(Arc::new(primary), fallback), calls)
    }

    fn request() -> ChatRequest {
        ChatRequest::new("hi", "conv-1")
    }

    #[tokio::test]
    async fn test_primary_success_never_polls() {
        let (client, calls) = client(
            FakeStream {
                refuse: false,
                items: vec![Ok("a"), Ok("b")],
            },
            Some(Ok(vec!["x"])),
        );
        let items: Vec<_> = client.open(&request()).await.unwrap().collect().await;
        assert_eq!(texts(&items), vec!["a", "b"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_falls_back_once() {
        let (client, calls) = client(
            FakeStream {
                refuse: true,
                items: vec![],
            },
            Some(Ok(vec!["p1", "p2"])),
        );
        let items: Vec<_> = client.open(&request()).await.unwrap().collect().await;
        assert_eq!(texts(&items), vec!["p1", "p2"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_replays_via_poll() {
        let (client, calls) = client(
            FakeStream {
                refuse: false,
                items: vec![Ok("a"), Err("reset"), Ok("never")],
            },
            Some(Ok(vec!["a", "b"])),
        );
        let items: Vec<_> = client.open(&request()).await.unwrap().collect().await;
        assert_eq!(texts(&items), vec!["a", "a", "b"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // the replay restarts numbering so it lines up with what was shown
        let sequences: Vec<usize> = items
            .iter()
            .filter_map(|item| item.as_ref().ok()?.origin.as_ref().map(|o| o.sequence))
            .collect();
        assert_eq!(sequences, vec![0, 0, 1]);
    }

    #[tokio::test]
    async fn test_both_failing_propagates_error() {
        let (client, calls) = client(
            FakeStream {
                refuse: true,
                items: vec![],
            },
            Some(Err(503)),
        );
        let err = client.open(&request()).await.err().unwrap();
        assert!(matches!(err, TransportError::Exhausted { .. }));
        assert!(err.to_string().contains("HTTP 503"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mid_stream_exhaustion_ends_with_single_error() {
        let (client, calls) = client(
            FakeStream {
                refuse: false,
                items: vec![Ok("a"), Err("reset"), Err("again")],
            },
            Some(Err(500)),
        );
        let items: Vec<_> = client.open(&request()).await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(TransportError::Exhausted { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_fallback_surfaces_primary_error() {
        let (client, _) = client(
            FakeStream {
                refuse: false,
                items: vec![Ok("a"), Err("reset")],
            },
            None,
        );
        let items: Vec<_> = client.open(&request()).await.unwrap().collect().await;
        assert_eq!(texts(&items), vec!["a", "ERR stream read failed: reset"]);
    }

    #[test]
    fn test_from_config_demo_has_no_fallback() {
        let config = Config {
            demo_mode: true,
            ..Config::default()
        };
        let client = TransportClient::from_config(&config).unwrap();
        assert_eq!(client.describe(), "demo");
    }

    #[tokio::test]
    async fn test_http_chain_falls_back_from_sse_to_poll() {
        use serde_json::json;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/vanna/v2/chat_sse"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/vanna/v2/chat_poll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "chunks": [{"text": "from poll"}],
                "conversation_id": "conv-1",
                "request_id": "r1",
                "total_chunks": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = Config {
            base_url: server.uri(),
            ..Config::default()
        };
        let client = TransportClient::from_config(&config).unwrap();
        let items: Vec<_> = client.open(&request()).await.unwrap().collect().await;
        assert_eq!(texts(&items), vec!["from poll"]);
    }

    #[test]
    fn test_from_config_default_chain() {
        let client = TransportClient::from_config(&Config::default()).unwrap();
        assert_eq!(client.describe(), "sse → poll");
    }
}
