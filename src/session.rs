//! Chat session: one conversation, at most one streaming turn
//!
//! `submit` is synchronous: it echoes the user's message, marks the status
//! bar busy and parks the transport open as a future. The caller then pulls
//! `next_event` (from the TUI select loop, or `drain_turn` headless) and feeds
//! each event back through `handle_event`. Nothing is retried here; the only
//! retry is the transport client's single fallback.

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use serde_json::{json, Value};
use thiserror::Error;

use crate::manager::{ActionTicket, Activation, ComponentManager};
use crate::protocol::decoder::ChunkDecoder;
use crate::protocol::{generate_id, ChatRequest, ChatStreamChunk, DataMap, RichComponent};
use crate::transport::{ChunkStream, TransportClient, TransportError};
use crate::ui_state::BarStatus;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a response is still streaming")]
    TurnInFlight,

    #[error("message is empty")]
    EmptyMessage,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Progress of the active turn, in arrival order
#[derive(Debug)]
pub enum TurnEvent {
    /// The transport accepted the request
    Opened,
    Chunk(ChatStreamChunk),
    /// Transport failure after the fallback (if any) was spent
    Failed(TransportError),
    Finished,
}

enum Phase {
    Opening(BoxFuture<'static, Result<ChunkStream, TransportError>>),
    Streaming(ChunkStream),
}

struct ActiveTurn {
    request_id: String,
    phase: Phase,
    /// Control activation riding on this turn, settled once the request lands
    ticket: Option<ActionTicket>,
}

pub struct ChatSession {
    transport: TransportClient,
    decoder: ChunkDecoder,
    manager: ComponentManager,
    conversation_id: String,
    turn: Option<ActiveTurn>,
}

impl ChatSession {
    pub fn new(
        transport: TransportClient,
        manager: ComponentManager,
        conversation_id: Option<String>,
    ) -> Self {
        Self {
            transport,
            decoder: ChunkDecoder::new(),
            manager,
            conversation_id: conversation_id.unwrap_or_else(generate_id),
            turn: None,
        }
    }

    pub fn manager(&self) -> &ComponentManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ComponentManager {
        &mut self.manager
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn transport(&self) -> &TransportClient {
        &self.transport
    }

    pub fn is_busy(&self) -> bool {
        self.turn.is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Outbound
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a turn for typed input; returns the request id
    pub fn submit(&mut self, message: &str) -> Result<String, SessionError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        if self.is_busy() {
            return Err(SessionError::TurnInFlight);
        }

        let request = ChatRequest::new(message, self.conversation_id.clone());
        let mut data = DataMap::new();
        data.insert("content".into(), Value::String(message.to_string()));
        data.insert("role".into(), json!("user"));
        data.insert("markdown".into(), json!(false));
        self.manager.create(RichComponent::new(
            format!("user-{}", request.request_id),
            "text",
            data,
        ));

        Ok(self.start_turn(request, None))
    }

    /// Activate a control; submit actions become a new outbound turn
    ///
    /// A click while a turn is streaming is rolled back and rejected.
    pub fn dispatch_action(&mut self, component_id: &str, index: usize) -> Result<(), SessionError> {
        match self.manager.activate_control(component_id, index) {
            None => Ok(()),
            Some(Activation::ReopenArtifact(id)) => {
                self.manager.reopen_artifact(&id);
                Ok(())
            }
            Some(Activation::Dispatch(ticket)) => {
                if self.is_busy() {
                    tracing::debug!("Action {} rejected: turn in flight", ticket.action);
                    self.manager.settle_action(&ticket, false);
                    return Err(SessionError::TurnInFlight);
                }
                tracing::info!("Dispatching action {} from {}", ticket.action, ticket.component_id);
                let request = ChatRequest::new(ticket.action.clone(), self.conversation_id.clone());
                self.start_turn(request, Some(ticket));
                Ok(())
            }
        }
    }

    fn start_turn(&mut self, request: ChatRequest, ticket: Option<ActionTicket>) -> String {
        tracing::info!(
            "Turn {} via {} (conversation {})",
            request.request_id,
            self.transport.describe(),
            self.conversation_id
        );
        self.manager
            .set_status(BarStatus::Working, "Waiting for response...", None);

        let client = self.transport.clone();
        let request_id = request.request_id.clone();
        let open = async move { client.open(&request).await }.boxed();
        self.turn = Some(ActiveTurn {
            request_id: request_id.clone(),
            phase: Phase::Opening(open),
            ticket,
        });
        request_id
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inbound
    // ─────────────────────────────────────────────────────────────────────────

    /// Next event of the active turn; `None` when idle
    ///
    /// Cancel-safe: dropping the returned future loses no chunk.
    pub async fn next_event(&mut self) -> Option<TurnEvent> {
        let turn = self.turn.as_mut()?;
        match &mut turn.phase {
            Phase::Opening(open) => match open.await {
                Ok(stream) => {
                    turn.phase = Phase::Streaming(stream);
                    Some(TurnEvent::Opened)
                }
                Err(e) => Some(TurnEvent::Failed(e)),
            },
            Phase::Streaming(stream) => Some(match stream.next().await {
                Some(Ok(chunk)) => TurnEvent::Chunk(chunk),
                Some(Err(e)) => TurnEvent::Failed(e),
                None => TurnEvent::Finished,
            }),
        }
    }

    /// Apply one turn event to the manager and status bar
    pub fn handle_event(&mut self, event: TurnEvent) {
        match event {
            TurnEvent::Opened => {
                if let Some(ticket) = self.turn.as_mut().and_then(|t| t.ticket.take()) {
                    self.manager.settle_action(&ticket, true);
                }
            }
            TurnEvent::Chunk(chunk) => {
                let decoded = self.decoder.decode(chunk);
                self.manager.apply(decoded);
            }
            TurnEvent::Failed(e) => self.fail_turn(&e),
            TurnEvent::Finished => {
                if let Some(turn) = self.turn.take() {
                    tracing::info!("Turn {} complete", turn.request_id);
                }
                if self.manager.status() == BarStatus::Working {
                    self.manager.set_status(BarStatus::Idle, "Ready", None);
                }
            }
        }
    }

    fn fail_turn(&mut self, e: &TransportError) {
        let Some(turn) = self.turn.take() else {
            return;
        };
        match turn.ticket {
            // Dispatch failures roll the controls back and leave the bar alone
            Some(ticket) => {
                tracing::warn!("Action {} not delivered: {}", ticket.action, e);
                self.manager.settle_action(&ticket, false);
                self.manager.set_status(
                    BarStatus::Warning,
                    "Action not delivered, try again",
                    Some(e.to_string()),
                );
            }
            None => {
                tracing::error!("Turn {} failed: {}", turn.request_id, e);
                self.manager.set_status(BarStatus::Error, &e.to_string(), None);
            }
        }
    }

    /// Run the active turn to completion (headless mode)
    pub async fn drain_turn(&mut self) -> Result<(), SessionError> {
        while let Some(event) = self.next_event().await {
            if let TurnEvent::Failed(e) = event {
                self.fail_turn(&e);
                return Err(e.into());
            }
            self.handle_event(event);
        }
        Ok(())
    }

    /// Drop the active turn and every component; start a new conversation
    pub fn reset(&mut self) {
        if let Some(turn) = self.turn.take() {
            tracing::info!("Abandoning turn {}", turn.request_id);
        }
        self.manager.clear();
        self.manager.set_status(BarStatus::Idle, "Ready", None);
        self.conversation_id = generate_id();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ManagerDeps;
    use crate::render::{ComponentRegistry, RenderContext};
    use crate::protocol::ChatResponse;
    use crate::transport::{DemoTransport, PollingTransport, StreamTransport};
    use futures::stream;
    use crate::ui_state;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct Refusing;

    #[async_trait]
    impl StreamTransport for Refusing {
        fn name(&self) -> &'static str {
            "refusing"
        }

        async fn connect(&self, _request: &ChatRequest) -> Result<ChunkStream, TransportError> {
            Err(TransportError::Status(503))
        }
    }

    fn session_with(primary: Arc<dyn StreamTransport>) -> (ChatSession, ui_state::SharedUiState) {
        let ui = ui_state::shared();
        let manager = ComponentManager::new(
            ComponentRegistry::with_builtin(),
            RenderContext::default(),
            ManagerDeps::new(Box::new(ui.clone())),
        );
        let session = ChatSession::new(
            TransportClient::new(primary, None),
            manager,
            Some("conv-test".into()),
        );
        (session, ui)
    }

    fn demo_session() -> (ChatSession, ui_state::SharedUiState) {
        session_with(Arc::new(DemoTransport::with_pace(Duration::ZERO)))
    }

    #[tokio::test]
    async fn test_submit_echoes_and_streams_reply() {
        let (mut session, ui) = demo_session();
        let request_id = session.submit("  hello  ").unwrap();
        assert!(session.is_busy());
        assert_eq!(ui.lock().unwrap().status_bar.status, BarStatus::Working);

        let echo = format!("user-{}", request_id);
        assert_eq!(session.manager().order()[0], echo);
        assert_eq!(session.manager().definition(&echo).unwrap().data["role"], "user");

        session.drain_turn().await.unwrap();
        assert!(!session.is_busy());
        assert_eq!(session.manager().len(), 2);
        assert!(session.manager().transcript_text().contains("You said: hello"));
        assert_eq!(ui.lock().unwrap().status_bar.status, BarStatus::Idle);
    }

    #[tokio::test]
    async fn test_empty_and_concurrent_submissions_rejected() {
        let (mut session, _) = demo_session();
        assert!(matches!(session.submit("   "), Err(SessionError::EmptyMessage)));

        session.submit("first").unwrap();
        assert!(matches!(session.submit("second"), Err(SessionError::TurnInFlight)));
        session.drain_turn().await.unwrap();
        assert!(session.submit("second").is_ok());
    }

    #[tokio::test]
    async fn test_transport_failure_sets_error_status() {
        let (mut session, ui) = session_with(Arc::new(Refusing));
        session.submit("hello").unwrap();
        let err = session.drain_turn().await.unwrap_err();
        assert!(err.to_string().contains("503"));
        assert!(!session.is_busy());

        let state = ui.lock().unwrap();
        assert_eq!(state.status_bar.status, BarStatus::Error);
        assert!(state.status_bar.message.contains("503"));
    }

    fn button_session(primary: Arc<dyn StreamTransport>) -> (ChatSession, ui_state::SharedUiState) {
        let (mut session, ui) = session_with(primary);
        session.manager_mut().create(RichComponent::new(
            "g",
            "button_group",
            json!({"buttons": [{"label": "Yes", "action": "/yes"}, {"label": "No", "action": "/no"}]})
                .as_object()
                .cloned()
                .unwrap(),
        ));
        (session, ui)
    }

    #[tokio::test]
    async fn test_button_click_becomes_turn() {
        let (mut session, _) = button_session(Arc::new(DemoTransport::with_pace(Duration::ZERO)));
        session.dispatch_action("g", 0).unwrap();
        assert!(session.is_busy());
        session.drain_turn().await.unwrap();

        let controls = &session.manager().handle("g").unwrap().controls;
        assert!(controls.iter().all(|c| c.disabled));
        assert!(controls[0].chosen && !controls[0].dispatching);
        assert!(session
            .manager()
            .transcript_text()
            .contains("Action received: /yes"));
    }

    #[tokio::test]
    async fn test_failed_click_rolls_back_without_error_status() {
        let (mut session, ui) = button_session(Arc::new(Refusing));
        session.dispatch_action("g", 1).unwrap();
        assert!(session.drain_turn().await.is_err());

        let controls = &session.manager().handle("g").unwrap().controls;
        assert!(controls.iter().all(|c| !c.disabled && !c.chosen && !c.dispatching));
        assert_ne!(ui.lock().unwrap().status_bar.status, BarStatus::Error);
    }

    #[tokio::test]
    async fn test_click_while_busy_rolls_back() {
        let (mut session, _) = button_session(Arc::new(DemoTransport::with_pace(Duration::ZERO)));
        session.submit("typing").unwrap();
        assert!(matches!(
            session.dispatch_action("g", 0),
            Err(SessionError::TurnInFlight)
        ));
        let controls = &session.manager().handle("g").unwrap().controls;
        assert!(controls.iter().all(|c| !c.disabled && !c.chosen));
    }

    fn said(text: &str) -> ChatStreamChunk {
        ChatStreamChunk {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    /// Delivers one chunk, then drops the connection
    struct DropsMidStream;

    #[async_trait]
    impl StreamTransport for DropsMidStream {
        fn name(&self) -> &'static str {
            "drops-mid-stream"
        }

        async fn connect(&self, _request: &ChatRequest) -> Result<ChunkStream, TransportError> {
            let items = vec![
                Ok(said("Looking at your data")),
                Err(TransportError::Stream("connection reset".into())),
            ];
            Ok(stream::iter(items).boxed())
        }
    }

    /// Answers with the whole turn, including what the primary already sent
    struct FullTurn;

    #[async_trait]
    impl PollingTransport for FullTurn {
        fn name(&self) -> &'static str {
            "full-turn"
        }

        async fn poll(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
            Ok(ChatResponse {
                chunks: vec![said("Looking at your data"), said("Done")],
                conversation_id: request.conversation_id.clone(),
                request_id: request.request_id.clone(),
                total_chunks: 2,
            })
        }
    }

    #[tokio::test]
    async fn test_fallback_replay_renders_each_chunk_once() {
        let ui = ui_state::shared();
        let manager = ComponentManager::new(
            ComponentRegistry::with_builtin(),
            RenderContext::default(),
            ManagerDeps::new(Box::new(ui.clone())),
        );
        let client = TransportClient::new(Arc::new(DropsMidStream), Some(Arc::new(FullTurn)));
        let mut session = ChatSession::new(client, manager, Some("conv-test".into()));

        session.submit("show me the data").unwrap();
        session.drain_turn().await.unwrap();

        // user echo plus the two replies
        assert_eq!(session.manager().len(), 3);
        let transcript = session.manager().transcript_text();
        assert_eq!(transcript.matches("Looking at your data").count(), 1);
        assert!(transcript.contains("Done"));
        assert_eq!(ui.lock().unwrap().status_bar.status, BarStatus::Idle);
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let (mut session, _) = demo_session();
        session.submit("hello").unwrap();
        session.drain_turn().await.unwrap();
        session.submit("again").unwrap();
        session.reset();

        assert!(!session.is_busy());
        assert!(session.manager().is_empty());
        assert_ne!(session.conversation_id(), "conv-test");
        assert!(session.next_event().await.is_none());
    }
}
