//! Polling transport: one POST, the whole turn in one response

use async_trait::async_trait;

use super::{PollingTransport, TransportError};
use crate::protocol::{ChatRequest, ChatResponse};

pub struct PollTransport {
    client: reqwest::Client,
    url: String,
}

impl PollTransport {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl PollingTransport for PollTransport {
    fn name(&self) -> &'static str {
        "poll"
    }

    async fn poll(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
        tracing::debug!("POST {} (request {})", self.url, request.request_id);
        let response = self
            .client
            .post(&self.url)
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

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Stream(e.to_string()))?;
        let parsed: ChatResponse =
            serde_json::from_slice(&body).map_err(|e| TransportError::Decode(e.to_string()))?;
        if parsed.total_chunks != 0 && parsed.total_chunks != parsed.chunks.len() {
            tracing::debug!(
                "Poll response declares {} chunks but carries {}",
                parsed.total_chunks,
                parsed.chunks.len()
            );
        }
        Ok(parsed)
    }
}
