//! Transport configuration: primary stream kind, endpoint paths, fallback

use serde::Deserialize;

/// Which persistent stream to try first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportKind {
    /// Server-sent events over a POST (default)
    #[default]
    Sse,
    WebSocket,
}

impl TransportKind {
    /// Parse from config; unknown values fall back to SSE
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "websocket" | "ws" => Self::WebSocket,
            "sse" => Self::Sse,
            other => {
                tracing::warn!("Unknown transport '{}', using sse", other);
                Self::Sse
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sse => "sse",
            Self::WebSocket => "websocket",
        }
    }
}

/// Transport settings
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub primary: TransportKind,
    pub sse_path: String,
    pub websocket_path: String,
    pub poll_path: String,
    /// Connect timeout for HTTP and WebSocket handshakes
    pub connect_timeout_secs: u64,
    /// Fall back to polling once when the primary stream fails
    pub fallback_enabled: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            primary: TransportKind::Sse,
            sse_path: "/api/vanna/v2/chat_sse".to_string(),
            websocket_path: "/api/vanna/v2/chat_websocket".to_string(),
            poll_path: "/api/vanna/v2/chat_poll".to_string(),
            connect_timeout_secs: 10,
            fallback_enabled: true,
        }
    }
}

/// Transport settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileTransport {
    pub primary: Option<String>,
    pub sse_path: Option<String>,
    pub websocket_path: Option<String>,
    pub poll_path: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub fallback_enabled: Option<bool>,
}

impl TransportConfig {
    pub fn from_file(file: Option<FileTransport>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            primary: file
                .primary
                .map(|s| TransportKind::from_str(&s))
                .unwrap_or(defaults.primary),
            sse_path: file.sse_path.unwrap_or(defaults.sse_path),
            websocket_path: file.websocket_path.unwrap_or(defaults.websocket_path),
            poll_path: file.poll_path.unwrap_or(defaults.poll_path),
            connect_timeout_secs: file
                .connect_timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.connect_timeout_secs),
            fallback_enabled: file.fallback_enabled.unwrap_or(defaults.fallback_enabled),
        }
    }
}
