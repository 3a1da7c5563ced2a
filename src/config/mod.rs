//! Configuration for the chat client
//!
//! Configuration is loaded in order of precedence:
//! 1. Environment variables (highest priority)
//! 2. Config file (~/.config/chatwire/config.toml)
//! 3. Built-in defaults (lowest priority)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ─────────────────────────────────────────────────────────────────────────────
// Submodules
// ─────────────────────────────────────────────────────────────────────────────

mod display;
mod observability;
mod serialization;
mod transport;


// ─────────────────────────────────────────────────────────────────────────────
// Re-exports
// ─────────────────────────────────────────────────────────────────────────────

pub use display::{ArtifactConfig, DisplayConfig, FileArtifacts, FileDisplay};
pub use observability::{FileLogging, LogRotation, LoggingConfig};
pub use transport::{FileTransport, TransportConfig, TransportKind};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

// ─────────────────────────────────────────────────────────────────────────────
// Application Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Backend base URL; endpoint paths are appended to it
    pub base_url: String,

    /// Conversation to continue; a fresh id is generated when unset
    pub conversation_id: Option<String>,

    /// Whether to run the TUI (disabled for headless `ask`)
    pub enable_tui: bool,

    /// Demo mode: talk to the in-process scripted backend
    pub demo_mode: bool,

    /// Primary/fallback transport selection and endpoint paths
    pub transport: TransportConfig,

    /// Rendering limits
    pub display: DisplayConfig,

    /// Artifact presentation
    pub artifacts: ArtifactConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            conversation_id: None,
            enable_tui: true,
            demo_mode: false,
            transport: TransportConfig::default(),
            display: DisplayConfig::default(),
            artifacts: ArtifactConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────────

/// Config file structure (subset of Config that makes sense to persist)
#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileConfig {
    pub base_url: Option<String>,
    pub conversation_id: Option<String>,

    /// Optional [transport] section
    pub transport: Option<FileTransport>,

    /// Optional [display] section
    pub display: Option<FileDisplay>,

    /// Optional [artifacts] section
    pub artifacts: Option<FileArtifacts>,

    /// Optional [logging] section
    pub logging: Option<FileLogging>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Loading
// ─────────────────────────────────────────────────────────────────────────────

fn env_flag(value: Option<String>) -> Option<bool> {
    value.map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

impl Config {
    /// Get the config file path: ~/.config/chatwire/config.toml
    /// Uses Unix-style ~/.config on all platforms for consistency
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("chatwire").join("config.toml"))
    }

    /// Create config file with defaults if it doesn't exist
    pub fn ensure_config_exists() {
        let Some(path) = Self::config_path() else {
            return;
        };
        if path.exists() {
            return;
        }
        if let Err(e) = Self::default().write_to(&path) {
            // Config is optional; a read-only home is not fatal
            tracing::debug!("Could not create {}: {}", path.display(), e);
        }
    }

    /// Write the default template to `path`, replacing any existing file
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(path, self.to_toml()).with_context(|| format!("writing {}", path.display()))
    }

    /// Load file config if it exists
    ///
    /// A config file that exists but does not parse is an error: a broken
    /// config should fail fast rather than silently fall back to defaults.
    fn load_file_config(path: Option<&Path>) -> Result<FileConfig> {
        let Some(path) = path else {
            return Ok(FileConfig::default());
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).with_context(|| {
                format!(
                    "failed to parse {} (check quoting, true/false booleans and section names; \
                     `chatwire config --reset` restores defaults)",
                    path.display()
                )
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
            Err(e) => Err(e).with_context(|| format!("cannot read {}", path.display())),
        }
    }

    /// Load configuration: env vars -> file -> defaults
    pub fn from_env() -> Result<Self> {
        let file = Self::load_file_config(Self::config_path().as_deref())?;
        Ok(Self::from_sources(file, |key| std::env::var(key).ok()))
    }

    /// Merge a parsed file with an environment lookup
    pub(crate) fn from_sources(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        // Base URL: env > file > default
        let base_url = env("CHATWIRE_URL")
            .or(file.base_url)
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);

        // Conversation: env > file > generated later
        let conversation_id = env("CHATWIRE_CONVERSATION")
            .or(file.conversation_id)
            .filter(|id| !id.is_empty());

        // TUI toggle and demo mode: env only (runtime flags)
        let enable_tui = env_flag(env("CHATWIRE_NO_TUI"))
            .map(|no_tui| !no_tui)
            .unwrap_or(true);
        let demo_mode = env_flag(env("CHATWIRE_DEMO")).unwrap_or(false);

        let mut transport = TransportConfig::from_file(file.transport);
        if let Some(kind) = env("CHATWIRE_TRANSPORT") {
            transport.primary = TransportKind::from_str(&kind);
        }

        let display = DisplayConfig::from_file(file.display);
        let artifacts = ArtifactConfig::from_file(file.artifacts);

        let mut logging = LoggingConfig::from_file(file.logging);
        if let Some(dir) = env("CHATWIRE_LOG_DIR") {
            logging.file_dir = PathBuf::from(dir);
            logging.file_enabled = true;
        }

        Self {
            base_url,
            conversation_id,
            enable_tui,
            demo_mode,
            transport,
            display,
            artifacts,
            logging,
        }
    }

    /// Full URL of the SSE endpoint
    pub fn sse_url(&self) -> String {
        format!("{}{}", self.base_url, self.transport.sse_path)
    }

    /// Full URL of the polling endpoint
    pub fn poll_url(&self) -> String {
        format!("{}{}", self.base_url, self.transport.poll_path)
    }

    /// WebSocket URL, mapping http(s) to ws(s)
    pub fn websocket_url(&self) -> String {
        let base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };
        format!("{}{}", base, self.transport.websocket_path)
    }
}
