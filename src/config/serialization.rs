//! Config serialization to TOML
//!
//! Single source of truth for config file format.

use super::Config;

/// Quote a string as a TOML basic string
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl Config {
    /// Render the config as a commented TOML document
    pub fn to_toml(&self) -> String {
        let conversation = match &self.conversation_id {
            Some(id) => format!("conversation_id = {}\n", quoted(id)),
            None => "# conversation_id = \"my-conversation\"  # Continue an existing thread\n"
                .to_string(),
        };

        format!(
            r#"# chatwire configuration
# Precedence: environment variables > this file > built-in defaults
#
# Environment overrides:
#   CHATWIRE_URL           base_url
#   CHATWIRE_TRANSPORT     transport.primary (sse | websocket)
#   CHATWIRE_CONVERSATION  conversation_id
#   CHATWIRE_LOG_DIR       logging.file_dir (also enables file logging)
#   CHATWIRE_NO_TUI=1      headless output
#   CHATWIRE_DEMO=1        in-process scripted backend

# Backend base URL; endpoint paths below are appended to it
base_url = {base_url}
{conversation}
[transport]
# Primary stream: "sse" or "websocket". On failure the client falls back to
# polling exactly once and replays the request.
primary = {primary}
sse_path = {sse_path}
websocket_path = {websocket_path}
poll_path = {poll_path}
connect_timeout_secs = {connect_timeout}
fallback_enabled = {fallback}

[display]
max_rows_displayed = {max_rows}   # Default row cap for dataframes
show_logs = {show_logs}           # Show the logs pane on startup
preview_lines = {preview_lines}   # Artifact source lines shown inline
wrap_width = {wrap_width}

[artifacts]
open_externally = {open_externally}   # Launch the browser when an artifact is opened
output_dir = {output_dir}
cdn_base = {cdn_base}

[logging]
level = {level}                 # trace, debug, info, warn, error (RUST_LOG overrides)
file_enabled = {file_enabled}
file_dir = {file_dir}
file_rotation = {rotation}      # hourly, daily, never
file_prefix = {prefix}
"#,
            base_url = quoted(&self.base_url),
            conversation = conversation,
            primary = quoted(self.transport.primary.as_str()),
            sse_path = quoted(&self.transport.sse_path),
            websocket_path = quoted(&self.transport.websocket_path),
            poll_path = quoted(&self.transport.poll_path),
            connect_timeout = self.transport.connect_timeout_secs,
            fallback = self.transport.fallback_enabled,
            max_rows = self.display.max_rows_displayed,
            show_logs = self.display.show_logs,
            preview_lines = self.display.preview_lines,
            wrap_width = self.display.wrap_width,
            open_externally = self.artifacts.open_externally,
            output_dir = quoted(&self.artifacts.output_dir.display().to_string()),
            cdn_base = quoted(&self.artifacts.cdn_base),
            level = quoted(&self.logging.level),
            file_enabled = self.logging.file_enabled,
            file_dir = quoted(&self.logging.file_dir.display().to_string()),
            rotation = quoted(self.logging.file_rotation.as_str()),
            prefix = quoted(&self.logging.file_prefix),
        )
    }
}
