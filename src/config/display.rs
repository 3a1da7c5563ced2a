//! Display and artifact configuration

use serde::Deserialize;
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Display
// ─────────────────────────────────────────────────────────────────────────────

/// Rendering limits shared by the renderers and the TUI
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    /// Default row cap for dataframes that do not carry their own
    pub max_rows_displayed: usize,
    /// Show the logs pane on startup
    pub show_logs: bool,
    /// Lines of artifact source shown in the in-chat preview
    pub preview_lines: usize,
    /// Column at which prose wraps
    pub wrap_width: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_rows_displayed: 100,
            show_logs: false,
            preview_lines: 12,
            wrap_width: 96,
        }
    }
}

/// Display settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileDisplay {
    pub max_rows_displayed: Option<usize>,
    pub show_logs: Option<bool>,
    pub preview_lines: Option<usize>,
    pub wrap_width: Option<usize>,
}

impl DisplayConfig {
    pub fn from_file(file: Option<FileDisplay>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            max_rows_displayed: file
                .max_rows_displayed
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_rows_displayed),
            show_logs: file.show_logs.unwrap_or(defaults.show_logs),
            preview_lines: file.preview_lines.unwrap_or(defaults.preview_lines),
            wrap_width: file
                .wrap_width
                .filter(|n| *n >= 20)
                .unwrap_or(defaults.wrap_width),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Artifacts
// ─────────────────────────────────────────────────────────────────────────────

/// How artifacts are opened outside the chat surface
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactConfig {
    /// Launch the system browser on open (documents are written regardless)
    pub open_externally: bool,
    /// Where standalone documents are written
    pub output_dir: PathBuf,
    /// CDN prefix for bare dependency names
    pub cdn_base: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            open_externally: true,
            output_dir: std::env::temp_dir().join("chatwire-artifacts"),
            cdn_base: "https://cdn.jsdelivr.net/npm".to_string(),
        }
    }
}

/// Artifact settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileArtifacts {
    pub open_externally: Option<bool>,
    pub output_dir: Option<String>,
    pub cdn_base: Option<String>,
}

impl ArtifactConfig {
    pub fn from_file(file: Option<FileArtifacts>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            open_externally: file.open_externally.unwrap_or(defaults.open_externally),
            output_dir: file
                .output_dir
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            cdn_base: file
                .cdn_base
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.cdn_base),
        }
    }
}
