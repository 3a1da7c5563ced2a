//! Artifact opened-signal and external opening
//!
//! Every artifact creation and every user re-open fires an `ArtifactOpened`
//! event through the injected listeners. A listener that calls
//! `prevent_default()` takes over presentation; the manager then shows a
//! placeholder instead of the live preview and skips the external open.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::render::ArtifactSurface;

/// Event handed to listeners; mutable so they can suppress the default
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactOpened {
    pub artifact_id: String,
    pub content: String,
    pub artifact_type: String,
    pub title: Option<String>,
    pub user_initiated: bool,
    prevented: bool,
}

impl ArtifactOpened {
    pub fn from_surface(surface: &ArtifactSurface, user_initiated: bool) -> Self {
        Self {
            artifact_id: surface.artifact_id.clone(),
            content: surface.content.clone(),
            artifact_type: surface.artifact_type.clone(),
            title: surface.title.clone(),
            user_initiated,
            prevented: false,
        }
    }

    pub fn prevent_default(&mut self) {
        self.prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.prevented
    }
}

pub trait ArtifactListener: Send {
    fn on_opened(&mut self, event: &mut ArtifactOpened);
}

/// Presents an artifact outside the chat surface
pub trait ArtifactOpener: Send {
    fn open(&mut self, surface: &ArtifactSurface) -> io::Result<()>;
}

/// Opener that does nothing; used headless and in tests
#[derive(Debug, Default)]
pub struct NoopOpener;

impl ArtifactOpener for NoopOpener {
    fn open(&mut self, surface: &ArtifactSurface) -> io::Result<()> {
        tracing::debug!("Artifact {} open skipped (no opener)", surface.artifact_id);
        Ok(())
    }
}

/// Writes a standalone HTML document and hands it to the system browser
#[derive(Debug, Clone)]
pub struct BrowserOpener {
    output_dir: PathBuf,
    cdn_base: String,
    launch: bool,
}

impl BrowserOpener {
    pub fn new(output_dir: impl Into<PathBuf>, cdn_base: impl Into<String>, launch: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            cdn_base: cdn_base.into(),
            launch,
        }
    }

    /// Path the document for `artifact_id` is written to
    pub fn document_path(&self, artifact_id: &str) -> PathBuf {
        let safe: String = artifact_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.output_dir.join(format!("{}.html", safe))
    }
}

impl ArtifactOpener for BrowserOpener {
    fn open(&mut self, surface: &ArtifactSurface) -> io::Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.document_path(&surface.artifact_id);
        fs::write(&path, materialize(surface, &self.cdn_base))?;
        tracing::info!("Artifact {} written to {}", surface.artifact_id, path.display());

        if self.launch {
            launch_viewer(&path)?;
        }
        Ok(())
    }
}

fn launch_viewer(path: &Path) -> io::Result<()> {
    let mut command = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        Command::new("xdg-open")
    };
    command
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Document materialization
// ─────────────────────────────────────────────────────────────────────────────

/// Build a standalone HTML document with script tags for every dependency
pub fn materialize(surface: &ArtifactSurface, cdn_base: &str) -> String {
    let scripts: String = dependency_urls(surface, cdn_base)
        .iter()
        .map(|url| format!("<script src=\"{}\"></script>\n", url))
        .collect();
    let kind = surface.artifact_type.to_ascii_lowercase();

    if kind == "html" && surface.content.to_ascii_lowercase().contains("<html") {
        return match surface.content.find("<head>") {
            Some(at) => {
                let split = at + "<head>".len();
                format!(
                    "{}\n{}{}",
                    &surface.content[..split],
                    scripts,
                    &surface.content[split..]
                )
            }
            None => format!("{}{}", scripts, surface.content),
        };
    }

    let body = match kind.as_str() {
        "javascript" | "js" | "d3" | "threejs" if !surface.content.contains("<script") => {
            format!("<div id=\"root\"></div>\n<script>\n{}\n</script>", surface.content)
        }
        _ => surface.content.clone(),
    };
    let title = html_escape(surface.title.as_deref().unwrap_or("Artifact"));
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n{}</head>\n<body>\n{}\n</body>\n</html>\n",
        title, scripts, body
    )
}

/// Declared dependencies plus those implied by the artifact type, deduplicated
pub fn dependency_urls(surface: &ArtifactSurface, cdn_base: &str) -> Vec<String> {
    let implied = match surface.artifact_type.to_ascii_lowercase().as_str() {
        "d3" => Some("d3"),
        "threejs" => Some("three"),
        _ => None,
    };
    let mut urls: Vec<String> = Vec::new();
    for name in surface
        .dependencies
        .iter()
        .map(String::as_str)
        .chain(implied)
    {
        let url = resolve_dependency(name, cdn_base);
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

fn resolve_dependency(name: &str, cdn_base: &str) -> String {
    let name = name.trim();
    if name.starts_with("http://") || name.starts_with("https://") {
        return name.to_string();
    }
    match name.to_ascii_lowercase().as_str() {
        "d3" => "https://d3js.org/d3.v7.min.js".to_string(),
        "three" | "threejs" => format!("{}/three@0.160.0/build/three.min.js", cdn_base),
        "chart.js" | "chartjs" => format!("{}/chart.js", cdn_base),
        "plotly" | "plotly.js" => "https://cdn.plot.ly/plotly-2.27.0.min.js".to_string(),
        _ => format!("{}/{}", cdn_base.trim_end_matches('/'), name),
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
