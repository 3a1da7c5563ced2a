//! Artifact surface
//!
//! Artifacts are standalone HTML/SVG/JS documents. In the terminal the live
//! surface is a sandboxed source preview: the content is shown as inert text,
//! never executed. When a listener suppresses the default open, the surface
//! switches to a placeholder whose control re-fires the open as user-initiated.

use ratatui::style::Style;
use ratatui::text::{Line, Span};

use super::markdown::render_plain;
use super::{palette, title_line, ComponentView, Control, RenderContext, RenderHandle, Renderer};
use crate::protocol::kinds::ComponentBody;
use crate::protocol::DataMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceMode {
    Preview,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactSurface {
    pub artifact_id: String,
    pub artifact_type: String,
    pub title: Option<String>,
    pub content: String,
    pub dependencies: Vec<String>,
    pub mode: SurfaceMode,
    preview_lines: usize,
}

impl ArtifactSurface {
    pub fn lines(&self) -> Vec<Line<'static>> {
        let frame = Span::styled("┊ ", palette::muted());
        match self.mode {
            SurfaceMode::Preview => {
                let total = self.content.lines().count();
                let mut lines = vec![Line::from(vec![
                    frame.clone(),
                    Span::styled(
                        format!("sandboxed preview · {} · {} lines", self.artifact_type, total),
                        palette::muted(),
                    ),
                ])];
                for source in self.content.lines().take(self.preview_lines) {
                    lines.push(Line::from(vec![
                        frame.clone(),
                        Span::styled(source.to_string(), Style::default().fg(palette::CODE)),
                    ]));
                }
                if total > self.preview_lines {
                    lines.push(Line::from(vec![
                        frame,
                        Span::styled(
                            format!("… {} more lines", total - self.preview_lines),
                            palette::muted(),
                        ),
                    ]));
                }
                lines
            }
            SurfaceMode::Placeholder => vec![Line::from(vec![
                frame,
                Span::styled(
                    "Preview handled elsewhere. Activate to open the artifact.",
                    palette::muted(),
                ),
            ])],
        }
    }
}

/// Switch the surface mode and its reopen control
pub fn set_surface_mode(handle: &mut RenderHandle, mode: SurfaceMode) {
    let Some(surface) = handle.artifact.as_mut() else {
        return;
    };
    surface.mode = mode;
    let label = match mode {
        SurfaceMode::Preview => "Open externally",
        SurfaceMode::Placeholder => "Open artifact",
    };
    handle.controls = vec![Control::reopen(label)];
}

pub struct ArtifactRenderer;

impl Renderer for ArtifactRenderer {
    fn name(&self) -> &'static str {
        "artifact"
    }

    fn render(&self, view: &ComponentView<'_>, ctx: &RenderContext) -> RenderHandle {
        let ComponentBody::Artifact(artifact) = view.body else {
            return RenderHandle::new(view, self.name());
        };

        let title = artifact.title.clone().unwrap_or_else(|| "Artifact".to_string());
        let mut header = title_line(Some("◆"), &title, Style::default().fg(palette::ACCENT));
        header.spans.push(Span::styled(
            format!("  {}", artifact.artifact_type),
            palette::muted(),
        ));
        let mut body = vec![header];
        if let Some(description) = &artifact.description {
            body.extend(render_plain(description, ctx.wrap_width, palette::muted()));
        }

        let artifact_id = if artifact.artifact_id.is_empty() {
            view.component.id.clone()
        } else {
            artifact.artifact_id.clone()
        };
        let mut handle = RenderHandle::new(view, self.name()).with_body(body);
        handle.artifact = Some(ArtifactSurface {
            artifact_id,
            artifact_type: artifact.artifact_type.clone(),
            title: artifact.title.clone(),
            content: artifact.content.clone(),
            dependencies: artifact.dependencies.clone(),
            mode: SurfaceMode::Preview,
            preview_lines: ctx.preview_lines,
        });
        set_surface_mode(&mut handle, SurfaceMode::Preview);
        handle
    }

    fn update(
        &self,
        handle: &mut RenderHandle,
        view: &ComponentView<'_>,
        _changes: Option<&DataMap>,
        ctx: &RenderContext,
    ) {
        let mode = handle.artifact.as_ref().map(|s| s.mode);
        *handle = self.render(view, ctx);
        if let Some(mode) = mode {
            set_surface_mode(handle, mode);
        }
    }
}
