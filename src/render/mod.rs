//! Renderers turn component definitions into terminal render handles
//!
//! A `RenderHandle` is the drawable form of one component: styled body lines,
//! interactive controls, and optional per-type view state (table sort/search,
//! artifact surface). Renderers are stateless; the component manager owns
//! every handle and hands it back on update.

pub mod artifact;
pub mod container;
pub mod data;
pub mod dataframe;
pub mod fallback;
pub mod feedback;
pub mod interactive;
pub mod markdown;
pub mod primitive;
pub mod registry;

use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

use crate::config::DisplayConfig;
use crate::protocol::kinds::{ActionSpec, ComponentBody};
use crate::protocol::{DataMap, RichComponent};

pub use artifact::{ArtifactSurface, SurfaceMode};
pub use dataframe::TableView;
pub use registry::ComponentRegistry;

/// Layout limits shared by all renderers
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    pub max_rows_displayed: usize,
    pub wrap_width: usize,
    pub preview_lines: usize,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            max_rows_displayed: 100,
            wrap_width: 96,
            preview_lines: 12,
        }
    }
}

impl From<&DisplayConfig> for RenderContext {
    fn from(display: &DisplayConfig) -> Self {
        Self {
            max_rows_displayed: display.max_rows_displayed,
            wrap_width: display.wrap_width,
            preview_lines: display.preview_lines,
        }
    }
}

/// A definition paired with its decoded body
pub struct ComponentView<'a> {
    pub component: &'a RichComponent,
    pub body: &'a ComponentBody,
}

/// Render strategy for one component type
pub trait Renderer: Send + Sync {
    fn name(&self) -> &'static str;

    fn render(&self, view: &ComponentView<'_>, ctx: &RenderContext) -> RenderHandle;

    /// Patch `handle` in place; the default re-renders and keeps nothing
    fn update(
        &self,
        handle: &mut RenderHandle,
        view: &ComponentView<'_>,
        _changes: Option<&DataMap>,
        ctx: &RenderContext,
    ) {
        *handle = self.render(view, ctx);
    }

    fn remove(&self, _handle: &mut RenderHandle) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Controls
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    /// Send this text as a new outbound turn
    Submit(String),
    /// Fire a user-initiated artifact open
    ReopenArtifact,
}

/// An activatable control inside a handle (button, card action, reopen)
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub label: String,
    pub action: ControlAction,
    pub variant: String,
    pub icon: Option<String>,
    pub originally_disabled: bool,
    pub disabled: bool,
    pub dispatching: bool,
    pub chosen: bool,
}

impl Control {
    pub fn submit(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ControlAction::Submit(action.into()),
            variant: "secondary".to_string(),
            icon: None,
            originally_disabled: false,
            disabled: false,
            dispatching: false,
            chosen: false,
        }
    }

    pub fn reopen(label: impl Into<String>) -> Self {
        Self {
            action: ControlAction::ReopenArtifact,
            variant: "primary".to_string(),
            ..Self::submit(label, "")
        }
    }

    pub fn from_action(spec: &ActionSpec) -> Self {
        Self {
            variant: if spec.variant.is_empty() {
                "secondary".to_string()
            } else {
                spec.variant.clone()
            },
            icon: spec.icon.clone(),
            originally_disabled: spec.disabled,
            disabled: spec.disabled,
            ..Self::submit(&spec.label, &spec.action)
        }
    }

    pub fn span(&self, focused: bool) -> Span<'static> {
        let marker = if self.dispatching {
            "… "
        } else if self.chosen {
            "✓ "
        } else {
            ""
        };
        let icon = self
            .icon
            .as_deref()
            .map(|i| format!("{} ", i))
            .unwrap_or_default();
        let text = format!("[ {}{}{} ]", marker, icon, self.label);

        let mut style = Style::default().fg(palette::variant_color(&self.variant));
        if self.disabled && !self.chosen {
            style = palette::muted().add_modifier(Modifier::CROSSED_OUT);
        } else if self.disabled {
            style = style.add_modifier(Modifier::DIM);
        }
        if focused {
            style = style.add_modifier(Modifier::REVERSED | Modifier::BOLD);
        }
        Span::styled(text, style)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handles
// ─────────────────────────────────────────────────────────────────────────────

/// Drawable state of one live component
#[derive(Debug, Clone, PartialEq)]
pub struct RenderHandle {
    pub component_id: String,
    pub component_type: String,
    pub renderer: &'static str,
    pub body: Vec<Line<'static>>,
    pub table: Option<TableView>,
    pub artifact: Option<ArtifactSurface>,
    pub controls: Vec<Control>,
    pub controls_vertical: bool,
    /// Child ids, containers only
    pub children: Vec<String>,
    pub hidden: bool,
}

impl RenderHandle {
    pub fn new(view: &ComponentView<'_>, renderer: &'static str) -> Self {
        Self {
            component_id: view.component.id.clone(),
            component_type: view.component.component_type.clone(),
            renderer,
            body: Vec::new(),
            table: None,
            artifact: None,
            controls: Vec::new(),
            controls_vertical: false,
            children: Vec::new(),
            hidden: !view.component.visible,
        }
    }

    pub fn with_body(mut self, body: Vec<Line<'static>>) -> Self {
        self.body = body;
        self
    }

    pub fn with_controls(mut self, controls: Vec<Control>) -> Self {
        self.controls = controls;
        self
    }

    /// Lines to draw, with `focus` highlighting one control
    pub fn display_lines(&self, focus: Option<usize>) -> Vec<Line<'static>> {
        let mut lines = self.body.clone();
        if let Some(table) = &self.table {
            lines.extend(table.lines());
        }
        if let Some(surface) = &self.artifact {
            lines.extend(surface.lines());
        }
        if !self.controls.is_empty() {
            if self.controls_vertical {
                for (i, control) in self.controls.iter().enumerate() {
                    lines.push(Line::from(control.span(focus == Some(i))));
                }
            } else {
                let mut spans = Vec::new();
                for (i, control) in self.controls.iter().enumerate() {
                    if i > 0 {
                        spans.push(Span::raw(" "));
                    }
                    spans.push(control.span(focus == Some(i)));
                }
                lines.push(Line::from(spans));
            }
        }
        lines
    }

    /// Unstyled text, for headless output and assertions
    pub fn plain_text(&self) -> String {
        self.display_lines(None)
            .iter()
            .map(line_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn enabled_controls(&self) -> impl Iterator<Item = usize> + '_ {
        self.controls
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.disabled || c.action == ControlAction::ReopenArtifact)
            .map(|(i, _)| i)
    }
}

pub fn line_text(line: &Line<'_>) -> String {
    line.spans.iter().map(|s| s.content.as_ref()).collect()
}

/// Bold title line with an optional icon prefix
pub fn title_line(icon: Option<&str>, title: &str, style: Style) -> Line<'static> {
    let text = match icon {
        Some(icon) if !icon.is_empty() => format!("{} {}", icon, title),
        _ => title.to_string(),
    };
    Line::from(Span::styled(text, style.add_modifier(Modifier::BOLD)))
}

/// Colours and status glyphs used across renderers
pub mod palette {
    use ratatui::style::{Color, Modifier, Style};

    pub const ACCENT: Color = Color::Cyan;
    pub const INFO: Color = Color::Blue;
    pub const CODE: Color = Color::Yellow;
    pub const SUCCESS: Color = Color::Green;
    pub const WARNING: Color = Color::Yellow;
    pub const ERROR: Color = Color::Red;
    pub const MUTED: Color = Color::DarkGray;
    pub const USER: Color = Color::Magenta;

    pub fn muted() -> Style {
        Style::default().fg(MUTED)
    }

    pub fn dim() -> Style {
        Style::default().add_modifier(Modifier::DIM)
    }

    /// Colour for a variant, level or status keyword
    pub fn variant_color(variant: &str) -> Color {
        match variant.to_ascii_lowercase().as_str() {
            "primary" | "info" | "running" | "in_progress" | "working" | "loading" => ACCENT,
            "success" | "completed" | "done" | "ok" => SUCCESS,
            "warning" | "warn" | "pending" => WARNING,
            "error" | "danger" | "failed" | "critical" => ERROR,
            "secondary" | "default" | "" => Color::Gray,
            "debug" | "ghost" | "link" | "idle" | "muted" => MUTED,
            _ => Color::White,
        }
    }

    pub fn status_icon(status: &str) -> &'static str {
        match status.to_ascii_lowercase().as_str() {
            "success" | "completed" | "done" => "✓",
            "error" | "failed" => "✗",
            "warning" => "⚠",
            "running" | "in_progress" | "working" | "loading" => "◐",
            "pending" => "○",
            _ => "•",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::kinds::ComponentBody;
    use serde_json::Map;

    fn handle_with(controls: Vec<Control>) -> RenderHandle {
        let component = RichComponent::new("h1", "button_group", Map::new());
        let view = ComponentView {
            component: &component,
            body: &ComponentBody::Unknown,
        };
        RenderHandle::new(&view, "test").with_controls(controls)
    }

    #[test]
    fn controls_render_on_one_line_by_default() {
        let handle = handle_with(vec![Control::submit("Yes", "/yes"), Control::submit("No", "/no")]);
        assert_eq!(handle.plain_text(), "[ Yes ] [ No ]");
    }

    #[test]
    fn chosen_and_dispatching_markers() {
        let mut control = Control::submit("Run", "/run");
        control.chosen = true;
        control.dispatching = true;
        assert_eq!(control.span(false).content, "[ … Run ]");
        control.dispatching = false;
        assert_eq!(control.span(false).content, "[ ✓ Run ]");
    }

    #[test]
    fn enabled_controls_skip_disabled_submits() {
        let mut disabled = Control::submit("Off", "/off");
        disabled.disabled = true;
        let mut reopen = Control::reopen("Open");
        reopen.disabled = true;
        let handle = handle_with(vec![Control::submit("On", "/on"), disabled, reopen]);
        assert_eq!(handle.enabled_controls().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn hidden_follows_visibility() {
        let mut component = RichComponent::new("h2", "text", Map::new());
        component.visible = false;
        let view = ComponentView {
            component: &component,
            body: &ComponentBody::Unknown,
        };
        assert!(RenderHandle::new(&view, "test").hidden);
    }
}
