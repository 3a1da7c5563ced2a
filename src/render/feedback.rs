//! Status, progress, log and notification renderers

use chrono::{DateTime, NaiveDateTime};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use serde_json::Value;

use super::interactive::carry_control_state;
use super::markdown::{render_markdown, render_plain};
use super::{palette, title_line, ComponentView, Control, RenderContext, RenderHandle, Renderer};
use crate::protocol::kinds::{display_value, ComponentBody, ProgressData};
use crate::protocol::DataMap;

const BAR_WIDTH: usize = 24;

pub struct StatusCardRenderer;

impl Renderer for StatusCardRenderer {
    fn name(&self) -> &'static str {
        "status_card"
    }

    fn render(&self, view: &ComponentView<'_>, ctx: &RenderContext) -> RenderHandle {
        let ComponentBody::StatusCard(card) = view.body else {
            return RenderHandle::new(view, self.name());
        };

        let color = palette::variant_color(&card.status);
        let icon = card
            .icon
            .clone()
            .unwrap_or_else(|| palette::status_icon(&card.status).to_string());
        let mut header = title_line(Some(icon.as_str()), &card.title, Style::default().fg(color));
        if !card.status.is_empty() {
            header
                .spans
                .push(Span::styled(format!("  {}", card.status), palette::muted()));
        }
        if card.collapsible {
            let toggle = if card.collapsed { "  ▸" } else { "  ▾" };
            header.spans.push(Span::styled(toggle, palette::muted()));
        }

        let mut body = vec![header];
        if !card.collapsed {
            if let Some(description) = &card.description {
                body.extend(render_markdown(description, ctx.wrap_width));
            }
            for (key, value) in &card.metadata {
                body.push(Line::from(vec![
                    Span::styled(format!("{}: ", key), palette::muted()),
                    Span::raw(display_value(value)),
                ]));
            }
        }

        let controls = card.actions.iter().map(Control::from_action).collect();
        RenderHandle::new(view, self.name())
            .with_body(body)
            .with_controls(controls)
    }

    fn update(
        &self,
        handle: &mut RenderHandle,
        view: &ComponentView<'_>,
        _changes: Option<&DataMap>,
        ctx: &RenderContext,
    ) {
        let mut next = self.render(view, ctx);
        carry_control_state(&handle.controls, &mut next.controls);
        *handle = next;
    }
}

/// Renders both `progress_display` and `progress_bar`
pub struct ProgressRenderer {
    name: &'static str,
}

impl ProgressRenderer {
    pub fn display() -> Self {
        Self {
            name: "progress_display",
        }
    }

    pub fn bar() -> Self {
        Self {
            name: "progress_bar",
        }
    }
}

impl Renderer for ProgressRenderer {
    fn name(&self) -> &'static str {
        self.name
    }

    fn render(&self, view: &ComponentView<'_>, ctx: &RenderContext) -> RenderHandle {
        let progress = match view.body {
            ComponentBody::ProgressDisplay(p) | ComponentBody::ProgressBar(p) => p,
            _ => return RenderHandle::new(view, self.name()),
        };

        let mut body = Vec::new();
        if !progress.label.is_empty() {
            body.push(Line::from(Span::styled(
                progress.label.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )));
        }
        body.push(progress_line(progress));
        if let Some(description) = &progress.description {
            body.extend(render_plain(description, ctx.wrap_width, palette::muted()));
        }
        RenderHandle::new(view, self.name()).with_body(body)
    }
}

/// `[██████░░░░] 60%` coloured by status
pub fn progress_line(progress: &ProgressData) -> Line<'static> {
    let value = if progress.value.is_finite() {
        progress.value.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (value * BAR_WIDTH as f64).round() as usize;
    let status = progress.status.as_deref().unwrap_or(if value >= 1.0 {
        "success"
    } else {
        "info"
    });
    let color = palette::variant_color(status);

    Line::from(vec![
        Span::raw("["),
        Span::styled("█".repeat(filled), Style::default().fg(color)),
        Span::styled("░".repeat(BAR_WIDTH - filled), palette::muted()),
        Span::raw(format!("] {:>3.0}%", value * 100.0)),
    ])
}

pub struct LogViewerRenderer;

impl Renderer for LogViewerRenderer {
    fn name(&self) -> &'static str {
        "log_viewer"
    }

    fn render(&self, view: &ComponentView<'_>, _ctx: &RenderContext) -> RenderHandle {
        let ComponentBody::LogViewer(log) = view.body else {
            return RenderHandle::new(view, self.name());
        };

        let mut body = vec![title_line(
            Some("▤"),
            &log.title,
            Style::default().fg(palette::ACCENT),
        )];
        let skip = log.entries.len().saturating_sub(log.max_entries.max(1));
        if skip > 0 {
            body.push(Line::from(Span::styled(
                format!("… {} earlier entries", skip),
                palette::muted(),
            )));
        }
        for entry in log.entries.iter().skip(skip) {
            let mut spans = Vec::new();
            if log.show_timestamps {
                if let Some(ts) = entry.timestamp.as_ref().and_then(format_clock) {
                    spans.push(Span::styled(format!("{} ", ts), palette::muted()));
                }
            }
            let level = if entry.level.is_empty() {
                "info"
            } else {
                entry.level.as_str()
            };
            spans.push(Span::styled(
                format!("{:<5} ", level.to_uppercase()),
                Style::default().fg(palette::variant_color(level)),
            ));
            spans.push(Span::raw(entry.message.clone()));
            body.push(Line::from(spans));
        }
        RenderHandle::new(view, self.name()).with_body(body)
    }
}

/// `HH:MM:SS` from an RFC 3339 string, naive ISO string, or epoch seconds
fn format_clock(timestamp: &Value) -> Option<String> {
    match timestamp {
        Value::Number(n) => {
            let secs = n.as_f64()?;
            DateTime::from_timestamp(secs as i64, 0).map(|t| t.format("%H:%M:%S").to_string())
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.format("%H:%M:%S").to_string())
            .or_else(|_| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|t| t.format("%H:%M:%S").to_string())
            })
            .ok(),
        _ => None,
    }
}

pub struct NotificationRenderer;

impl Renderer for NotificationRenderer {
    fn name(&self) -> &'static str {
        "notification"
    }

    fn render(&self, view: &ComponentView<'_>, ctx: &RenderContext) -> RenderHandle {
        let ComponentBody::Notification(note) = view.body else {
            return RenderHandle::new(view, self.name());
        };

        let level = if note.level.is_empty() {
            "info"
        } else {
            note.level.as_str()
        };
        let color = palette::variant_color(level);
        let bar = Span::styled("▌ ", Style::default().fg(color));

        let mut body = Vec::new();
        if let Some(title) = &note.title {
            let mut line = title_line(
                Some(palette::status_icon(level)),
                title,
                Style::default().fg(color),
            );
            line.spans.insert(0, bar.clone());
            body.push(line);
        }
        for mut line in render_markdown(&note.message, ctx.wrap_width.saturating_sub(2)) {
            line.spans.insert(0, bar.clone());
            body.push(line);
        }

        let controls = note.actions.iter().map(Control::from_action).collect();
        RenderHandle::new(view, self.name())
            .with_body(body)
            .with_controls(controls)
    }

    fn update(
        &self,
        handle: &mut RenderHandle,
        view: &ComponentView<'_>,
        _changes: Option<&DataMap>,
        ctx: &RenderContext,
    ) {
        let mut next = self.render(view, ctx);
        carry_control_state(&handle.controls, &mut next.controls);
        *handle = next;
    }
}

pub struct StatusIndicatorRenderer;

impl Renderer for StatusIndicatorRenderer {
    fn name(&self) -> &'static str {
        "status_indicator"
    }

    fn render(&self, view: &ComponentView<'_>, _ctx: &RenderContext) -> RenderHandle {
        let ComponentBody::StatusIndicator(indicator) = view.body else {
            return RenderHandle::new(view, self.name());
        };
        let color = palette::variant_color(&indicator.status);
        let mut dot = Style::default().fg(color);
        if indicator.pulse {
            dot = dot.add_modifier(Modifier::SLOW_BLINK);
        }
        let line = Line::from(vec![
            Span::styled("● ", dot),
            Span::raw(indicator.message.clone()),
        ]);
        RenderHandle::new(view, self.name()).with_body(vec![line])
    }
}
