//! Renderer for unknown types and payloads that fail to decode

use ratatui::style::Style;
use ratatui::text::{Line, Span};
use serde_json::Value;

use super::{palette, ComponentView, RenderContext, RenderHandle, Renderer};

pub struct FallbackRenderer;

impl Renderer for FallbackRenderer {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn render(&self, view: &ComponentView<'_>, _ctx: &RenderContext) -> RenderHandle {
        let tag = if view.component.component_type.is_empty() {
            "(untyped)"
        } else {
            view.component.component_type.as_str()
        };
        let mut body = vec![Line::from(Span::styled(
            format!("Unsupported component: {}", tag),
            Style::default().fg(palette::WARNING),
        ))];
        let pretty = serde_json::to_string_pretty(&Value::Object(view.component.data.clone()))
            .unwrap_or_else(|_| "{}".to_string());
        for line in pretty.lines() {
            body.push(Line::from(Span::styled(line.to_string(), palette::muted())));
        }
        RenderHandle::new(view, self.name()).with_body(body)
    }
}
