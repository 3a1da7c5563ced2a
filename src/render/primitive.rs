//! Text, badge and icon+text renderers

use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

use super::markdown::{render_markdown, render_plain};
use super::{palette, ComponentView, RenderContext, RenderHandle, Renderer};
use crate::protocol::kinds::ComponentBody;

pub struct TextRenderer;

impl Renderer for TextRenderer {
    fn name(&self) -> &'static str {
        "text"
    }

    fn render(&self, view: &ComponentView<'_>, ctx: &RenderContext) -> RenderHandle {
        let ComponentBody::Text(text) = view.body else {
            return RenderHandle::new(view, self.name());
        };

        let body = if text.role.as_deref() == Some("user") {
            let mut lines = vec![Line::from(Span::styled(
                "You",
                Style::default()
                    .fg(palette::USER)
                    .add_modifier(Modifier::BOLD),
            ))];
            lines.extend(render_plain(
                &text.content,
                ctx.wrap_width,
                Style::default().fg(palette::USER),
            ));
            lines
        } else if text.markdown {
            render_markdown(&text.content, ctx.wrap_width)
        } else {
            render_plain(&text.content, ctx.wrap_width, Style::default())
        };

        RenderHandle::new(view, self.name()).with_body(body)
    }
}

pub struct BadgeRenderer;

impl Renderer for BadgeRenderer {
    fn name(&self) -> &'static str {
        "badge"
    }

    fn render(&self, view: &ComponentView<'_>, _ctx: &RenderContext) -> RenderHandle {
        let ComponentBody::Badge(badge) = view.body else {
            return RenderHandle::new(view, self.name());
        };
        let label = match &badge.icon {
            Some(icon) => format!(" {} {} ", icon, badge.text),
            None => format!(" {} ", badge.text),
        };
        let style = Style::default()
            .fg(palette::variant_color(&badge.variant))
            .add_modifier(Modifier::REVERSED);
        RenderHandle::new(view, self.name()).with_body(vec![Line::from(Span::styled(label, style))])
    }
}

pub struct IconTextRenderer;

impl Renderer for IconTextRenderer {
    fn name(&self) -> &'static str {
        "icon_text"
    }

    fn render(&self, view: &ComponentView<'_>, _ctx: &RenderContext) -> RenderHandle {
        let ComponentBody::IconText(icon_text) = view.body else {
            return RenderHandle::new(view, self.name());
        };
        let line = Line::from(vec![
            Span::raw(format!("{} ", icon_text.icon)),
            Span::styled(
                icon_text.text.clone(),
                Style::default().fg(palette::variant_color(&icon_text.variant)),
            ),
        ]);
        RenderHandle::new(view, self.name()).with_body(vec![line])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RichComponent;
    use serde_json::json;

    fn render(renderer: &dyn Renderer, tag: &str, data: serde_json::Value) -> RenderHandle {
        let component = RichComponent::new("p1", tag, data.as_object().cloned().unwrap());
        let body = ComponentBody::decode(tag, &component.data).unwrap();
        renderer.render(
            &ComponentView {
                component: &component,
                body: &body,
            },
            &RenderContext::default(),
        )
    }

    #[test]
    fn test_plain_text_keeps_markdown_syntax() {
        let handle = render(&TextRenderer, "text", json!({"content": "**raw**"}));
        assert_eq!(handle.plain_text(), "**raw**");
    }

    #[test]
    fn test_markdown_text_is_formatted() {
        let handle = render(
            &TextRenderer,
            "text",
            json!({"content": "**bold**", "markdown": true}),
        );
        assert_eq!(handle.plain_text(), "bold");
    }

    #[test]
    fn test_user_echo_has_header() {
        let handle = render(&TextRenderer, "text", json!({"content": "hi", "role": "user"}));
        assert_eq!(handle.plain_text(), "You\nhi");
    }

    #[test]
    fn test_badge_and_icon_text() {
        let badge = render(&BadgeRenderer, "badge", json!({"text": "beta", "icon": "★"}));
        assert_eq!(badge.plain_text(), " ★ beta ");

        let icon = render(&IconTextRenderer, "icon_text", json!({"icon": "📊", "text": "Report"}));
        assert_eq!(icon.plain_text(), "📊 Report");
    }
}
