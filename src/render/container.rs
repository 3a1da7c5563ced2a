//! Containers compose children by reference
//!
//! The handle only records child ids; the manager draws each child's own
//! handle beneath the container, indented, and skips it at top level.

use ratatui::style::Style;

use super::{palette, title_line, ComponentView, RenderContext, RenderHandle, Renderer};
use crate::protocol::kinds::ComponentBody;

pub struct ContainerRenderer;

impl Renderer for ContainerRenderer {
    fn name(&self) -> &'static str {
        "container"
    }

    fn render(&self, view: &ComponentView<'_>, _ctx: &RenderContext) -> RenderHandle {
        let mut handle = RenderHandle::new(view, self.name());
        if let ComponentBody::Container(container) = view.body {
            if let Some(title) = &container.title {
                handle.body = vec![title_line(None, title, Style::default().fg(palette::ACCENT))];
            }
        }
        handle.children = view.component.children.clone();
        handle
    }
}
