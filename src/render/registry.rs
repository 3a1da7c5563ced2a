//! Type tag to renderer lookup
//!
//! Unknown tags and payloads that fail to decode resolve to the fallback
//! renderer, so an unfamiliar component never breaks the stream.

use std::collections::HashMap;
use std::sync::Arc;

use super::artifact::ArtifactRenderer;
use super::container::ContainerRenderer;
use super::data::{CardRenderer, ChartRenderer, CodeBlockRenderer, TaskListRenderer};
use super::dataframe::{DataFrameRenderer, TableRenderer};
use super::fallback::FallbackRenderer;
use super::feedback::{
    LogViewerRenderer, NotificationRenderer, ProgressRenderer, StatusCardRenderer,
    StatusIndicatorRenderer,
};
use super::interactive::{ButtonGroupRenderer, ButtonRenderer};
use super::primitive::{BadgeRenderer, IconTextRenderer, TextRenderer};
use super::{ComponentView, RenderContext, RenderHandle, Renderer};
use crate::protocol::kinds::ComponentBody;
use crate::protocol::{DataMap, RichComponent};

pub struct ComponentRegistry {
    renderers: HashMap<String, Arc<dyn Renderer>>,
    fallback: Arc<dyn Renderer>,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl ComponentRegistry {
    /// Registry with only the fallback renderer
    pub fn empty() -> Self {
        Self {
            renderers: HashMap::new(),
            fallback: Arc::new(FallbackRenderer),
        }
    }

    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        let builtin: Vec<Arc<dyn Renderer>> = vec![
            Arc::new(TextRenderer),
            Arc::new(BadgeRenderer),
            Arc::new(IconTextRenderer),
            Arc::new(StatusCardRenderer),
            Arc::new(ProgressRenderer::display()),
            Arc::new(ProgressRenderer::bar()),
            Arc::new(LogViewerRenderer),
            Arc::new(NotificationRenderer),
            Arc::new(StatusIndicatorRenderer),
            Arc::new(DataFrameRenderer),
            Arc::new(TableRenderer),
            Arc::new(ChartRenderer),
            Arc::new(CardRenderer),
            Arc::new(TaskListRenderer),
            Arc::new(CodeBlockRenderer),
            Arc::new(ButtonRenderer),
            Arc::new(ButtonGroupRenderer),
            Arc::new(ContainerRenderer),
            Arc::new(ArtifactRenderer),
        ];
        for renderer in builtin {
            registry.register(renderer.name(), renderer);
        }
        registry
    }

    /// Register or override the renderer for `tag`
    pub fn register(&mut self, tag: impl Into<String>, renderer: Arc<dyn Renderer>) {
        self.renderers.insert(tag.into(), renderer);
    }

    pub fn has(&self, tag: &str) -> bool {
        self.renderers.contains_key(tag)
    }

    fn resolve(&self, component: &RichComponent) -> (Arc<dyn Renderer>, ComponentBody) {
        let Some(renderer) = self.renderers.get(&component.component_type) else {
            tracing::debug!(
                "No renderer for type '{}', using fallback",
                component.component_type
            );
            return (self.fallback.clone(), ComponentBody::Unknown);
        };
        match ComponentBody::decode(&component.component_type, &component.data) {
            Ok(body) => (renderer.clone(), body),
            Err(e) => {
                tracing::warn!(
                    "Component {} ({}) failed to decode, using fallback: {}",
                    component.id,
                    component.component_type,
                    e
                );
                (self.fallback.clone(), ComponentBody::Unknown)
            }
        }
    }

    pub fn render(&self, component: &RichComponent, ctx: &RenderContext) -> RenderHandle {
        let (renderer, body) = self.resolve(component);
        let view = ComponentView {
            component,
            body: &body,
        };
        let mut handle = renderer.render(&view, ctx);
        handle.hidden = !component.visible;
        handle
    }

    /// Patch `handle` for the merged definition; a type change re-renders
    pub fn update(
        &self,
        handle: &mut RenderHandle,
        component: &RichComponent,
        changes: Option<&DataMap>,
        ctx: &RenderContext,
    ) {
        let (renderer, body) = self.resolve(component);
        if handle.component_type != component.component_type || handle.renderer != renderer.name() {
            *handle = self.render(component, ctx);
            return;
        }
        let view = ComponentView {
            component,
            body: &body,
        };
        renderer.update(handle, &view, changes, ctx);
        handle.component_id = component.id.clone();
        handle.hidden = !component.visible;
    }

    pub fn remove(&self, handle: &mut RenderHandle) {
        let renderer = self
            .renderers
            .get(&handle.component_type)
            .filter(|r| r.name() == handle.renderer)
            .unwrap_or(&self.fallback);
        renderer.remove(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn component(tag: &str, data: serde_json::Value) -> RichComponent {
        RichComponent::new("r1", tag, data.as_object().cloned().unwrap())
    }

    #[test]
    fn test_every_builtin_tag_is_registered() {
        let registry = ComponentRegistry::with_builtin();
        for tag in [
            "text", "badge", "icon_text", "status_card", "progress_display", "progress_bar",
            "log_viewer", "notification", "status_indicator", "dataframe", "table", "chart",
            "card", "task_list", "code_block", "button", "button_group", "container", "artifact",
        ] {
            assert!(registry.has(tag), "missing renderer for {}", tag);
        }
    }

    #[test]
    fn test_unknown_tag_uses_fallback() {
        let registry = ComponentRegistry::with_builtin();
        let handle = registry.render(&component("hologram", json!({"x": 1})), &RenderContext::default());
        assert_eq!(handle.renderer, "fallback");
    }

    #[test]
    fn test_decode_failure_uses_fallback() {
        let registry = ComponentRegistry::with_builtin();
        let handle = registry.render(
            &component("progress_bar", json!({"value": "half"})),
            &RenderContext::default(),
        );
        assert_eq!(handle.renderer, "fallback");
        assert!(handle.plain_text().starts_with("Unsupported component: progress_bar"));
    }

    #[test]
    fn test_type_change_rerenders() {
        let registry = ComponentRegistry::with_builtin();
        let ctx = RenderContext::default();
        let mut handle = registry.render(&component("text", json!({"content": "a"})), &ctx);
        registry.update(&mut handle, &component("badge", json!({"text": "b"})), None, &ctx);
        assert_eq!(handle.renderer, "badge");
        assert_eq!(handle.component_type, "badge");
    }

    struct CountingRenderer(Arc<AtomicUsize>);

    impl Renderer for CountingRenderer {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn render(&self, view: &ComponentView<'_>, _ctx: &RenderContext) -> RenderHandle {
            RenderHandle::new(view, self.name())
        }

        fn remove(&self, _handle: &mut RenderHandle) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_custom_renderer_for_new_tag() {
        let removed = Arc::new(AtomicUsize::new(0));
        let mut registry = ComponentRegistry::with_builtin();
        registry.register("gauge", Arc::new(CountingRenderer(removed.clone())));

        let mut handle = registry.render(&component("gauge", json!({})), &RenderContext::default());
        assert_eq!(handle.renderer, "counting");
        registry.remove(&mut handle);
        assert_eq!(removed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invisible_component_is_hidden() {
        let registry = ComponentRegistry::with_builtin();
        let mut hidden = component("text", json!({"content": "secret"}));
        hidden.visible = false;
        assert!(registry.render(&hidden, &RenderContext::default()).hidden);
    }
}
