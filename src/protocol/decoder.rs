//! Chunk classification
//!
//! Turns raw wire chunks into operations the component manager understands.
//! The decoder is stateless and total: every chunk maps to exactly one
//! `Decoded` value, malformed input degrades instead of failing.

use serde_json::{json, Value};

use super::ui_state::{is_ui_state_type, UiStateUpdate};
use super::{
    generate_id, ChatStreamChunk, ChunkOrigin, ComponentUpdate, DataMap, Lifecycle, RichComponent,
    UpdateOperation,
};

const COMPONENT_UPDATE: &str = "component_update";
const ERROR_TYPE: &str = "error";

/// Result of classifying one chunk
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Component(ComponentUpdate),
    UiState(UiStateUpdate),
    /// In-band failure notice from the backend
    BackendError(String),
    Empty,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ChunkDecoder;

impl ChunkDecoder {
    pub fn new() -> Self {
        Self
    }

    pub fn decode(&self, chunk: ChatStreamChunk) -> Decoded {
        let origin = chunk.origin.clone();
        let implicit_id = move || {
            origin
                .as_ref()
                .map(ChunkOrigin::component_id)
                .unwrap_or_else(generate_id)
        };

        if chunk.kind.as_deref() == Some(ERROR_TYPE) {
            return Decoded::BackendError(error_message(chunk.data.as_ref()));
        }

        match chunk.rich {
            Some(Value::Object(rich)) => self.decode_rich(rich, implicit_id),
            Some(Value::Null) | None => match chunk.text {
                Some(text) if !text.is_empty() => {
                    let mut data = DataMap::new();
                    data.insert("content".into(), Value::String(text));
                    Decoded::Component(ComponentUpdate::create(RichComponent::new(
                        implicit_id(),
                        "text",
                        data,
                    )))
                }
                _ => {
                    tracing::debug!("Ignoring chunk without rich or text payload");
                    Decoded::Empty
                }
            },
            Some(other) => {
                tracing::debug!("Rich payload is not an object, rendering raw: {}", other);
                let mut data = DataMap::new();
                data.insert("value".into(), other);
                Decoded::Component(ComponentUpdate::create(RichComponent::new(
                    implicit_id(),
                    "unknown",
                    data,
                )))
            }
        }
    }

    fn decode_rich(&self, rich: DataMap, implicit_id: impl Fn() -> String) -> Decoded {
        let tag = rich
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if is_ui_state_type(&tag) {
            return match UiStateUpdate::parse(&tag, merged_fields(&rich)) {
                Some(update) => Decoded::UiState(update),
                None => Decoded::Empty,
            };
        }

        if tag == ERROR_TYPE {
            return Decoded::BackendError(error_message(Some(&Value::Object(rich))));
        }

        if tag == COMPONENT_UPDATE {
            return match serde_json::from_value::<ComponentUpdate>(Value::Object(rich)) {
                Ok(update) => Decoded::Component(update),
                Err(e) => {
                    tracing::warn!("Malformed component_update envelope: {}", e);
                    Decoded::Empty
                }
            };
        }

        let has_id = rich
            .get("id")
            .and_then(Value::as_str)
            .is_some_and(|id| !id.is_empty());
        let lifecycle = rich
            .get("lifecycle")
            .and_then(Value::as_str)
            .and_then(Lifecycle::parse);

        let names_visibility = rich.contains_key("visible");
        let mut component = parse_component(rich, &implicit_id);

        match (has_id, lifecycle) {
            (true, Some(lifecycle)) => {
                component.normalize();
                let mut update = ComponentUpdate {
                    operation: UpdateOperation::from(lifecycle),
                    target_id: component.id.clone(),
                    component: None,
                    updates: None,
                    position: None,
                    timestamp: component.timestamp.clone(),
                    batch_id: None,
                };
                if lifecycle == Lifecycle::Update {
                    let mut updates = component.data.clone();
                    if names_visibility {
                        updates.insert("visible".into(), Value::Bool(component.visible));
                    }
                    if !component.children.is_empty() {
                        updates.insert("children".into(), json!(component.children));
                    }
                    update.updates = Some(updates);
                }
                update.component = Some(component);
                Decoded::Component(update)
            }
            _ => {
                component.lifecycle = Lifecycle::Create;
                if component.id.is_empty() {
                    component.id = implicit_id();
                }
                component.normalize();
                Decoded::Component(ComponentUpdate::create(component))
            }
        }
    }
}

/// Parse a component, keeping the raw object as data if its shape is off
fn parse_component(rich: DataMap, implicit_id: &dyn Fn() -> String) -> RichComponent {
    match serde_json::from_value::<RichComponent>(Value::Object(rich.clone())) {
        Ok(component) => component,
        Err(e) => {
            tracing::debug!("Unparseable component, rendering raw payload: {}", e);
            let id = rich
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(implicit_id);
            let tag = rich
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            RichComponent::new(id, tag, rich)
        }
    }
}

/// `data` merged with top-level attributes, top-level winning
fn merged_fields(rich: &DataMap) -> DataMap {
    let mut fields = rich
        .get("data")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    for (key, value) in rich {
        if key != "data" {
            fields.insert(key.clone(), value.clone());
        }
    }
    fields
}

fn error_message(data: Option<&Value>) -> String {
    let Some(data) = data else {
        return "Backend reported an error".to_string();
    };
    let nested = data.get("data").unwrap_or(data);
    nested
        .get("message")
        .or_else(|| data.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| "Backend reported an error".to_string())
}
