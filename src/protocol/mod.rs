//! Wire protocol between the agent backend and the chat client
//!
//! The backend pushes a sequence of chunks for every turn. Each chunk carries a
//! `rich` payload that is either a bare component definition, a
//! `component_update` envelope, or a UI-state signal targeting one of the fixed
//! widgets (status bar, task tracker, chat input).
//!
//! ```text
//! data: {"rich": {"id": "c1", "type": "text", "lifecycle": "create", "data": {...}}, ...}
//! data: {"rich": {"type": "component_update", "operation": "update", "target_id": "c1", ...}}
//! data: [DONE]
//! ```

pub mod decoder;
pub mod kinds;
pub mod ui_state;

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Open map of type-specific component fields
pub type DataMap = Map<String, Value>;

/// Sentinel payload terminating an SSE turn
pub const DONE_SENTINEL: &str = "[DONE]";

// ─────────────────────────────────────────────────────────────────────────────
// Components
// ─────────────────────────────────────────────────────────────────────────────

/// Operation that produced (or last touched) a component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Create,
    Update,
    Replace,
    Remove,
}

impl Lifecycle {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "replace" => Some(Self::Replace),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }
}

/// Operation carried by a `ComponentUpdate` envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOperation {
    Create,
    Update,
    Replace,
    Remove,
    Reorder,
    BulkUpdate,
}

impl From<Lifecycle> for UpdateOperation {
    fn from(lifecycle: Lifecycle) -> Self {
        match lifecycle {
            Lifecycle::Create => Self::Create,
            Lifecycle::Update => Self::Update,
            Lifecycle::Replace => Self::Replace,
            Lifecycle::Remove => Self::Remove,
        }
    }
}

/// A typed, identified unit of renderable state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichComponent {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type", default)]
    pub component_type: String,

    #[serde(default)]
    pub lifecycle: Lifecycle,

    #[serde(default, deserialize_with = "object_or_wrapped")]
    pub data: DataMap,

    /// Child component ids (containers only)
    #[serde(default)]
    pub children: Vec<String>,

    /// Backend timestamp, either ISO string or epoch number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,

    #[serde(default = "default_true")]
    pub visible: bool,

    #[serde(default)]
    pub interactive: bool,

    /// Component fields the backend placed outside `data`
    #[serde(flatten)]
    pub extra: DataMap,
}

impl RichComponent {
    pub fn new(id: impl Into<String>, component_type: impl Into<String>, data: DataMap) -> Self {
        Self {
            id: id.into(),
            component_type: component_type.into(),
            lifecycle: Lifecycle::Create,
            data,
            children: Vec::new(),
            timestamp: None,
            visible: true,
            interactive: false,
            extra: DataMap::new(),
        }
    }

    /// Fold top-level fields back into `data`
    ///
    /// Older backends serialize component attributes at the top level, newer
    /// ones nest them under `data`. When both carry a key the top-level value
    /// wins, matching the backend serializer which writes attributes last.
    pub fn normalize(&mut self) {
        for (key, value) in std::mem::take(&mut self.extra) {
            self.data.insert(key, value);
        }
        if self.id.is_empty() {
            self.id = generate_id();
        }
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    /// Merge a partial field map into this definition
    ///
    /// `visible`, `interactive` and `children` address metadata; a nested
    /// `data` object is merged key by key; anything else lands in `data`.
    pub fn merge_updates(&mut self, updates: &DataMap) {
        for (key, value) in updates {
            match key.as_str() {
                "visible" => {
                    if let Some(visible) = value.as_bool() {
                        self.visible = visible;
                    }
                }
                "interactive" => {
                    if let Some(interactive) = value.as_bool() {
                        self.interactive = interactive;
                    }
                }
                "children" => {
                    if let Ok(children) = serde_json::from_value::<Vec<String>>(value.clone()) {
                        self.children = children;
                    }
                }
                "data" if value.is_object() => {
                    if let Some(nested) = value.as_object() {
                        for (k, v) in nested {
                            self.data.insert(k.clone(), v.clone());
                        }
                    }
                }
                _ => {
                    self.data.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

fn default_true() -> bool {
    true
}

/// Accept `data` as an object; wrap any other shape instead of rejecting it
fn object_or_wrapped<'de, D>(deserializer: D) -> Result<DataMap, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(map) => map,
        Value::Null => DataMap::new(),
        other => {
            let mut map = DataMap::new();
            map.insert("value".to_string(), other);
            map
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Update envelope
// ─────────────────────────────────────────────────────────────────────────────

/// Placement hint carried by `reorder`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub anchor_id: Option<String>,
    #[serde(default = "default_relation")]
    pub relation: String,
}

fn default_relation() -> String {
    "after".to_string()
}

/// Wire envelope describing an operation against a component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentUpdate {
    pub operation: UpdateOperation,

    #[serde(default)]
    pub target_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<RichComponent>,

    /// Partial fields for `update`; id-keyed partials for `bulk_update`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updates: Option<DataMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,

    /// Groups the chunks of one backend turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
}

impl ComponentUpdate {
    pub fn create(component: RichComponent) -> Self {
        Self {
            operation: UpdateOperation::Create,
            target_id: component.id.clone(),
            component: Some(component),
            updates: None,
            position: None,
            timestamp: None,
            batch_id: None,
        }
    }

    pub fn update(target_id: impl Into<String>, updates: DataMap) -> Self {
        Self {
            operation: UpdateOperation::Update,
            target_id: target_id.into(),
            component: None,
            updates: Some(updates),
            position: None,
            timestamp: None,
            batch_id: None,
        }
    }

    pub fn remove(target_id: impl Into<String>) -> Self {
        Self {
            operation: UpdateOperation::Remove,
            target_id: target_id.into(),
            component: None,
            updates: None,
            position: None,
            timestamp: None,
            batch_id: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request / response
// ─────────────────────────────────────────────────────────────────────────────

/// Outbound turn request, identical for every transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: String,
    pub request_id: String,
    #[serde(default)]
    pub metadata: DataMap,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: conversation_id.into(),
            request_id: generate_id(),
            metadata: DataMap::new(),
        }
    }
}

/// A single inbound chunk
///
/// Backends also emit bare `{"type": "error", "data": {...}}` frames on the
/// same channel, so `kind` and `data` are captured alongside `rich`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rich: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Plain fallback representation (ignored by this client)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simple: Option<Value>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,

    /// Where this chunk sits in its turn; set by the transport client
    #[serde(skip)]
    pub origin: Option<ChunkOrigin>,
}

/// Position of a chunk within one turn
///
/// A polling replay restarts at zero, so the n-th chunk of the replay gets
/// the same position as the n-th chunk the primary delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOrigin {
    pub request_id: String,
    pub sequence: usize,
}

impl ChunkOrigin {
    /// Stable id for a component the chunk creates without naming one
    pub fn component_id(&self) -> String {
        format!("cw-{}-{}", self.request_id, self.sequence)
    }
}

impl ChatStreamChunk {
    pub fn rich(rich: Value) -> Self {
        Self {
            rich: Some(rich),
            timestamp: Some(Value::String(Utc::now().to_rfc3339())),
            ..Default::default()
        }
    }
}

/// Complete response of the polling endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub chunks: Vec<ChatStreamChunk>,
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub total_chunks: usize,
}

/// Generate a unique id for requests and id-less components
pub fn generate_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let count = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("cw-{}-{}", Utc::now().timestamp_millis(), count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn component_keeps_top_level_fields_as_extra() {
        let component: RichComponent = serde_json::from_value(json!({
            "id": "c1",
            "type": "badge",
            "text": "beta",
            "data": {"variant": "info"}
        }))
        .unwrap();

        assert_eq!(component.extra.get("text"), Some(&json!("beta")));

        let normalized = component.normalized();
        assert_eq!(normalized.data.get("text"), Some(&json!("beta")));
        assert_eq!(normalized.data.get("variant"), Some(&json!("info")));
        assert!(normalized.extra.is_empty());
    }

    #[test]
    fn non_object_data_is_wrapped_not_rejected() {
        let component: RichComponent =
            serde_json::from_value(json!({"id": "c1", "type": "text", "data": [1, 2]})).unwrap();
        assert_eq!(component.data.get("value"), Some(&json!([1, 2])));
    }

    #[test]
    fn merge_updates_routes_metadata_keys() {
        let mut component = RichComponent::new("c1", "text", DataMap::new());
        let updates = json!({
            "content": "world",
            "visible": false,
            "children": ["a", "b"],
            "data": {"markdown": true}
        });
        component.merge_updates(updates.as_object().unwrap());

        assert!(!component.visible);
        assert_eq!(component.children, vec!["a", "b"]);
        assert_eq!(component.data.get("content"), Some(&json!("world")));
        assert_eq!(component.data.get("markdown"), Some(&json!(true)));
        assert!(component.data.get("visible").is_none());
    }

    #[test]
    fn chunk_accepts_numeric_timestamp_and_error_frames() {
        let chunk: ChatStreamChunk = serde_json::from_str(
            r#"{"type":"error","data":{"message":"boom"},"timestamp":1700000000.5}"#,
        )
        .unwrap();
        assert_eq!(chunk.kind.as_deref(), Some("error"));
        assert!(chunk.rich.is_none());
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(generate_id(), generate_id());
    }
}
