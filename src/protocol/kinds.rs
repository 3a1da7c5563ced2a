//! Typed payloads for the known component tags
//!
//! Each tag owns a serde struct with every field defaulted, so a payload with
//! missing or unfamiliar fields still decodes. Decoding only fails when a field
//! is present with an incompatible shape; the registry then falls back to the
//! raw JSON renderer.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::DataMap;

/// Decoded body of a component, one variant per known tag
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentBody {
    Text(TextData),
    Badge(BadgeData),
    IconText(IconTextData),
    StatusCard(StatusCardData),
    ProgressDisplay(ProgressData),
    ProgressBar(ProgressData),
    LogViewer(LogViewerData),
    Notification(NotificationData),
    StatusIndicator(StatusIndicatorData),
    DataFrame(DataFrameData),
    Table(TableData),
    Chart(ChartData),
    Card(CardData),
    TaskList(TaskListData),
    CodeBlock(CodeBlockData),
    Button(ButtonData),
    ButtonGroup(ButtonGroupData),
    Container(ContainerData),
    Artifact(ArtifactData),
    Unknown,
}

impl ComponentBody {
    /// Decode `data` according to `tag`
    pub fn decode(tag: &str, data: &DataMap) -> Result<Self, serde_json::Error> {
        Ok(match tag {
            "text" => Self::Text(from_map(data)?),
            "badge" => Self::Badge(from_map(data)?),
            "icon_text" => Self::IconText(from_map(data)?),
            "status_card" => Self::StatusCard(from_map(data)?),
            "progress_display" => Self::ProgressDisplay(from_map(data)?),
            "progress_bar" => Self::ProgressBar(from_map(data)?),
            "log_viewer" => Self::LogViewer(from_map(data)?),
            "notification" => Self::Notification(from_map(data)?),
            "status_indicator" => Self::StatusIndicator(from_map(data)?),
            "dataframe" => Self::DataFrame(from_map(data)?),
            "table" => Self::Table(from_map(data)?),
            "chart" => Self::Chart(from_map(data)?),
            "card" => Self::Card(from_map(data)?),
            "task_list" => Self::TaskList(from_map(data)?),
            "code_block" => Self::CodeBlock(from_map(data)?),
            "button" => Self::Button(from_map(data)?),
            "button_group" => Self::ButtonGroup(from_map(data)?),
            "container" => Self::Container(from_map(data)?),
            "artifact" => Self::Artifact(from_map(data)?),
            _ => Self::Unknown,
        })
    }
}

fn from_map<T: DeserializeOwned>(data: &DataMap) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(data.clone()))
}

/// Stringify a scalar for display; objects and arrays become compact JSON
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Primitive
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextData {
    pub content: String,
    pub markdown: bool,
    /// `user` marks an echo of the local user's message
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BadgeData {
    pub text: String,
    pub variant: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IconTextData {
    pub icon: String,
    pub text: String,
    pub variant: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Feedback
// ─────────────────────────────────────────────────────────────────────────────

/// A button-like action attached to a card or notification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionSpec {
    pub label: String,
    pub action: String,
    pub variant: String,
    pub icon: Option<String>,
    pub disabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCardData {
    pub title: String,
    pub status: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub collapsible: bool,
    pub collapsed: bool,
    pub metadata: DataMap,
    pub actions: Vec<ActionSpec>,
}

/// Shared by `progress_display` and `progress_bar`; `value` is 0.0..=1.0
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressData {
    pub label: String,
    pub value: f64,
    pub description: Option<String>,
    pub status: Option<String>,
    pub animated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEntry {
    pub timestamp: Option<Value>,
    pub level: String,
    pub message: String,
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogViewerData {
    pub title: String,
    pub entries: Vec<LogEntry>,
    pub max_entries: usize,
    pub show_timestamps: bool,
}

impl Default for LogViewerData {
    fn default() -> Self {
        Self {
            title: "Logs".to_string(),
            entries: Vec::new(),
            max_entries: 100,
            show_timestamps: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationData {
    pub message: String,
    pub title: Option<String>,
    pub level: String,
    pub dismissible: bool,
    pub actions: Vec<ActionSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusIndicatorData {
    pub status: String,
    pub message: String,
    pub pulse: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Data
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataFrameData {
    pub title: Option<String>,
    pub description: Option<String>,
    pub columns: Vec<String>,
    /// Row objects keyed by column; the backend also sends them as `data`
    #[serde(alias = "data")]
    pub rows: Vec<DataMap>,
    /// Column name to a type hint such as `number`, `int64`, `float64`, `string`
    pub column_types: DataMap,
    pub row_count: Option<usize>,
    pub max_rows_displayed: Option<usize>,
    pub searchable: Option<bool>,
    pub sortable: Option<bool>,
    pub exportable: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableColumn {
    pub key: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableData {
    pub title: Option<String>,
    pub columns: Vec<TableColumn>,
    pub rows: Vec<DataMap>,
    pub max_rows_displayed: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartData {
    pub title: Option<String>,
    pub chart_type: String,
    /// Chart library payload; either `{labels, datasets}` or plotly-style traces
    pub data: Value,
    pub config: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardData {
    pub title: String,
    pub subtitle: Option<String>,
    pub content: String,
    pub markdown: bool,
    pub icon: Option<String>,
    pub status: Option<String>,
    pub actions: Vec<ActionSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskItem {
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskListData {
    pub title: String,
    pub tasks: Vec<TaskItem>,
    pub show_progress: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeBlockData {
    #[serde(alias = "code")]
    pub content: String,
    pub language: Option<String>,
    pub title: Option<String>,
    pub line_numbers: Option<bool>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Interactive, container, artifact
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonData {
    pub label: String,
    pub action: String,
    pub variant: String,
    pub size: Option<String>,
    pub icon: Option<String>,
    pub icon_position: Option<String>,
    pub disabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonGroupData {
    pub buttons: Vec<ButtonData>,
    pub orientation: String,
    pub spacing: Option<String>,
    pub align: Option<String>,
    pub full_width: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerData {
    pub title: Option<String>,
    pub layout: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactData {
    pub artifact_id: String,
    pub content: String,
    pub artifact_type: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub external_renderable: Option<bool>,
    pub fullscreen_capable: Option<bool>,
    pub dependencies: Vec<String>,
}
