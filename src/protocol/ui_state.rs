//! Out-of-band UI-state signals
//!
//! These travel in the same chunk stream as components but target the fixed
//! widgets around the transcript. They carry `id`/`lifecycle` like components,
//! so the decoder must check for them before component tracking.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::DataMap;

pub const STATUS_BAR_UPDATE: &str = "status_bar_update";
pub const TASK_TRACKER_UPDATE: &str = "task_tracker_update";
pub const CHAT_INPUT_UPDATE: &str = "chat_input_update";

/// Reserved type tags routed away from the component manager
pub fn is_ui_state_type(tag: &str) -> bool {
    matches!(tag, STATUS_BAR_UPDATE | TASK_TRACKER_UPDATE | CHAT_INPUT_UPDATE)
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiStateUpdate {
    StatusBar(StatusBarPayload),
    TaskTracker(TaskTrackerPayload),
    ChatInput(ChatInputPayload),
}

impl UiStateUpdate {
    /// Parse a reserved payload; `fields` is `data` merged with top-level attributes
    pub fn parse(tag: &str, fields: DataMap) -> Option<Self> {
        let value = Value::Object(fields);
        let parsed = match tag {
            STATUS_BAR_UPDATE => serde_json::from_value(value).map(Self::StatusBar),
            TASK_TRACKER_UPDATE => serde_json::from_value(value).map(Self::TaskTracker),
            CHAT_INPUT_UPDATE => serde_json::from_value(value).map(Self::ChatInput),
            _ => return None,
        };
        match parsed {
            Ok(update) => Some(update),
            Err(e) => {
                tracing::warn!("Malformed {} payload: {}", tag, e);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusBarPayload {
    pub status: String,
    pub message: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOperation {
    AddTask,
    UpdateTask,
    RemoveTask,
    ClearTasks,
}

/// Task as carried by `add_task`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSpec {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTrackerPayload {
    pub operation: TaskOperation,
    #[serde(default)]
    pub task: Option<TaskSpec>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Every field is optional; absent fields leave the input untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatInputPayload {
    pub placeholder: Option<String>,
    pub disabled: Option<bool>,
    pub value: Option<String>,
    pub focus: Option<bool>,
}
