//! Singleton widgets driven by the UI-state side channel
//!
//! The status bar, task tracker and chat input live outside the transcript.
//! Updates are "set current value" operations with no history; the TUI reads
//! the shared state each frame.

use std::sync::{Arc, Mutex, PoisonError};

use crate::protocol::ui_state::{
    ChatInputPayload, StatusBarPayload, TaskOperation, TaskTrackerPayload, UiStateUpdate,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BarStatus {
    #[default]
    Idle,
    Working,
    Success,
    Warning,
    Error,
}

impl BarStatus {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "working" | "running" | "in_progress" | "loading" => Self::Working,
            "success" | "completed" | "done" => Self::Success,
            "warning" => Self::Warning,
            "error" | "failed" => Self::Error,
            _ => Self::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Working => "working",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusBar {
    pub status: BarStatus,
    pub message: String,
    pub detail: Option<String>,
}

impl Default for StatusBar {
    fn default() -> Self {
        Self {
            status: BarStatus::Idle,
            message: "Ready".to_string(),
            detail: None,
        }
    }
}

impl StatusBar {
    pub fn set(&mut self, status: BarStatus, message: impl Into<String>, detail: Option<String>) {
        self.status = status;
        self.message = message.into();
        self.detail = detail;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedTask {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub progress: Option<f64>,
    pub detail: Option<String>,
}

/// Ordered task list shown in the sidebar
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskTracker {
    tasks: Vec<TrackedTask>,
}

impl TaskTracker {
    pub fn tasks(&self) -> &[TrackedTask] {
        &self.tasks
    }

    /// Adding an existing id replaces it in place
    pub fn add(&mut self, task: TrackedTask) {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => self.tasks.push(task),
        }
    }

    /// Unknown ids are ignored
    pub fn update(
        &mut self,
        id: &str,
        status: Option<String>,
        progress: Option<f64>,
        detail: Option<String>,
    ) {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            tracing::debug!("Task tracker update for unknown task {}", id);
            return;
        };
        if let Some(status) = status {
            task.status = status;
        }
        if let Some(progress) = progress {
            task.progress = Some(progress.clamp(0.0, 1.0));
        }
        if detail.is_some() {
            task.detail = detail;
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.tasks.retain(|t| t.id != id);
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    fn apply(&mut self, payload: TaskTrackerPayload) {
        match payload.operation {
            TaskOperation::AddTask => {
                let Some(spec) = payload.task else {
                    tracing::debug!("add_task without task");
                    return;
                };
                let id = if spec.id.is_empty() {
                    crate::protocol::generate_id()
                } else {
                    spec.id
                };
                self.add(TrackedTask {
                    id,
                    title: spec.title,
                    description: spec.description,
                    status: spec.status.unwrap_or_else(|| "pending".to_string()),
                    progress: spec.progress,
                    detail: None,
                });
            }
            TaskOperation::UpdateTask => {
                if let Some(id) = payload.task_id {
                    self.update(&id, payload.status, payload.progress, payload.detail);
                }
            }
            TaskOperation::RemoveTask => {
                if let Some(id) = payload.task_id {
                    self.remove(&id);
                }
            }
            TaskOperation::ClearTasks => self.clear(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatInputState {
    pub placeholder: String,
    pub disabled: bool,
    /// Value pushed by the backend; consumed by the input line via `value_revision`
    pub value: Option<String>,
    pub focused: bool,
    pub value_revision: u64,
}

impl Default for ChatInputState {
    fn default() -> Self {
        Self {
            placeholder: "Ask a question...".to_string(),
            disabled: false,
            value: None,
            focused: true,
            value_revision: 0,
        }
    }
}

impl ChatInputState {
    fn apply(&mut self, payload: ChatInputPayload) {
        if let Some(placeholder) = payload.placeholder {
            self.placeholder = placeholder;
        }
        if let Some(disabled) = payload.disabled {
            self.disabled = disabled;
        }
        if let Some(value) = payload.value {
            self.value = Some(value);
            self.value_revision += 1;
        }
        if let Some(focus) = payload.focus {
            self.focused = focus;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiState {
    pub status_bar: StatusBar,
    pub tasks: TaskTracker,
    pub chat_input: ChatInputState,
}

impl UiState {
    pub fn apply(&mut self, update: UiStateUpdate) {
        match update {
            UiStateUpdate::StatusBar(StatusBarPayload {
                status,
                message,
                detail,
            }) => self.status_bar.set(BarStatus::parse(&status), message, detail),
            UiStateUpdate::TaskTracker(payload) => self.tasks.apply(payload),
            UiStateUpdate::ChatInput(payload) => self.chat_input.apply(payload),
        }
    }
}

/// Receiver for side-channel updates, injected into the component manager
pub trait UiStateSink: Send {
    fn apply(&mut self, update: UiStateUpdate);
    fn set_status(&mut self, status: BarStatus, message: &str, detail: Option<String>);
    fn status(&self) -> BarStatus;
}

/// Thread-safe handle shared between the manager and the TUI
pub type SharedUiState = Arc<Mutex<UiState>>;

pub fn shared() -> SharedUiState {
    Arc::new(Mutex::new(UiState::default()))
}

impl UiStateSink for SharedUiState {
    fn apply(&mut self, update: UiStateUpdate) {
        self.lock().unwrap_or_else(PoisonError::into_inner).apply(update);
    }

    fn set_status(&mut self, status: BarStatus, message: &str, detail: Option<String>) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .status_bar
            .set(status, message, detail);
    }

    fn status(&self) -> BarStatus {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .status_bar
            .status
    }
}
