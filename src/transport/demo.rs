// Demo mode: an in-process scripted backend to showcase the TUI
//
// The script exercises every component type and update pattern the client
// supports, so the UI can be tried without running a server:
// - create → update chains (status card, progress, task list, dataframe, chart)
// - a temporary component that is removed at the end of the turn
// - interactive buttons whose actions come back as new turns
// - an artifact, a container with children, and the UI-state side channel
//
// Run with: CHATWIRE_DEMO=1 cargo run --release

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_stream::wrappers::ReceiverStream;

use super::{ChunkStream, StreamTransport, TransportError};
use crate::protocol::{ChatRequest, ChatStreamChunk};

/// Default spacing between scripted chunks
const DEFAULT_PACE: Duration = Duration::from_millis(250);

/// One scripted chunk and how many pace units to wait after it
type Step = (ChatStreamChunk, u32);

pub struct DemoTransport {
    actions: AtomicUsize,
    pace: Duration,
}

impl Default for DemoTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoTransport {
    pub fn new() -> Self {
        Self::with_pace(DEFAULT_PACE)
    }

    /// Zero pace replays the script instantly (tests, `ask`)
    pub fn with_pace(pace: Duration) -> Self {
        Self {
            actions: AtomicUsize::new(0),
            pace,
        }
    }

    /// Chunks the backend would send for `request`
    pub fn script(&self, request: &ChatRequest) -> Vec<Step> {
        let turn = Turn::new(request);
        let message = request.message.trim();
        if message.starts_with('/') && message != "/test" {
            let count = self.actions.fetch_add(1, Ordering::SeqCst) + 1;
            turn.action_reply(message, count)
        } else if message.to_lowercase().contains("test") {
            turn.showcase()
        } else {
            turn.echo(message)
        }
    }
}

#[async_trait]
impl StreamTransport for DemoTransport {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn connect(&self, request: &ChatRequest) -> Result<ChunkStream, TransportError> {
        let steps = self.script(request);
        let pace = self.pace;
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            for (chunk, weight) in steps {
                if tx.send(Ok(chunk)).await.is_err() {
                    tracing::debug!("Demo turn dropped by the client");
                    return;
                }
                if !pace.is_zero() && weight > 0 {
                    sleep(pace * weight).await;
                }
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Script builders
// ─────────────────────────────────────────────────────────────────────────────

struct Turn {
    conversation_id: String,
    request_id: String,
    steps: Vec<Step>,
}

impl Turn {
    fn new(request: &ChatRequest) -> Self {
        Self {
            conversation_id: request.conversation_id.clone(),
            request_id: request.request_id.clone(),
            steps: Vec::new(),
        }
    }

    /// Per-turn component id so repeated showcases never collide
    fn id(&self, name: &str) -> String {
        format!("{}-{}", self.request_id, name)
    }

    fn push(&mut self, rich: Value, weight: u32) {
        let mut chunk = ChatStreamChunk::rich(rich);
        chunk.conversation_id = Some(self.conversation_id.clone());
        chunk.request_id = Some(self.request_id.clone());
        self.steps.push((chunk, weight));
    }

    fn create(&mut self, name: &str, kind: &str, data: Value, weight: u32) {
        let id = self.id(name);
        self.push(
            json!({"id": id, "type": kind, "lifecycle": "create", "data": data}),
            weight,
        );
    }

    fn update(&mut self, name: &str, kind: &str, data: Value, weight: u32) {
        let id = self.id(name);
        self.push(
            json!({"id": id, "type": kind, "lifecycle": "update", "data": data}),
            weight,
        );
    }

    fn status_bar(&mut self, status: &str, message: &str) {
        self.push(
            json!({
                "id": "vanna-status-bar",
                "type": "status_bar_update",
                "lifecycle": "update",
                "data": {"status": status, "message": message}
            }),
            1,
        );
    }

    fn tracker(&mut self, data: Value) {
        self.push(
            json!({
                "id": "vanna-task-tracker",
                "type": "task_tracker_update",
                "lifecycle": "update",
                "data": data
            }),
            1,
        );
    }

    fn echo(mut self, message: &str) -> Vec<Step> {
        self.create(
            "reply",
            "text",
            json!({
                "content": format!(
                    "You said: {}\n\nType `/test` to run the comprehensive component test.",
                    message
                ),
                "markdown": true
            }),
            0,
        );
        self.steps
    }

    fn action_reply(mut self, message: &str, count: usize) -> Vec<Step> {
        self.create(
            "action-notification",
            "notification",
            json!({
                "message": format!("Action received: {}", message),
                "level": "success",
                "title": format!("Action #{}", count)
            }),
            1,
        );
        self.create(
            "action-card",
            "card",
            json!({
                "title": "Action Handler Response",
                "content": format!(
                    "Received action: `{}`\n\nThis confirms button interactivity is working!",
                    message
                ),
                "markdown": true,
                "icon": "🎯",
                "status": "success"
            }),
            0,
        );
        self.steps
    }

    fn showcase(mut self) -> Vec<Step> {
        self.status_bar("working", "Running comprehensive component test...");
        self.create(
            "loading",
            "status_indicator",
            json!({"status": "loading", "message": "Preparing showcase...", "pulse": true}),
            1,
        );
        self.create(
            "intro",
            "text",
            json!({
                "content": "# 🧪 Comprehensive Component Test\n\n\
                    This turn exercises every component type the client renders:\n\n\
                    1. **Primitive**: text, badge, icon text\n\
                    2. **Feedback**: status card, progress, notifications, logs\n\
                    3. **Data**: card, task list, dataframe, table, chart, code\n\
                    4. **Specialized**: artifact, container\n\
                    5. **Interactive**: buttons with actions\n\n\
                    Watch the task tracker as sections complete.",
                "markdown": true
            }),
            2,
        );
        self.tracker(json!({
            "operation": "add_task",
            "task": {"id": "demo-feedback", "title": "Feedback components", "status": "in_progress", "progress": 0.0}
        }));
        self.tracker(json!({
            "operation": "add_task",
            "task": {"id": "demo-data", "title": "Data components", "status": "pending"}
        }));
        self.tracker(json!({
            "operation": "add_task",
            "task": {"id": "demo-interactive", "title": "Interactive components", "status": "pending"}
        }));

        self.feedback_section();
        self.tracker(json!({"operation": "update_task", "task_id": "demo-feedback", "status": "completed", "progress": 1.0}));
        self.tracker(json!({"operation": "update_task", "task_id": "demo-data", "status": "in_progress"}));

        self.data_section();
        self.tracker(json!({"operation": "update_task", "task_id": "demo-data", "status": "completed", "progress": 1.0}));
        self.tracker(json!({"operation": "update_task", "task_id": "demo-interactive", "status": "in_progress"}));

        self.interactive_section();
        self.tracker(json!({"operation": "update_task", "task_id": "demo-interactive", "status": "completed", "progress": 1.0}));

        self.push(
            json!({"id": self.id("loading"), "type": "status_indicator", "lifecycle": "remove"}),
            1,
        );
        self.create(
            "done",
            "status_card",
            json!({
                "title": "Test Suite Complete",
                "status": "completed",
                "icon": "✅",
                "description": "All component types rendered. Click a button above to test the action round trip."
            }),
            1,
        );
        self.status_bar("success", "All components validated successfully!");
        self.push(
            json!({
                "id": "vanna-chat-input",
                "type": "chat_input_update",
                "lifecycle": "update",
                "data": {"placeholder": "Type a message, or /test to run again...", "disabled": false}
            }),
            0,
        );
        self.steps
    }

    fn feedback_section(&mut self) {
        self.create(
            "status",
            "status_card",
            json!({
                "title": "Status Card Test",
                "status": "pending",
                "description": "Testing status card component...",
                "icon": "⏳",
                "collapsible": true,
                "collapsed": false
            }),
            2,
        );
        self.update(
            "status",
            "status_card",
            json!({"status": "running", "description": "Processing test..."}),
            2,
        );
        self.update(
            "status",
            "status_card",
            json!({"status": "completed", "description": "Test completed successfully!", "icon": "✅"}),
            1,
        );

        self.create(
            "progress",
            "progress_display",
            json!({"label": "Test Progress", "value": 0.0, "description": "Starting test...", "status": "info", "animated": true}),
            1,
        );
        self.update(
            "progress",
            "progress_display",
            json!({"value": 0.5, "description": "Halfway there..."}),
            1,
        );
        self.update(
            "progress",
            "progress_display",
            json!({"value": 1.0, "description": "Complete!", "status": "success"}),
            1,
        );

        self.create(
            "bar",
            "progress_bar",
            json!({"label": "Loading", "value": 0.3, "status": "info"}),
            1,
        );
        self.update("bar", "progress_bar", json!({"value": 0.8, "status": "success"}), 1);

        for level in ["info", "success", "warning", "error"] {
            let mut title = level.to_string();
            title[..1].make_ascii_uppercase();
            self.create(
                &format!("notice-{}", level),
                "notification",
                json!({
                    "message": format!("This is a {} notification", level),
                    "level": level,
                    "title": format!("{} Test", title)
                }),
                1,
            );
        }

        let mut entries = vec![
            json!({"message": "System started", "level": "info"}),
            json!({"message": "Loading configuration...", "level": "info"}),
            json!({"message": "Configuration loaded successfully", "level": "info"}),
        ];
        self.create(
            "logs",
            "log_viewer",
            json!({"title": "System Logs", "entries": entries.clone()}),
            1,
        );
        for (message, level) in [
            ("Memory usage at 75%", "warning"),
            ("Connection timeout", "error"),
            ("Reconnected successfully", "info"),
        ] {
            entries.push(json!({
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "message": message,
                "level": level
            }));
            self.update("logs", "log_viewer", json!({"entries": entries.clone()}), 1);
        }
    }

    fn data_section(&mut self) {
        let mut tasks = vec![
            json!({"title": "Setup development environment", "description": "Install dependencies and configure tools", "status": "completed", "progress": 1.0}),
            json!({"title": "Write test suite", "description": "Create comprehensive component tests", "status": "in_progress", "progress": 0.7}),
            json!({"title": "Run validation", "description": "Validate all components render correctly", "status": "pending"}),
        ];
        self.create(
            "tasks",
            "task_list",
            json!({"title": "Validation Workflow", "tasks": tasks.clone(), "show_progress": true}),
            2,
        );
        tasks[1] = json!({"title": "Write test suite", "description": "Create comprehensive component tests", "status": "completed", "progress": 1.0});
        tasks[2] = json!({"title": "Run validation", "description": "Validate all components render correctly", "status": "in_progress", "progress": 0.3});
        self.update(
            "tasks",
            "task_list",
            json!({"title": "Validation Workflow (Updated)", "tasks": tasks}),
            1,
        );

        let mut rows = vec![
            json!({"id": 1, "name": "Alice", "age": 30, "city": "New York", "salary": 75000}),
            json!({"id": 2, "name": "Bob", "age": 25, "city": "San Francisco", "salary": 85000}),
            json!({"id": 3, "name": "Charlie", "age": 35, "city": "Chicago", "salary": 70000}),
            json!({"id": 4, "name": "Diana", "age": 28, "city": "Boston", "salary": null}),
            json!({"id": 5, "name": "Eve", "age": 32, "city": "Seattle", "salary": 90000}),
        ];
        let columns = json!(["id", "name", "age", "city", "salary"]);
        self.create(
            "employees",
            "dataframe",
            json!({
                "title": "📊 Employee Data",
                "description": "Press `/` to search, `s` to sort, `e` to export CSV",
                "columns": columns,
                "rows": rows.clone(),
                "row_count": rows.len(),
                "column_types": {"id": "int64", "name": "object", "age": "int64", "city": "object", "salary": "float64"}
            }),
            2,
        );
        rows.push(json!({"id": 6, "name": "Frank", "age": 29, "city": "Austin", "salary": 78000}));
        self.update(
            "employees",
            "dataframe",
            json!({"title": "📊 Employee Data (Updated)", "rows": rows.clone(), "row_count": rows.len()}),
            1,
        );

        self.create(
            "regions",
            "table",
            json!({
                "title": "Regional Totals",
                "columns": [{"key": "region", "title": "Region"}, {"key": "total", "title": "Total"}],
                "rows": [{"region": "North", "total": 1200}, {"region": "South", "total": 980}]
            }),
            1,
        );

        self.create(
            "chart",
            "chart",
            json!({
                "title": "Sales Chart",
                "chart_type": "bar",
                "data": {
                    "data": [{"x": ["Product A", "Product B", "Product C", "Product D"], "y": [20, 35, 30, 25], "type": "bar", "name": "Sales"}],
                    "layout": {"title": "Product Sales"}
                }
            }),
            2,
        );
        self.update(
            "chart",
            "chart",
            json!({
                "title": "Revenue Chart",
                "chart_type": "line",
                "data": {
                    "data": [{"x": ["Jan", "Feb", "Mar", "Apr", "May"], "y": [10, 15, 13, 17, 21], "type": "scatter", "name": "Revenue"}],
                    "layout": {"title": "Monthly Revenue Trend"}
                }
            }),
            1,
        );

        self.create(
            "sql",
            "code_block",
            json!({
                "title": "Generated SQL",
                "language": "sql",
                "content": "SELECT city, AVG(salary) AS avg_salary\nFROM employees\nGROUP BY city\nORDER BY avg_salary DESC;",
                "line_numbers": true
            }),
            1,
        );

        self.create(
            "artifact",
            "artifact",
            json!({
                "artifact_id": self.id("circles"),
                "artifact_type": "svg",
                "title": "SVG Circle Visualization",
                "description": "Concentric circles demonstration",
                "content": "<svg width=\"200\" height=\"200\" xmlns=\"http://www.w3.org/2000/svg\">\n  <circle cx=\"100\" cy=\"100\" r=\"80\" fill=\"#667eea\" opacity=\"0.8\"/>\n  <circle cx=\"100\" cy=\"100\" r=\"60\" fill=\"#764ba2\" opacity=\"0.6\"/>\n  <circle cx=\"100\" cy=\"100\" r=\"40\" fill=\"#f093fb\" opacity=\"0.4\"/>\n</svg>",
                "fullscreen_capable": true
            }),
            2,
        );
    }

    fn interactive_section(&mut self) {
        self.create(
            "badge",
            "badge",
            json!({"text": "Test Badge", "variant": "primary"}),
            1,
        );
        self.create(
            "icon",
            "icon_text",
            json!({"icon": "🔧", "text": "Tool Icon Test"}),
            1,
        );
        let children = json!([self.id("badge"), self.id("icon")]);
        let container = self.id("group");
        self.push(
            json!({
                "id": container,
                "type": "container",
                "lifecycle": "create",
                "children": children,
                "data": {"title": "Grouped primitives"}
            }),
            1,
        );

        self.create(
            "card",
            "card",
            json!({
                "title": "Test Card with Markdown",
                "content": "This card demonstrates **markdown rendering** within cards.\n\nUse Tab to focus a button and Enter to press it.",
                "markdown": true,
                "icon": "🃏",
                "status": "info",
                "actions": [
                    {"label": "Test Action", "action": "/test-action", "variant": "primary"},
                    {"label": "Cancel", "action": "/cancel", "variant": "secondary"}
                ]
            }),
            2,
        );
        self.update(
            "card",
            "card",
            json!({"status": "success", "content": "# Card Updated Successfully!\n\n✓ Update operation verified"}),
            1,
        );

        self.create(
            "button",
            "button",
            json!({"label": "Single Button", "action": "/button-test", "variant": "primary", "icon": "🔘"}),
            1,
        );
        self.create(
            "options",
            "button_group",
            json!({
                "buttons": [
                    {"label": "Option 1", "action": "/option1", "variant": "primary"},
                    {"label": "Option 2", "action": "/option2", "variant": "secondary"},
                    {"label": "Option 3", "action": "/option3", "variant": "success"}
                ],
                "orientation": "horizontal"
            }),
            1,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{ComponentManager, ManagerDeps};
    use crate::protocol::decoder::ChunkDecoder;
    use crate::render::{ComponentRegistry, RenderContext};
    use crate::ui_state::{self, BarStatus};

    fn run(transport: &DemoTransport, message: &str) -> (ComponentManager, ui_state::SharedUiState) {
        let ui = ui_state::shared();
        let mut manager = ComponentManager::new(
            ComponentRegistry::with_builtin(),
            RenderContext::default(),
            ManagerDeps::new(Box::new(ui.clone())),
        );
        let decoder = ChunkDecoder::new();
        for (chunk, _) in transport.script(&ChatRequest::new(message, "demo")) {
            manager.apply(decoder.decode(chunk));
        }
        (manager, ui)
    }

    #[test]
    fn test_echo_reply() {
        let (manager, _) = run(&DemoTransport::with_pace(Duration::ZERO), "hello");
        assert_eq!(manager.len(), 1);
        assert!(manager.transcript_text().starts_with("You said: hello"));
    }

    #[test]
    fn test_showcase_uses_every_builtin_renderer() {
        let (manager, ui) = run(&DemoTransport::with_pace(Duration::ZERO), "/test");

        let mut renderers: Vec<&str> = manager
            .order()
            .iter()
            .filter_map(|id| manager.handle(id))
            .map(|h| h.renderer)
            .collect();
        renderers.sort();
        renderers.dedup();
        for expected in [
            "artifact", "badge", "button", "button_group", "card", "chart", "code_block",
            "container", "dataframe", "icon_text", "log_viewer", "notification",
            "progress_bar", "progress_display", "status_card", "table", "task_list", "text",
        ] {
            assert!(renderers.contains(&expected), "showcase never rendered {}", expected);
        }
        assert!(!renderers.contains(&"fallback"));

        // The temporary indicator was removed again
        assert!(!renderers.contains(&"status_indicator"));

        let state = ui.lock().unwrap();
        assert_eq!(state.status_bar.status, BarStatus::Success);
        assert_eq!(state.tasks.tasks().len(), 3);
        assert!(state.tasks.tasks().iter().all(|t| t.status == "completed"));
        assert_eq!(
            state.chat_input.placeholder,
            "Type a message, or /test to run again..."
        );
    }

    #[test]
    fn test_action_replies_count_up() {
        let transport = DemoTransport::with_pace(Duration::ZERO);
        let (first, _) = run(&transport, "/option1");
        assert!(first.transcript_text().contains("Action #1"));
        let (second, _) = run(&transport, "/option2");
        let text = second.transcript_text();
        assert!(text.contains("Action #2"));
        assert!(text.contains("Action received: /option2"));
        assert!(text.contains("Received action: /option2"));
    }

    #[tokio::test]
    async fn test_stream_ends_after_script() {
        let transport = DemoTransport::with_pace(Duration::ZERO);
        let request = ChatRequest::new("hi", "demo");
        let items: Vec<_> = transport.connect(&request).await.unwrap().collect().await;
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].as_ref().unwrap().request_id.as_deref(),
            Some(request.request_id.as_str())
        );
    }
}
