// TUI application state
//
// Owns the chat session plus everything that exists only on screen: the
// input line, which control or table has focus, transcript scroll, toasts.
// Key handling lives here so it can be driven from tests without a terminal.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::clipboard::{self, ExportTarget};
use super::scroll::ScrollState;
use crate::logging::LogRing;
use crate::session::{ChatSession, SessionError, TurnEvent};
use crate::ui_state::{SharedUiState, UiState};

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Something Tab can land on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusTarget {
    Control { component_id: String, index: usize },
    Table(String),
}

impl FocusTarget {
    pub fn component_id(&self) -> &str {
        match self {
            FocusTarget::Control { component_id, .. } => component_id,
            FocusTarget::Table(id) => id,
        }
    }
}

/// Where typed keys go
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Mode {
    /// Typing a message
    #[default]
    Input,
    /// Navigating focus targets
    Browse,
    /// Editing the search filter of a dataframe
    Search(String),
}

/// Auto-dismissing one-line notice
pub struct Toast {
    pub message: String,
    created_at: Instant,
    duration: Duration,
}

impl Toast {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            created_at: Instant::now(),
            duration: Duration::from_secs(3),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.duration
    }
}

pub struct App {
    pub session: ChatSession,
    pub ui: SharedUiState,
    pub logs: LogRing,

    pub input: String,
    pub mode: Mode,
    pub focus: Option<FocusTarget>,
    /// Bring the focused component on screen at the next draw
    pub reveal_focus: bool,
    pub scroll: ScrollState,

    pub show_logs: bool,
    pub toast: Option<Toast>,
    pub should_quit: bool,
    spinner_frame: usize,

    /// CSV files land here when the clipboard is unavailable
    export_dir: PathBuf,
    /// Last backend-pushed input value/focus already applied
    seen_input_revision: u64,
    seen_input_focus: bool,
}

impl App {
    pub fn new(session: ChatSession, ui: SharedUiState, logs: LogRing, show_logs: bool, export_dir: PathBuf) -> Self {
        Self {
            session,
            ui,
            logs,
            input: String::new(),
            mode: Mode::Input,
            focus: None,
            reveal_focus: false,
            scroll: ScrollState::new(),
            show_logs,
            toast: None,
            should_quit: false,
            spinner_frame: 0,
            export_dir,
            seen_input_revision: 0,
            seen_input_focus: true,
        }
    }

    /// Snapshot of the side-channel state for drawing
    pub fn ui_snapshot(&self) -> UiState {
        self.ui
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER[self.spinner_frame % SPINNER.len()]
    }

    fn notify(&mut self, message: impl Into<String>) {
        self.toast = Some(Toast::new(message));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Timers and stream events
    // ─────────────────────────────────────────────────────────────────────────

    pub fn on_tick(&mut self) {
        self.spinner_frame = self.spinner_frame.wrapping_add(1);
        if self.toast.as_ref().is_some_and(Toast::is_expired) {
            self.toast = None;
        }

        // Newly created components come into view once layout has settled,
        // unless the user is busy somewhere else in the transcript
        if self.session.manager_mut().tick_frame() && self.focus.is_none() {
            self.scroll.scroll_to_bottom();
        }

        self.sync_chat_input();
        self.drop_stale_focus();
    }

    pub fn on_turn_event(&mut self, event: TurnEvent) {
        self.session.handle_event(event);
    }

    /// Apply backend-pushed value and focus to the input line
    fn sync_chat_input(&mut self) {
        let state = self.ui_snapshot().chat_input;
        if state.value_revision != self.seen_input_revision {
            self.seen_input_revision = state.value_revision;
            if let Some(value) = state.value {
                self.input = value;
            }
        }
        if state.focused != self.seen_input_focus {
            self.seen_input_focus = state.focused;
            if state.focused {
                self.mode = Mode::Input;
                self.focus = None;
            }
        }
    }

    /// Controls disabled by a click or components removed lose focus
    fn drop_stale_focus(&mut self) {
        if let Some(focus) = &self.focus {
            if !self.focus_targets().contains(focus) {
                self.focus = None;
                if let Mode::Search(_) = self.mode {
                    self.mode = Mode::Browse;
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Focus
    // ─────────────────────────────────────────────────────────────────────────

    /// Focus targets in draw order: a dataframe first, then its controls
    pub fn focus_targets(&self) -> Vec<FocusTarget> {
        let manager = self.session.manager();
        let mut targets = Vec::new();
        for id in manager.visible_ids() {
            let Some(handle) = manager.handle(&id) else {
                continue;
            };
            if handle.table.is_some() {
                targets.push(FocusTarget::Table(id.clone()));
            }
            for index in handle.enabled_controls() {
                targets.push(FocusTarget::Control {
                    component_id: id.clone(),
                    index,
                });
            }
        }
        targets
    }

    fn move_focus(&mut self, forward: bool) {
        let targets = self.focus_targets();
        if targets.is_empty() {
            self.notify("Nothing to focus");
            return;
        }
        let current = self
            .focus
            .as_ref()
            .and_then(|f| targets.iter().position(|t| t == f));
        let next = match (current, forward) {
            (Some(i), true) => (i + 1) % targets.len(),
            (Some(i), false) => (i + targets.len() - 1) % targets.len(),
            (None, true) => 0,
            (None, false) => targets.len() - 1,
        };
        self.focus = Some(targets[next].clone());
        self.mode = Mode::Browse;
        self.reveal_focus = true;
    }

    fn focused_table_id(&self) -> Option<String> {
        match &self.focus {
            Some(FocusTarget::Table(id)) => Some(id.clone()),
            _ => None,
        }
    }

    fn leave_browse(&mut self) {
        self.focus = None;
        self.mode = Mode::Input;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Keys
    // ─────────────────────────────────────────────────────────────────────────

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Char('c') if ctrl => {
                self.should_quit = true;
                return;
            }
            KeyCode::Char('l') if ctrl => {
                self.show_logs = !self.show_logs;
                return;
            }
            KeyCode::Char('n') if ctrl => {
                self.session.reset();
                self.leave_browse();
                self.scroll.scroll_to_bottom();
                self.notify("New conversation");
                return;
            }
            KeyCode::PageUp => {
                self.scroll.page_up();
                return;
            }
            KeyCode::PageDown => {
                self.scroll.page_down();
                return;
            }
            KeyCode::Tab if !matches!(self.mode, Mode::Search(_)) => {
                self.move_focus(true);
                return;
            }
            KeyCode::BackTab if !matches!(self.mode, Mode::Search(_)) => {
                self.move_focus(false);
                return;
            }
            _ => {}
        }

        match self.mode.clone() {
            Mode::Input => self.handle_input_key(key.code),
            Mode::Browse => self.handle_browse_key(key.code),
            Mode::Search(table_id) => self.handle_search_key(&table_id, key.code),
        }
    }

    fn handle_input_key(&mut self, code: KeyCode) {
        let disabled = self.ui_snapshot().chat_input.disabled;
        match code {
            KeyCode::Enter => self.submit_input(),
            KeyCode::Char(c) if !disabled => self.input.push(c),
            KeyCode::Backspace if !disabled => {
                self.input.pop();
            }
            KeyCode::Esc => self.input.clear(),
            KeyCode::Up => self.scroll.scroll_up(1),
            KeyCode::Down => self.scroll.scroll_down(1),
            _ => {}
        }
    }

    fn handle_browse_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc | KeyCode::Char('i') => self.leave_browse(),
            KeyCode::Enter => self.activate_focus(),
            KeyCode::Char('o') => self.reopen_focused(),
            KeyCode::Char('/') => self.start_search(),
            KeyCode::Char('s') => self.cycle_sort(),
            KeyCode::Char(c @ '1'..='9') => {
                let column = c as usize - '1' as usize;
                self.sort_by(column);
            }
            KeyCode::Char('e') => self.export_focused(),
            KeyCode::Up | KeyCode::Char('k') => self.scroll.scroll_up(1),
            KeyCode::Down | KeyCode::Char('j') => self.scroll.scroll_down(1),
            KeyCode::Char('g') => self.scroll.scroll_to_top(),
            KeyCode::Char('G') => self.scroll.scroll_to_bottom(),
            _ => {}
        }
    }

    fn handle_search_key(&mut self, table_id: &str, code: KeyCode) {
        let Some(table) = self.session.manager_mut().table_mut(table_id) else {
            self.mode = Mode::Browse;
            return;
        };
        let mut query = table.search().to_string();
        match code {
            KeyCode::Enter => {
                self.mode = Mode::Browse;
                return;
            }
            KeyCode::Esc => {
                table.set_search("");
                self.mode = Mode::Browse;
                return;
            }
            KeyCode::Backspace => {
                query.pop();
            }
            KeyCode::Char(c) => query.push(c),
            _ => return,
        }
        table.set_search(&query);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Actions
    // ─────────────────────────────────────────────────────────────────────────

    fn submit_input(&mut self) {
        if self.ui_snapshot().chat_input.disabled {
            self.notify("Input is disabled by the backend");
            return;
        }
        match self.session.submit(&self.input) {
            Ok(_) => {
                self.input.clear();
                self.scroll.scroll_to_bottom();
            }
            Err(SessionError::EmptyMessage) => {}
            Err(SessionError::TurnInFlight) => self.notify("Still receiving the last response"),
            Err(e) => self.notify(e.to_string()),
        }
    }

    fn activate_focus(&mut self) {
        match self.focus.clone() {
            Some(FocusTarget::Control {
                component_id,
                index,
            }) => match self.session.dispatch_action(&component_id, index) {
                Ok(()) => {}
                Err(SessionError::TurnInFlight) => {
                    self.notify("Still receiving the last response")
                }
                Err(e) => self.notify(e.to_string()),
            },
            Some(FocusTarget::Table(_)) => {
                self.notify("/ search · s or 1-9 sort · e export")
            }
            None => {}
        }
    }

    fn reopen_focused(&mut self) {
        let Some(id) = self.focus.as_ref().map(|f| f.component_id().to_string()) else {
            return;
        };
        if self.session.manager_mut().reopen_artifact(&id) {
            self.notify("Artifact opened");
        } else {
            self.notify("Not an artifact");
        }
    }

    fn start_search(&mut self) {
        let Some(id) = self.focused_table_id() else {
            return;
        };
        let searchable = self
            .session
            .manager_mut()
            .table_mut(&id)
            .map(|table| table.searchable);
        match searchable {
            Some(true) => self.mode = Mode::Search(id),
            Some(false) => self.notify("Search is disabled for this table"),
            None => {}
        }
    }

    fn sort_by(&mut self, column: usize) {
        let Some(id) = self.focused_table_id() else {
            return;
        };
        let sortable = self.session.manager_mut().table_mut(&id).map(|table| {
            table.toggle_sort(column);
            table.sortable
        });
        if sortable == Some(false) {
            self.notify("Sorting is disabled for this table");
        }
    }

    /// Sort by the column after the current sort key
    fn cycle_sort(&mut self) {
        let Some(id) = self.focused_table_id() else {
            return;
        };
        let Some(table) = self.session.manager_mut().table_mut(&id) else {
            return;
        };
        let current = table
            .sort_state()
            .and_then(|(key, _)| table.columns().iter().position(|c| c.key == key));
        let next = match current {
            Some(i) if i + 1 < table.columns().len() => i + 1,
            _ => 0,
        };
        self.sort_by(next);
    }

    fn export_focused(&mut self) {
        let Some(id) = self.focused_table_id() else {
            return;
        };
        let exported = self
            .session
            .manager_mut()
            .table_mut(&id)
            .map(|table| table.exportable.then(|| table.to_csv()));
        let csv = match exported {
            Some(Some(csv)) => csv,
            Some(None) => {
                self.notify("Export is disabled for this table");
                return;
            }
            None => return,
        };
        let message = match clipboard::export_csv(&csv, &self.export_dir, &id) {
            Ok(ExportTarget::Clipboard) => "CSV copied to clipboard".to_string(),
            Ok(ExportTarget::File(path)) => format!("CSV written to {}", path.display()),
            Err(e) => {
                tracing::warn!("CSV export failed: {}", e);
                format!("Export failed: {}", e)
            }
        };
        self.notify(message);
    }
}
