// Frame layout and drawing
//
// ┌ title ─────────────────────────────────────────┐
// │ transcript                        │ tasks      │
// │ (logs pane when toggled)          │            │
// ├ input ─────────────────────────────────────────┤
// └ status bar ────────────────────────────────────┘

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};
use tracing::Level;
use unicode_width::UnicodeWidthStr;

use super::app::{App, FocusTarget, Mode};
use super::layout::Breakpoint;
use crate::render::palette;
use crate::ui_state::{BarStatus, TrackedTask, UiState};

const LOG_PANE_HEIGHT: u16 = 10;
const TABLE_FOCUS_MARK: &str = "▌ ";

pub fn draw(f: &mut Frame, app: &mut App) {
    let ui = app.ui_snapshot();
    let area = f.area();

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(area);

    draw_title(f, rows[0], app);

    let sidebar = if ui.tasks.tasks().is_empty() {
        0
    } else {
        Breakpoint::from_width(area.width).sidebar_width()
    };
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(sidebar)])
        .split(rows[1]);

    let main = if app.show_logs {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(LOG_PANE_HEIGHT)])
            .split(body[0])
    } else {
        Layout::default()
            .constraints([Constraint::Min(3)])
            .split(body[0])
    };

    draw_transcript(f, main[0], app);
    if app.show_logs {
        draw_logs(f, main[1], app);
    }
    if sidebar > 0 {
        draw_tasks(f, body[1], ui.tasks.tasks());
    }
    draw_input(f, rows[2], app, &ui);
    draw_status(f, rows[3], app, &ui);
}

fn draw_title(f: &mut Frame, area: Rect, app: &App) {
    let session = &app.session;
    let conversation: String = session.conversation_id().chars().take(8).collect();
    let mut spans = vec![
        Span::styled(" chatwire ", Style::default().fg(Color::Black).bg(palette::ACCENT)),
        Span::raw(" "),
        Span::styled(session.transport().describe(), palette::muted()),
        Span::styled(format!(" · {}", conversation), palette::muted()),
    ];
    if session.is_busy() {
        spans.push(Span::styled(
            format!("  {} streaming", app.spinner()),
            Style::default().fg(palette::ACCENT),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Flatten the transcript into lines, remembering where each block starts
fn transcript_lines(app: &App) -> (Vec<Line<'static>>, Vec<(String, usize, usize)>) {
    let control_focus = match &app.focus {
        Some(FocusTarget::Control {
            component_id,
            index,
        }) => Some((component_id.as_str(), *index)),
        _ => None,
    };
    let table_focus = match &app.focus {
        Some(FocusTarget::Table(id)) => Some(id.as_str()),
        _ => None,
    };

    let mut lines = Vec::new();
    let mut ranges = Vec::new();
    for block in app.session.manager().transcript(control_focus) {
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        let start = lines.len();
        let marked = table_focus == Some(block.component_id.as_str());
        for mut line in block.lines {
            if marked {
                line.spans
                    .insert(0, Span::styled(TABLE_FOCUS_MARK, Style::default().fg(palette::ACCENT)));
            }
            lines.push(line);
        }
        ranges.push((block.component_id, start, lines.len()));
    }
    (lines, ranges)
}

fn draw_transcript(f: &mut Frame, area: Rect, app: &mut App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(palette::muted())
        .title(" Conversation ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    if app.session.manager().is_empty() {
        let hint = Paragraph::new(vec![
            Line::default(),
            Line::from(Span::styled("Type a message and press Enter.", palette::muted())),
            Line::from(Span::styled(
                "Run with --demo and send /test to see every component.",
                palette::muted(),
            )),
        ])
        .alignment(Alignment::Center);
        f.render_widget(hint, inner);
        return;
    }

    let (lines, ranges) = transcript_lines(app);
    let viewport = inner.height as usize;
    app.scroll.update_dimensions(lines.len(), viewport);

    if app.reveal_focus {
        app.reveal_focus = false;
        let focused = app.focus.as_ref().map(|f| f.component_id().to_string());
        if let Some((_, start, end)) = ranges
            .iter()
            .find(|(id, _, _)| Some(id) == focused.as_ref())
        {
            app.scroll.reveal(*start, *end);
        }
    }

    let (start, end) = app.scroll.visible_range();
    let visible: Vec<Line> = lines[start..end].to_vec();
    f.render_widget(Paragraph::new(visible), inner);

    if app.scroll.needs_scrollbar() {
        let mut state = ScrollbarState::new(lines.len().saturating_sub(viewport))
            .position(app.scroll.offset());
        f.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut state,
        );
    }
}

fn draw_tasks(f: &mut Frame, area: Rect, tasks: &[TrackedTask]) {
    let items: Vec<ListItem> = tasks
        .iter()
        .map(|task| {
            let color = palette::variant_color(&task.status);
            let mut lines = vec![Line::from(vec![
                Span::styled(
                    format!("{} ", palette::status_icon(&task.status)),
                    Style::default().fg(color),
                ),
                Span::raw(task.title.clone()),
            ])];
            let mut meta = Vec::new();
            if let Some(progress) = task.progress {
                meta.push(format!("{:.0}%", progress.clamp(0.0, 1.0) * 100.0));
            }
            if let Some(detail) = task.detail.as_ref().or(task.description.as_ref()) {
                meta.push(detail.clone());
            }
            if !meta.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("  {}", meta.join(" · ")),
                    palette::muted(),
                )));
            }
            ListItem::new(lines)
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(palette::muted())
            .title(" Tasks "),
    );
    f.render_widget(list, area);
}

fn level_color(level: Level) -> Color {
    match level {
        Level::ERROR => palette::ERROR,
        Level::WARN => palette::WARNING,
        Level::INFO => palette::INFO,
        _ => palette::MUTED,
    }
}

fn draw_logs(f: &mut Frame, area: Rect, app: &App) {
    let height = area.height.saturating_sub(2) as usize;
    let items: Vec<ListItem> = app
        .logs
        .recent(height)
        .iter()
        .map(|entry| {
            ListItem::new(Line::from(Span::styled(
                entry.display(),
                Style::default().fg(level_color(entry.level)),
            )))
        })
        .collect();
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(palette::muted())
            .title(" Logs (Ctrl+L) "),
    );
    f.render_widget(list, area);
}

fn draw_input(f: &mut Frame, area: Rect, app: &App, ui: &UiState) {
    let input_state = &ui.chat_input;
    let (title, text, style) = match &app.mode {
        Mode::Input => {
            let style = if input_state.disabled {
                palette::dim()
            } else {
                Style::default()
            };
            if app.input.is_empty() {
                (" Message ", input_state.placeholder.clone(), palette::muted())
            } else {
                (" Message ", app.input.clone(), style)
            }
        }
        Mode::Browse => (
            " Browse ",
            "Enter activate · o open · / search · s sort · e export · Esc type".to_string(),
            palette::muted(),
        ),
        Mode::Search(id) => {
            let query = app
                .session
                .manager()
                .handle(id)
                .and_then(|h| h.table.as_ref())
                .map(|t| t.search().to_string())
                .unwrap_or_default();
            (" Search ", query, Style::default().fg(palette::ACCENT))
        }
    };

    let cursor = match &app.mode {
        Mode::Input if !input_state.disabled => Some(UnicodeWidthStr::width(app.input.as_str())),
        Mode::Search(_) => Some(UnicodeWidthStr::width(text.as_str())),
        _ => None,
    };

    let border = if matches!(app.mode, Mode::Browse) || input_state.disabled {
        palette::muted()
    } else {
        Style::default().fg(palette::ACCENT)
    };
    let paragraph = Paragraph::new(Line::from(Span::styled(text, style))).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(title),
    );
    f.render_widget(paragraph, area);

    if let Some(width) = cursor {
        let x = area.x + 1 + (width as u16).min(area.width.saturating_sub(3));
        f.set_cursor_position((x, area.y + 1));
    }
}

fn status_style(status: BarStatus) -> Style {
    let color = match status {
        BarStatus::Idle => palette::MUTED,
        BarStatus::Working => palette::ACCENT,
        BarStatus::Success => palette::SUCCESS,
        BarStatus::Warning => palette::WARNING,
        BarStatus::Error => palette::ERROR,
    };
    Style::default().fg(color)
}

fn draw_status(f: &mut Frame, area: Rect, app: &App, ui: &UiState) {
    let bar = &ui.status_bar;
    let icon = match bar.status {
        BarStatus::Working => app.spinner(),
        other => palette::status_icon(other.as_str()),
    };
    let mut left = vec![
        Span::styled(format!(" {} ", icon), status_style(bar.status)),
        Span::styled(
            bar.message.clone(),
            status_style(bar.status).add_modifier(Modifier::BOLD),
        ),
    ];
    if let Some(detail) = &bar.detail {
        left.push(Span::styled(format!(" · {}", detail), palette::muted()));
    }

    let right = match &app.toast {
        Some(toast) => Span::styled(
            format!("{} ", toast.message),
            Style::default().fg(Color::Black).bg(palette::WARNING),
        ),
        None if Breakpoint::from_width(area.width) == Breakpoint::Compact => {
            Span::styled("Tab · Ctrl+C ", palette::muted())
        }
        None => Span::styled(
            "Tab focus · PgUp/PgDn scroll · Ctrl+N new · Ctrl+L logs · Ctrl+C quit ",
            palette::muted(),
        ),
    };

    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(right.width() as u16)])
        .split(area);
    f.render_widget(Paragraph::new(Line::from(left)), halves[0]);
    f.render_widget(
        Paragraph::new(Line::from(right)).alignment(Alignment::Right),
        halves[1],
    );
}
