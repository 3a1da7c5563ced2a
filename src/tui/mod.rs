// TUI module - Terminal User Interface
//
// Sets up the terminal, then runs one loop that waits on whichever comes
// first: a key press, a frame tick, or the next event of the streaming turn.
// All state changes happen on this task, one event at a time.

pub mod app;
pub mod clipboard;
pub mod layout;
pub mod scroll;
pub mod ui;

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::config::Config;
use crate::logging::LogRing;
use crate::session::ChatSession;
use crate::ui_state::SharedUiState;
use app::App;

/// Frame tick; drives spinners, toasts and deferred scrolling
const TICK: Duration = Duration::from_millis(100);

/// Run the TUI until the user quits
pub async fn run(session: ChatSession, ui: SharedUiState, logs: LogRing, config: &Config) -> Result<()> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to setup terminal")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let mut app = App::new(
        session,
        ui,
        logs,
        config.display.show_logs,
        config.artifacts.output_dir.clone(),
    );
    tracing::info!("Connected to {} via {}", config.base_url, app.session.transport().describe());

    let result = run_event_loop(&mut terminal, &mut app).await;

    // Restore the terminal even when the loop failed
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to restore terminal")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    result
}

/// Wait briefly for terminal input without holding any app state
async fn next_terminal_event() -> Option<Event> {
    match event::poll(Duration::from_millis(10)) {
        Ok(true) => event::read().ok(),
        _ => {
            tokio::task::yield_now().await;
            None
        }
    }
}

async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    let mut tick = tokio::time::interval(TICK);

    loop {
        terminal
            .draw(|f| ui::draw(f, app))
            .context("Failed to draw terminal")?;

        let busy = app.session.is_busy();
        tokio::select! {
            Some(turn_event) = app.session.next_event(), if busy => {
                app.on_turn_event(turn_event);
            }

            _ = tick.tick() => app.on_tick(),

            Some(event) = next_terminal_event() => {
                if let Event::Key(key) = event {
                    app.handle_key(key);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
