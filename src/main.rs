// chatwire - terminal client for streaming rich-component chat backends
//
// The backend answers each message with a stream of typed components
// (text, tables, charts, buttons, artifacts...) that are created, patched,
// replaced and removed by id while the response is still arriving.
//
// Architecture:
// - Transport (reqwest SSE / tokio-tungstenite WebSocket, polling fallback):
//   one request in, one ordered chunk stream out
// - Protocol: wire types and the chunk decoder
// - Manager: component identity, render order, interactive round trip
// - Render: per-type renderers producing terminal lines and controls
// - Session: one conversation, at most one streaming turn
// - TUI (ratatui): transcript, status bar, task tracker, logs, input

mod cli;
mod config;
mod logging;
mod manager;
mod protocol;
mod render;
mod replay;
mod session;
mod transport;
mod tui;
mod ui_state;

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncBufReadExt;

use cli::{Cli, Commands};
use config::Config;
use logging::{LogRing, Sink};
use manager::artifacts::BrowserOpener;
use manager::{ComponentManager, ManagerDeps};
use render::{ComponentRegistry, RenderContext};
use session::{ChatSession, SessionError};
use transport::TransportClient;
use ui_state::SharedUiState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config commands run before logging so their output stays clean
    if let Some(Commands::Config {
        show,
        path,
        reset,
        yes,
    }) = &cli.command
    {
        return cli::handle_config(&cli, *show, *path, *reset, *yes);
    }

    // Ensure config template exists (helps users discover options)
    Config::ensure_config_exists();

    let mut config = Config::from_env()?;
    cli.apply_overrides(&mut config);

    // The TUI owns the terminal: logs go to the ring buffer instead
    let interactive = cli.command.is_none() && config.enable_tui;
    let log_ring = LogRing::new();
    let sink = if interactive {
        Sink::Capture(log_ring.clone())
    } else {
        Sink::Stderr
    };
    let _log_guard = logging::init(&config.logging, sink);

    tracing::debug!("chatwire {} against {}", config::VERSION, config.base_url);

    match cli.command {
        Some(Commands::Ask { message }) => run_ask(&config, &message.join(" ")).await,
        Some(Commands::Replay { file }) => run_replay(&config, &file),
        Some(Commands::Config { .. }) => Ok(()),
        None if interactive => {
            let ui = ui_state::shared();
            let session = build_session(&config, ui.clone(), config.artifacts.open_externally)?;
            tui::run(session, ui, log_ring, &config).await
        }
        None => {
            tracing::info!("TUI disabled, reading messages from stdin");
            run_headless(&config).await
        }
    }
}

/// Wire transport, registry and manager into a session
fn build_session(config: &Config, ui: SharedUiState, launch_browser: bool) -> Result<ChatSession> {
    let transport = TransportClient::from_config(config).context("building transport")?;
    let opener = BrowserOpener::new(
        config.artifacts.output_dir.clone(),
        config.artifacts.cdn_base.clone(),
        launch_browser,
    );
    let deps = ManagerDeps::new(Box::new(ui)).with_opener(Box::new(opener));
    let manager = ComponentManager::new(
        ComponentRegistry::with_builtin(),
        RenderContext::from(&config.display),
        deps,
    );
    Ok(ChatSession::new(
        transport,
        manager,
        config.conversation_id.clone(),
    ))
}

/// Single turn, full transcript on stdout
async fn run_ask(config: &Config, message: &str) -> Result<()> {
    let mut session = build_session(config, ui_state::shared(), false)?;
    session.submit(message)?;
    let outcome = session.drain_turn().await;
    println!("{}", session.manager().transcript_text());
    outcome.context("turn failed")
}

fn run_replay(config: &Config, file: &Path) -> Result<()> {
    let reader = std::fs::File::open(file)
        .map(std::io::BufReader::new)
        .with_context(|| format!("opening {}", file.display()))?;
    let mut session = build_session(config, ui_state::shared(), false)?;
    replay::replay_into(reader, session.manager_mut())?;
    println!("{}", session.manager().transcript_text());
    Ok(())
}

/// One turn per stdin line; prints the components each turn added
async fn run_headless(config: &Config) -> Result<()> {
    let mut session = build_session(config, ui_state::shared(), false)?;
    let mut printed: HashSet<String> = HashSet::new();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading stdin")?,
            _ = tokio::signal::ctrl_c() => break,
        };
        let Some(line) = line else {
            break;
        };

        match session.submit(&line) {
            Ok(_) => {}
            Err(SessionError::EmptyMessage) => continue,
            Err(e) => return Err(e.into()),
        }
        if let Err(e) = session.drain_turn().await {
            eprintln!("error: {}", e);
        }

        for block in session.manager().transcript(None) {
            if printed.insert(block.component_id.clone()) {
                let text: Vec<String> = block.lines.iter().map(render::line_text).collect();
                println!("{}\n", text.join("\n"));
            }
        }
    }
    Ok(())
}
