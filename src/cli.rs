// CLI module - command-line argument parsing and the config subcommand
//
// `chatwire` with no subcommand opens the TUI. `ask` and `replay` run
// headless and print plain text; `config` inspects or resets the config file.

use crate::config::{Config, TransportKind, VERSION};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

/// Terminal client for streaming rich-component chat backends
#[derive(Parser, Debug)]
#[command(name = "chatwire")]
#[command(version = VERSION)]
#[command(about = "Terminal client for streaming rich-component chat backends", long_about = None)]
pub struct Cli {
    /// Backend base URL (overrides CHATWIRE_URL and the config file)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Primary transport: sse or websocket
    #[arg(long, global = true)]
    pub transport: Option<String>,

    /// Use the built-in scripted backend instead of a server
    #[arg(long, global = true)]
    pub demo: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one message, wait for the full response, print the transcript
    Ask {
        /// Message text (joined with spaces)
        #[arg(required = true)]
        message: Vec<String>,
    },

    /// Feed a captured JSONL chunk stream through the renderer and print it
    Replay {
        /// One chunk JSON object per line
        file: PathBuf,
    },

    /// Manage configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,

        /// Reset config file to defaults
        #[arg(long)]
        reset: bool,

        /// Skip the overwrite prompt for --reset
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

impl Cli {
    /// Command-line flags beat env and file
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(kind) = &self.transport {
            config.transport.primary = TransportKind::from_str(kind);
        }
        if self.demo {
            config.demo_mode = true;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// config subcommand
// ─────────────────────────────────────────────────────────────────────────────

pub fn handle_config(cli: &Cli, show: bool, path: bool, reset: bool, yes: bool) -> Result<()> {
    if path {
        let path = Config::config_path().context("could not determine config path")?;
        println!("{}", path.display());
    } else if show {
        let mut config = Config::from_env()?;
        cli.apply_overrides(&mut config);
        print!("{}", render_show(&config));
    } else if reset {
        reset_config(yes)?;
    } else {
        println!("Usage: chatwire config [--show|--path|--reset]");
        println!();
        println!("Options:");
        println!("  --show    Display effective configuration");
        println!("  --path    Show config file path");
        println!("  --reset   Reset config file to defaults");
    }
    Ok(())
}

/// Effective configuration as TOML, with its source noted
fn render_show(config: &Config) -> String {
    let source = match Config::config_path() {
        Some(path) if path.exists() => format!("# Source: {}", path.display()),
        _ => "# Source: defaults (no config file)".to_string(),
    };
    format!(
        "# Effective configuration (flags > env > file > defaults)\n{}\n\n{}",
        source,
        config.to_toml()
    )
}

fn reset_config(yes: bool) -> Result<()> {
    let path = Config::config_path().context("could not determine config path")?;

    if path.exists() && !yes {
        eprint!(
            "Config file exists at {}. Overwrite? [y/N] ",
            path.display()
        );
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .context("reading confirmation")?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    Config::default().write_to(&path)?;
    println!("Config reset to defaults: {}", path.display());
    Ok(())
}
