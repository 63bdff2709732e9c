//! CLI Entry Point for daq_monitor
//!
//! Provides a command-line interface for:
//! - Replaying a recorded stream of database changes through a text monitor
//! - Inspecting a saved monitor state
//!
//! # Usage
//!
//! Replay a recording (one JSON event per line) and save the resulting state:
//! ```bash
//! daq_monitor --config config/monitor.toml replay run.jsonl --save-state monitor.toml
//! ```
//!
//! Apply a saved display configuration to the replayed entries:
//! ```bash
//! daq_monitor replay run.jsonl --load-state monitor.toml
//! ```
//!
//! Recording lines are either database changes or value updates:
//! ```text
//! {"kind": "added", "path": "root/T", "value": 3.0}
//! {"kind": "removed", "path": "root/T"}
//! {"path": "root/T", "value": 3.5}
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use daq_monitor::config::MonitorConfig;
use daq_monitor::database::{DatabaseNews, DatabaseValue};
use daq_monitor::monitor::driver::{drive, MonitorEvent};
use daq_monitor::monitor::section::Section;
use daq_monitor::monitor::state::{decode_paths, load_state, save_state};
use daq_monitor::{tracing_setup, TextMonitor};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::info;

#[derive(Parser)]
#[command(name = "daq_monitor")]
#[command(about = "Text monitor for measurement database streams", long_about = None)]
struct Cli {
    /// Monitor configuration file
    #[arg(long, global = true, default_value = "config/monitor.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines recording through a monitor
    Replay {
        /// Path to the recording
        recording: PathBuf,

        /// Apply this saved display configuration to the replayed entries
        #[arg(long)]
        load_state: Option<PathBuf>,

        /// Save the final state to this file (defaults to the configured state file)
        #[arg(long)]
        save_state: Option<PathBuf>,
    },

    /// Print the sections stored in a saved state
    ShowState {
        /// Saved state file
        state: PathBuf,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordedLine {
    News(DatabaseNews),
    Value { path: String, value: DatabaseValue },
}

impl From<RecordedLine> for MonitorEvent {
    fn from(line: RecordedLine) -> Self {
        match line {
            RecordedLine::News(news) => MonitorEvent::Database(news),
            RecordedLine::Value { path, value } => MonitorEvent::Value { path, value },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = MonitorConfig::load_from(&cli.config)?;
    config.validate()?;
    tracing_setup::init_from_config(&config)?;

    match cli.command {
        Commands::Replay {
            recording,
            load_state,
            save_state,
        } => {
            let save_to = save_state.or_else(|| config.monitor.state_file.clone());
            replay(&config, &recording, load_state.as_deref(), save_to.as_deref()).await
        }
        Commands::ShowState { state } => show_state(&state),
    }
}

async fn replay(
    config: &MonitorConfig,
    recording: &Path,
    load_from: Option<&Path>,
    save_to: Option<&Path>,
) -> Result<()> {
    let mut monitor = TextMonitor::from_config(config)?;

    let content = tokio::fs::read_to_string(recording)
        .await
        .with_context(|| format!("reading recording {}", recording.display()))?;
    let mut events = Vec::new();
    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line: RecordedLine = serde_json::from_str(line)
            .with_context(|| format!("{}:{}", recording.display(), number + 1))?;
        events.push(MonitorEvent::from(line));
    }

    let (tx, rx) = mpsc::channel(events.len().max(1));
    for event in events {
        tx.send(event).await?;
    }
    drop(tx);
    let handled = drive(&mut monitor, rx).await;
    info!(handled, "recording replayed");

    if let Some(path) = load_from {
        let state = load_state(path)
            .with_context(|| format!("reading monitor state {}", path.display()))?;
        let values = monitor.store().known_values().clone();
        monitor.import_state(&state, values)?;
        info!(path = %path.display(), "monitor state applied");
    }

    for (name, value) in monitor.displayed_values() {
        println!("{name}: {value}");
    }

    if let Some(path) = save_to {
        save_state(path, &monitor.export_state()?)?;
        info!(path = %path.display(), "monitor state saved");
    }
    Ok(())
}

fn show_state(path: &Path) -> Result<()> {
    let state = load_state(path)?;
    for section in Section::ALL {
        let paths = match state.get(section.as_str()) {
            Some(text) => decode_paths(text)?,
            None => Vec::new(),
        };
        println!("{section}:");
        for path in paths {
            println!("  {path}");
        }
    }
    Ok(())
}
