//! buddy - desktop companion activity detector
//!
//! Watches Claude Code transcripts and prints what the companion would react
//! to: activity state changes, connectivity, mood, flow, eureka moments and
//! flinches.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Logs: $XDG_STATE_HOME/buddy/buddy.YYYY-MM-DD.log (~/.local/state/buddy/)
//! - Config: $XDG_CONFIG_HOME/buddy/config.toml (~/.config/buddy/config.toml)

mod event_format;

use anyhow::{Context, Result};
use buddy_core::{runtime, Config};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "buddy")]
#[command(about = "Watch AI coding sessions and emit companion events")]
#[command(version)]
struct Cli {
    /// Config file to use instead of the XDG default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch transcripts and print events as they happen
    Watch {
        /// Transcript root (defaults to the configured logs path)
        #[arg(long)]
        path: Option<PathBuf>,

        /// One line of text per event instead of JSON
        #[arg(long)]
        compact: bool,

        /// Stop on its own after this many seconds
        #[arg(long, value_name = "SECS")]
        exit_after: Option<u64>,
    },
    /// Run the detectors over an existing transcript file
    Replay {
        /// Transcript file (.jsonl)
        file: PathBuf,

        /// One line of text per event instead of JSON
        #[arg(long)]
        compact: bool,
    },
    /// Show resolved paths and effective settings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    let _log_guard =
        buddy_core::logging::init(&config.logging).context("failed to initialize logging")?;

    match cli.command {
        Command::Watch {
            path,
            compact,
            exit_after,
        } => run_watch(&config, path, compact, exit_after.map(Duration::from_secs)).await,
        Command::Replay { file, compact } => run_replay(&config, &file, compact),
        Command::Config => {
            print_config(&config, cli.config.as_deref());
            Ok(())
        }
    }
}

async fn run_watch(
    config: &Config,
    path: Option<PathBuf>,
    compact: bool,
    exit_after: Option<Duration>,
) -> Result<()> {
    let root = path.unwrap_or_else(|| config.watch.resolved_logs_path());
    tracing::info!(root = %root.display(), "buddy watch starting");

    let (handle, mut events) = runtime::spawn(&root, config).context("failed to start watcher")?;
    if handle.is_watching() {
        eprintln!("Watching {} (Ctrl-C to stop)", handle.root().display());
    } else {
        eprintln!(
            "Transcript directory {} does not exist yet; waiting for it",
            handle.root().display()
        );
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let deadline = async {
        match exit_after {
            Some(after) => tokio::time::sleep(after).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let stdout = io::stdout();
    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            _ = &mut deadline => break Ok(()),
            event = events.recv() => match event {
                Some(event) => {
                    if let Err(e) = event_format::write_event(&mut stdout.lock(), &event, compact) {
                        break Err(anyhow::Error::new(e).context("failed to write event"));
                    }
                }
                None => break Ok(()),
            },
        }
    };

    let summary = handle.stop().await.context("failed to stop watcher")?;
    eprintln!();
    for line in event_format::summary_lines(&summary) {
        eprintln!("{}", line);
    }
    tracing::info!(tool_calls = summary.tool_calls, "buddy watch finished");

    result
}

fn run_replay(config: &Config, file: &Path, compact: bool) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let events = buddy_core::replay(content.lines(), config);
    tracing::info!(file = %file.display(), events = events.len(), "Replayed transcript");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for event in &events {
        event_format::write_timed_event(&mut out, event, compact)
            .context("failed to write event")?;
    }
    out.flush().context("failed to flush output")?;
    Ok(())
}

fn print_config(config: &Config, explicit: Option<&Path>) {
    let config_path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::config_path);
    let logs_path = config.watch.resolved_logs_path();

    println!(
        "Config file:     {}{}",
        config_path.display(),
        if config_path.exists() { "" } else { " (not found, using defaults)" }
    );
    println!(
        "Log files:       {}",
        buddy_core::logging::log_dir()
            .join(buddy_core::logging::log_file_pattern())
            .display()
    );
    println!(
        "Transcripts:     {}{}",
        logs_path.display(),
        if logs_path.exists() { "" } else { " (missing)" }
    );
    println!();

    let activity = &config.activity;
    println!("[activity]");
    println!("idle_timeout_secs = {}", activity.idle_timeout_secs);
    println!("connectivity_timeout_secs = {}", activity.connectivity_timeout_secs);
    let mut overrides: Vec<_> = activity.tool_states.iter().collect();
    overrides.sort();
    for (tool, state) in overrides {
        println!("tool_states.{} = {:?}", tool, state.as_str());
    }

    let mood = &config.mood;
    println!("[mood]");
    println!("threshold = {}", mood.threshold);
    println!("decay_rate = {}", mood.decay_rate);
    println!("decay_interval_ms = {}", mood.decay_interval_ms);
    println!("text_weight = {}", mood.text_weight);
    println!("error_bonus = {}", mood.error_bonus);

    let flow = &config.flow;
    println!("[flow]");
    println!("window_secs = {}", flow.window_secs);
    println!("threshold = {}", flow.threshold);
    println!("decay_secs = {}", flow.decay_secs);

    println!("[eureka]");
    println!("history_len = {}", config.eureka.history_len);

    println!("[logging]");
    println!("level = {:?}", config.logging.level);
    println!("max_files = {}", config.logging.max_files);
}
