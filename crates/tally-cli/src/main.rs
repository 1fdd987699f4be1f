mod cmd_config;
mod cmd_diagnose;
mod cmd_heartbeat;
mod cmd_ingest;
mod cmd_log;
mod cmd_migrate;
mod cmd_refresh;
mod cmd_watchdog;

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tally",
    version,
    about = "Workspace history log, status snapshots and heartbeat daemon"
)]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append a record to persistence/history.jsonl
    Log {
        /// Record type (note, decision, error, close, session_close, ...)
        #[arg(value_name = "TYPE")]
        kind: String,
        /// One-line summary
        summary: String,
        /// Details as JSON; anything else is stored as {"raw": ...}
        details: Option<String>,
    },
    /// Rebuild persistence/status.json
    Refresh,
    /// Normalize remember.json, rebuild status and record the pickup
    Ingest,
    /// Manage the background heartbeat daemon (default: --start)
    #[command(group(ArgGroup::new("action").args(["start", "stop", "run", "status"])))]
    Heartbeat {
        /// Spawn the daemon unless one is already running
        #[arg(long)]
        start: bool,
        /// Signal the running daemon to exit
        #[arg(long)]
        stop: bool,
        /// Run the heartbeat loop in the foreground
        #[arg(long)]
        run: bool,
        /// Report whether a daemon is running
        #[arg(long)]
        status: bool,
    },
    /// Glean legacy logs into history (dry run unless --apply)
    Migrate {
        /// Write history and remember.json, then delete legacy files
        #[arg(long)]
        apply: bool,
    },
    /// Run health checks over the persistence files
    Diagnose,
    /// Stay idle; stop the heartbeat daemon when terminated
    Watchdog,
    /// Manage workspace config (persistence/config.json)
    Config {
        #[command(subcommand)]
        cmd: cmd_config::ConfigCmd,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
        .ok();

    let cli = Cli::parse();
    let repo_root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    match cli.cmd {
        Command::Log {
            kind,
            summary,
            details,
        } => cmd_log::execute(&repo_root, &kind, &summary, details.as_deref()),
        Command::Refresh => cmd_refresh::execute(&repo_root),
        Command::Ingest => cmd_ingest::execute(&repo_root),
        Command::Heartbeat {
            start: _,
            stop,
            run,
            status,
        } => {
            let action = if stop {
                cmd_heartbeat::Action::Stop
            } else if run {
                cmd_heartbeat::Action::Run
            } else if status {
                cmd_heartbeat::Action::Status
            } else {
                cmd_heartbeat::Action::Start
            };
            cmd_heartbeat::execute(&repo_root, action)
        }
        Command::Migrate { apply } => cmd_migrate::execute(&repo_root, apply),
        Command::Diagnose => cmd_diagnose::execute(&repo_root),
        Command::Watchdog => cmd_watchdog::execute(&repo_root),
        Command::Config { cmd } => cmd_config::run(cmd, &repo_root),
    }
}
