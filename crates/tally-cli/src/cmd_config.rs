use clap::Subcommand;
use std::path::Path;
use tally_ledger::config::{lookup, parse_value, read_config, write_config};
use tally_ledger::{TallyPaths, WorkspaceConfig};

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Set a config value
    Set {
        /// Config key (e.g. heartbeat.min_interval_secs)
        key: String,
        /// Config value (true/false/number/string)
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List {
        /// Also print the effective settings after defaults and overrides
        #[arg(long)]
        effective: bool,
    },
}

// ── Dispatch ──

pub fn run(cmd: ConfigCmd, repo_root: &Path) -> anyhow::Result<()> {
    match cmd {
        ConfigCmd::Set { key, value } => set(repo_root, &key, &value),
        ConfigCmd::Get { key } => get(repo_root, &key),
        ConfigCmd::List { effective } => list(repo_root, effective),
    }
}

// ── Command Implementations ──

fn require_workspace(repo_root: &Path) -> anyhow::Result<TallyPaths> {
    let paths = TallyPaths::discover(repo_root);
    if !paths.persist_dir.is_dir() {
        anyhow::bail!("No persistence/ directory found. Run `tally ingest` first.");
    }
    Ok(paths)
}

/// `tally config set <key> <value>`
pub fn set(repo_root: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let paths = require_workspace(repo_root)?;
    let mut config = read_config(&paths.config_json)?;
    config.insert(key.to_string(), parse_value(value));
    write_config(&paths.config_json, &config)?;
    println!("{key} = {value}");
    Ok(())
}

/// `tally config get <key>`
pub fn get(repo_root: &Path, key: &str) -> anyhow::Result<()> {
    let paths = require_workspace(repo_root)?;
    let config = read_config(&paths.config_json)?;
    match lookup(&config, key) {
        Some(val) => println!("{val}"),
        None => println!("(not set)"),
    }
    Ok(())
}

/// `tally config list`
pub fn list(repo_root: &Path, effective: bool) -> anyhow::Result<()> {
    let paths = require_workspace(repo_root)?;
    let config = read_config(&paths.config_json)?;
    if config.is_empty() {
        println!("(no config set)");
    } else {
        for (k, v) in &config {
            println!("{k} = {v}");
        }
    }
    if effective {
        let cfg = WorkspaceConfig::load(&paths);
        println!();
        println!(
            "heartbeat interval: {}..={}s",
            cfg.heartbeat_min_secs, cfg.heartbeat_max_secs
        );
        println!("status recent window: {} day(s)", cfg.recent_days);
        println!(
            "diagnose windows: heartbeat {}m, status {}m",
            cfg.heartbeat_window_mins, cfg.status_window_mins
        );
    }
    Ok(())
}
