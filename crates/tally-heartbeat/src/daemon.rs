//! The heartbeat loop run by `tally heartbeat --run`.
//!
//! Unattended, so it favors survival: only the termination flag ends it.
//! Everything else inside an iteration is logged and the loop moves on.

use anyhow::Result;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tally_core::record::{new_heartbeat_record, new_heartbeat_stop_record};
use tally_core::{HeartbeatStats, StatusSnapshot};
use tally_ledger::{DaemonLock, HistoryLog, TallyPaths, WorkspaceConfig};

use crate::stats::{collect_stats, load_previous, save_previous};

const SLEEP_SLICE: Duration = Duration::from_secs(1);

/// Shared flag set by SIGTERM, SIGINT or SIGHUP.
pub fn install_termination_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })?;
    Ok(flag)
}

/// Rebuild the status snapshot, logging and swallowing any failure.
///
/// This is the only place a refresh error is allowed to disappear.
pub fn refresh_best_effort(paths: &TallyPaths, cfg: &WorkspaceConfig) -> Option<StatusSnapshot> {
    match tally_derive::refresh_with(paths, cfg) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "status refresh failed; continuing");
            None
        }
    }
}

/// Result of one heartbeat.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub seq: u64,
    pub changed: bool,
    pub stats: HeartbeatStats,
}

pub struct HeartbeatLoop {
    paths: TallyPaths,
    cfg: WorkspaceConfig,
    seq: u64,
}

impl HeartbeatLoop {
    pub fn new(paths: TallyPaths, cfg: WorkspaceConfig) -> Self {
        Self { paths, cfg, seq: 0 }
    }

    /// Sample stats, append a `heartbeat` record and persist the sample as
    /// the previous observation.
    ///
    /// The sample predates the appended line, so the next tick always sees
    /// the log grow and the snapshot is rebuilt on every wake.
    pub fn tick(&mut self, interval_sec: u64) -> Result<TickOutcome> {
        let stats = collect_stats(&self.paths)?;
        let previous = load_previous(&self.paths);
        let changed = stats.differs_from(previous.as_ref());

        self.seq += 1;
        let log = HistoryLog::open(&self.paths);
        log.append(&new_heartbeat_record(
            self.seq,
            interval_sec,
            changed,
            stats.clone(),
        ))?;
        save_previous(&self.paths, &stats)?;

        Ok(TickOutcome {
            seq: self.seq,
            changed,
            stats,
        })
    }

    /// One full iteration: tick, then refresh when something moved.
    pub fn beat(&mut self, interval_sec: u64) {
        match self.tick(interval_sec) {
            Ok(outcome) => {
                tracing::info!(seq = outcome.seq, changed = outcome.changed, "heartbeat");
                if outcome.changed {
                    refresh_best_effort(&self.paths, &self.cfg);
                }
            }
            Err(e) => tracing::warn!(error = %format!("{e:#}"), "heartbeat failed; continuing"),
        }
    }

    fn next_interval(&self) -> u64 {
        rand::thread_rng().gen_range(self.cfg.heartbeat_min_secs..=self.cfg.heartbeat_max_secs)
    }

    /// Run until `stop` is set. Holds `heartbeat.lock` and owns the pid file
    /// for the duration.
    pub fn run(mut self, stop: &AtomicBool) -> Result<()> {
        let _lock = DaemonLock::acquire(&self.paths)?;
        let pid = std::process::id();
        std::fs::write(&self.paths.heartbeat_pid, pid.to_string())?;
        tracing::info!(
            pid,
            min = self.cfg.heartbeat_min_secs,
            max = self.cfg.heartbeat_max_secs,
            "heartbeat daemon running"
        );

        loop {
            let interval = self.next_interval();
            if sleep_unless_stopped(Duration::from_secs(interval), stop) {
                break;
            }
            self.beat(interval);
        }

        if let Err(e) = HistoryLog::open(&self.paths).append(&new_heartbeat_stop_record("signal")) {
            tracing::warn!(error = %e, "could not record heartbeat stop");
        }
        self.release_pid_file(pid);
        tracing::info!(pid, "heartbeat daemon exiting");
        Ok(())
    }

    /// Remove the pid file only if it still names this process.
    fn release_pid_file(&self, pid: u32) {
        let owned = std::fs::read_to_string(&self.paths.heartbeat_pid)
            .ok()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            == Some(pid);
        if owned {
            let _ = std::fs::remove_file(&self.paths.heartbeat_pid);
        }
    }
}

/// Sleep in short slices. Returns true as soon as `stop` is observed.
fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) -> bool {
    let mut remaining = total;
    while !remaining.is_zero() {
        if stop.load(Ordering::SeqCst) {
            return true;
        }
        let step = remaining.min(SLEEP_SLICE);
        std::thread::sleep(step);
        remaining -= step;
    }
    stop.load(Ordering::SeqCst)
}
