//! Change-detection inputs and the persisted previous observation
//! (`persistence/.heartbeat-state.json`).

use anyhow::Result;
use tally_core::HeartbeatStats;
use tally_ledger::atomic::write_json_atomic;
use tally_ledger::{HistoryLog, RememberStore, TallyPaths};

pub fn collect_stats(paths: &TallyPaths) -> Result<HeartbeatStats> {
    let log = HistoryLog::open(paths);
    let history_entries = log.read_all()?.len();
    Ok(HeartbeatStats {
        history_entries,
        history_bytes: log.byte_len(),
        session_log_bytes: std::fs::metadata(&paths.session_log)
            .map(|m| m.len())
            .unwrap_or(0),
        remember_updated_at: RememberStore::open(paths).stored_updated_at(),
    })
}

/// Last persisted stats. Missing or unreadable state reads as `None`.
pub fn load_previous(paths: &TallyPaths) -> Option<HeartbeatStats> {
    let raw = std::fs::read_to_string(&paths.heartbeat_state).ok()?;
    match serde_json::from_str(&raw) {
        Ok(stats) => Some(stats),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unreadable heartbeat state");
            None
        }
    }
}

pub fn save_previous(paths: &TallyPaths, stats: &HeartbeatStats) -> Result<()> {
    write_json_atomic(&paths.heartbeat_state, stats)
}
