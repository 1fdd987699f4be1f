//! Optional workspace settings in `persistence/config.json`.
//!
//! Keys use dot notation (`heartbeat.min_interval_secs`). `set` stores flat
//! keys exactly as given; lookups try the flat key first, then walk nested
//! objects, so hand-written nested files work too.

use crate::atomic::write_json_atomic;
use crate::paths::TallyPaths;
use serde_json::{Map, Value};
use std::path::Path;

pub const HEARTBEAT_MIN_SECS: &str = "heartbeat.min_interval_secs";
pub const HEARTBEAT_MAX_SECS: &str = "heartbeat.max_interval_secs";
pub const STATUS_RECENT_DAYS: &str = "status.recent_days";
pub const DIAGNOSE_HEARTBEAT_MINS: &str = "diagnose.heartbeat_window_mins";
pub const DIAGNOSE_STATUS_MINS: &str = "diagnose.status_window_mins";

const DEFAULT_MIN_SECS: u64 = 60;
const DEFAULT_MAX_SECS: u64 = 180;
const MAX_RECENT_DAYS: i64 = 3650;
const MAX_WINDOW_MINS: i64 = 10_080;

/// Read config from `path`. Returns empty map if the file doesn't exist.
pub fn read_config(path: &Path) -> anyhow::Result<Map<String, Value>> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let content = std::fs::read_to_string(path)?;
    let val: Value = serde_json::from_str(&content)?;
    match val {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

pub fn write_config(path: &Path, config: &Map<String, Value>) -> anyhow::Result<()> {
    write_json_atomic(path, config)
}

/// Parse a string value into an appropriate JSON value (bool/number/string).
pub fn parse_value(s: &str) -> Value {
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(n) = s.parse::<i64>() {
                Value::Number(n.into())
            } else if let Ok(f) = s.parse::<f64>() {
                serde_json::json!(f)
            } else {
                Value::String(s.to_string())
            }
        }
    }
}

/// Look up `key` as a flat entry, then as a dotted path into nested objects.
pub fn lookup(config: &Map<String, Value>, key: &str) -> Option<Value> {
    if let Some(v) = config.get(key) {
        return Some(v.clone());
    }
    let mut parts = key.split('.');
    let mut current = config.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    Some(current.clone())
}

/// Resolved settings with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceConfig {
    pub heartbeat_min_secs: u64,
    pub heartbeat_max_secs: u64,
    pub recent_days: i64,
    pub heartbeat_window_mins: i64,
    pub status_window_mins: i64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            heartbeat_min_secs: DEFAULT_MIN_SECS,
            heartbeat_max_secs: DEFAULT_MAX_SECS,
            recent_days: 6,
            heartbeat_window_mins: 5,
            status_window_mins: 10,
        }
    }
}

impl WorkspaceConfig {
    /// Load `persistence/config.json` and apply `TALLY_HEARTBEAT_*_SECS`
    /// overrides. An unreadable file is ignored with a warning.
    pub fn load(paths: &TallyPaths) -> Self {
        let map = match read_config(&paths.config_json) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path = %paths.config_json.display(), error = %e, "ignoring unreadable config");
                Map::new()
            }
        };
        let mut cfg = Self::from_map(&map);
        if let Some(v) = env_u64("TALLY_HEARTBEAT_MIN_SECS") {
            cfg.heartbeat_min_secs = v;
        }
        if let Some(v) = env_u64("TALLY_HEARTBEAT_MAX_SECS") {
            cfg.heartbeat_max_secs = v;
        }
        cfg.sanitized()
    }

    pub fn from_map(map: &Map<String, Value>) -> Self {
        let defaults = Self::default();
        let u = |key: &str, d: u64| lookup(map, key).and_then(|v| v.as_u64()).unwrap_or(d);
        let i = |key: &str, d: i64| {
            lookup(map, key)
                .and_then(|v| v.as_i64())
                .filter(|n| *n > 0)
                .unwrap_or(d)
        };
        Self {
            heartbeat_min_secs: u(HEARTBEAT_MIN_SECS, defaults.heartbeat_min_secs),
            heartbeat_max_secs: u(HEARTBEAT_MAX_SECS, defaults.heartbeat_max_secs),
            recent_days: i(STATUS_RECENT_DAYS, defaults.recent_days),
            heartbeat_window_mins: i(DIAGNOSE_HEARTBEAT_MINS, defaults.heartbeat_window_mins),
            status_window_mins: i(DIAGNOSE_STATUS_MINS, defaults.status_window_mins),
        }
        .sanitized()
    }

    /// Fall back to the default interval when the configured range is
    /// unusable, and cap the look-back windows.
    fn sanitized(mut self) -> Self {
        self.recent_days = self.recent_days.min(MAX_RECENT_DAYS);
        self.heartbeat_window_mins = self.heartbeat_window_mins.min(MAX_WINDOW_MINS);
        self.status_window_mins = self.status_window_mins.min(MAX_WINDOW_MINS);
        if self.heartbeat_min_secs == 0 || self.heartbeat_min_secs > self.heartbeat_max_secs {
            tracing::warn!(
                min = self.heartbeat_min_secs,
                max = self.heartbeat_max_secs,
                "invalid heartbeat interval range, using defaults"
            );
            self.heartbeat_min_secs = DEFAULT_MIN_SECS;
            self.heartbeat_max_secs = DEFAULT_MAX_SECS;
        }
        self
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.trim().parse().ok()
}
