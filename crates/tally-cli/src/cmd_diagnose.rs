use serde_json::Value;
use std::path::Path;
use tally_core::clock::within;
use tally_core::record::new_diagnose_record;
use tally_heartbeat::{ProcessTable, SystemProcesses};
use tally_ledger::session_log::has_heading;
use tally_ledger::{HistoryLog, TallyPaths, WorkspaceConfig};
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone)]
pub struct Check {
    pub outcome: Outcome,
    pub message: String,
    /// Whether a warning counts toward the final tally.
    pub counted: bool,
}

impl Check {
    fn line(&self) -> String {
        let tag = match self.outcome {
            Outcome::Pass => "PASS",
            Outcome::Warn => "WARN",
            Outcome::Fail => "FAIL",
        };
        format!("{tag}  {}", self.message)
    }
}

#[derive(Debug, Default)]
pub struct Diagnosis {
    pub checks: Vec<Check>,
}

impl Diagnosis {
    fn push(&mut self, outcome: Outcome, message: impl Into<String>) {
        self.checks.push(Check {
            outcome,
            message: message.into(),
            counted: true,
        });
    }

    fn pass(&mut self, message: impl Into<String>) {
        self.push(Outcome::Pass, message);
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.push(Outcome::Warn, message);
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.push(Outcome::Fail, message);
    }

    pub fn failures(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.outcome == Outcome::Fail)
            .count()
    }

    pub fn warnings(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.outcome == Outcome::Warn && c.counted)
            .count()
    }

    pub fn result_line(&self) -> String {
        if self.failures() == 0 {
            format!("DIAGNOSE RESULT: PASS with {} warning(s)", self.warnings())
        } else {
            format!(
                "DIAGNOSE RESULT: FAIL — {} failure(s), {} warning(s)",
                self.failures(),
                self.warnings()
            )
        }
    }
}

fn read_json(path: &Path) -> Option<Value> {
    serde_json::from_str(&std::fs::read_to_string(path).ok()?).ok()
}

/// Run every check. Checks are independent; none aborts the rest.
pub fn run_checks<P: ProcessTable>(
    paths: &TallyPaths,
    cfg: &WorkspaceConfig,
    processes: &P,
    now: OffsetDateTime,
) -> Diagnosis {
    let mut d = Diagnosis::default();

    d.pass(format!("tally v{}", env!("CARGO_PKG_VERSION")));

    for (path, name) in [
        (&paths.remember_json, "persistence/remember.json"),
        (&paths.history_jsonl, "persistence/history.jsonl"),
        (&paths.status_json, "persistence/status.json"),
    ] {
        if path.is_file() {
            d.pass(format!("{name} exists"));
        } else {
            d.fail(format!("{name} missing"));
        }
    }

    let mut hb_running = false;
    match std::fs::read_to_string(&paths.heartbeat_pid) {
        Ok(raw) => match raw.trim().parse::<u32>() {
            Ok(pid) if processes.is_alive(pid) => {
                d.pass(format!("heartbeat running (pid {pid})"));
                hb_running = true;
            }
            _ => d.warn("heartbeat pid file present but process not running"),
        },
        Err(_) => d.warn("heartbeat not running (no pid file)"),
    }

    let log = HistoryLog::open(paths);
    let history = log.read_all().unwrap_or_default();
    let last_heartbeat = history.iter().rev().find(|r| r.kind() == "heartbeat");
    let hb_window = cfg.heartbeat_window_mins;
    match last_heartbeat {
        Some(hb) if within(&hb.ts, Duration::minutes(hb_window), now) => {
            d.pass(format!("recent heartbeat entry within {hb_window} minutes"));
        }
        other => {
            let msg = match other {
                Some(hb) => format!("stale heartbeat (last at {})", hb.ts),
                None => "no heartbeat entry found yet".to_string(),
            };
            if hb_running {
                d.warn(msg);
            } else {
                d.warn(format!(
                    "{msg}; start heartbeat to enable continuous logging"
                ));
            }
        }
    }

    let before = log.byte_len();
    match log.append(&new_diagnose_record("tally diagnose")) {
        Ok(()) if log.byte_len() > before => d.pass("able to append to history.jsonl"),
        Ok(()) => d.fail("failed to grow history.jsonl after append"),
        Err(e) => d.fail(format!("append to history.jsonl failed: {e}")),
    }

    let status_window = cfg.status_window_mins;
    match read_json(&paths.status_json) {
        Some(status) => {
            let updated_at = status
                .get("updated_at")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            if within(updated_at, Duration::minutes(status_window), now) {
                d.pass(format!("status.json updated within {status_window} minutes"));
            } else {
                d.warn(format!("status.json is older than {status_window} minutes"));
            }
            let count = status
                .pointer("/summary/history_entries")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            if count >= 1 {
                d.pass(format!("status summary shows history_entries={count}"));
            } else {
                d.warn("status summary shows zero history_entries");
            }
        }
        None => d.fail("status.json unreadable"),
    }

    match std::fs::read_to_string(&paths.session_log) {
        Ok(text) if has_heading(&text) => d.pass("session-log.md present"),
        Ok(_) => d.warn("session-log.md present but no headings found"),
        Err(_) => d.warn("docs/session-log.md not found"),
    }

    if paths.archive_dir.is_dir() {
        d.pass("archive directory exists");
    } else {
        d.checks.push(Check {
            outcome: Outcome::Warn,
            message: "archive directory not present yet (ok if fresh)".to_string(),
            counted: false,
        });
    }

    d
}

/// `tally diagnose`. Exits 1 when any check fails.
pub fn execute(repo_root: &Path) -> anyhow::Result<()> {
    let paths = TallyPaths::discover(repo_root);
    let cfg = WorkspaceConfig::load(&paths);
    let diagnosis = run_checks(&paths, &cfg, &SystemProcesses, OffsetDateTime::now_utc());

    for check in &diagnosis.checks {
        println!("{}", check.line());
    }
    println!();
    println!("{}", diagnosis.result_line());

    if diagnosis.failures() > 0 {
        std::process::exit(1);
    }
    Ok(())
}
