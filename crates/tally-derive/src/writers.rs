use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tally_core::record::new_startup_ingest_record;
use tally_core::{HistoryRecord, RememberDoc, StatusSnapshot};
use tally_ledger::atomic::write_json_atomic;
use tally_ledger::{session_log, HistoryLog, RememberStore, TallyPaths, WorkspaceConfig};
use time::OffsetDateTime;

use crate::snapshot::build_status;

/// Rebuild `status.json` from the remember document and history log.
///
/// Read-only apart from the snapshot file: nothing is appended to history
/// and `remember.json` is left as found.
pub fn refresh(paths: &TallyPaths) -> Result<StatusSnapshot> {
    refresh_with(paths, &WorkspaceConfig::load(paths))
}

pub fn refresh_with(paths: &TallyPaths, cfg: &WorkspaceConfig) -> Result<StatusSnapshot> {
    let remember = RememberStore::open(paths).load()?;
    write_snapshot(paths, &remember, cfg)
}

fn write_snapshot(
    paths: &TallyPaths,
    remember: &RememberDoc,
    cfg: &WorkspaceConfig,
) -> Result<StatusSnapshot> {
    let history = HistoryLog::open(paths).read_all()?;
    let snapshot = build_status(
        remember,
        &history,
        OffsetDateTime::now_utc(),
        cfg.recent_days,
    );
    write_json_atomic(&paths.status_json, &snapshot)
        .with_context(|| format!("writing {}", paths.status_json.display()))?;
    tracing::debug!(
        entries = snapshot.summary.history_entries,
        "status snapshot written"
    );
    Ok(snapshot)
}

/// What a startup ingest produced.
#[derive(Debug)]
pub struct IngestReport {
    pub snapshot: StatusSnapshot,
    pub record: HistoryRecord,
    pub session_line: String,
}

/// Startup ingest: save the normalized remember document, rebuild the
/// snapshot, then record the pickup in history and the session log.
pub fn ingest(paths: &TallyPaths) -> Result<IngestReport> {
    paths.ensure_layout()?;
    let cfg = WorkspaceConfig::load(paths);

    let store = RememberStore::open(paths);
    let remember = store.load()?;
    store.save(&remember)?;

    let snapshot = write_snapshot(paths, &remember, &cfg)?;
    let ctx = &snapshot.context;

    let mut details = Map::new();
    details.insert(
        "focus".to_string(),
        Value::Array(snapshot.highlights.current_focus.clone()),
    );
    details.insert(
        "next".to_string(),
        Value::Array(snapshot.highlights.next_tasks.clone()),
    );
    details.insert("context".to_string(), serde_json::to_value(ctx)?);

    let summary = format!(
        "remember.json ingested; dos={}, donts={}, next={}",
        snapshot.summary.dos, snapshot.summary.donts, snapshot.summary.next_tasks_count
    );
    let record = new_startup_ingest_record(&summary, details);
    HistoryLog::open(paths).append(&record)?;

    let picked_up_after = ctx
        .last_session_close
        .as_ref()
        .map(|r| r.ts.as_str())
        .filter(|ts| !ts.is_empty())
        .unwrap_or("n/a");
    let session_line = format!(
        "- Startup: ingested remember.json; last_6_days={}; picked up after: {}",
        ctx.last_6_days_entries, picked_up_after
    );
    session_log::append_block(paths, std::slice::from_ref(&session_line))?;

    tracing::info!(entries = snapshot.summary.history_entries, "startup ingest complete");
    Ok(IngestReport {
        snapshot,
        record,
        session_line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_workspace;
    use tally_core::record::{new_logged_record, new_note_record};

    fn status_json(paths: &TallyPaths) -> Value {
        serde_json::from_str(&std::fs::read_to_string(&paths.status_json).unwrap()).unwrap()
    }

    #[test]
    fn refresh_empty_then_one_note() {
        let (_tmp, paths) = setup_workspace();

        refresh(&paths).unwrap();
        let status = status_json(&paths);
        assert_eq!(status["summary"]["history_entries"], 0);
        assert!(status["context"]["last_session_close"].is_null());

        let note = new_logged_record("note", "x", None).unwrap();
        HistoryLog::open(&paths).append(&note).unwrap();

        refresh(&paths).unwrap();
        let status = status_json(&paths);
        assert_eq!(status["summary"]["history_entries"], 1);
        assert_eq!(status["context"]["last_6_days_entries"], 1);
        assert_eq!(
            status["context"]["last_session_close"],
            serde_json::to_value(&note).unwrap()
        );
    }

    #[test]
    fn refresh_leaves_history_and_remember_alone() {
        let (_tmp, paths) = setup_workspace();
        HistoryLog::open(&paths)
            .append(&new_note_record("a", None))
            .unwrap();
        let history_before = std::fs::read(&paths.history_jsonl).unwrap();

        refresh(&paths).unwrap();
        refresh(&paths).unwrap();

        assert_eq!(std::fs::read(&paths.history_jsonl).unwrap(), history_before);
        assert_eq!(std::fs::read_to_string(&paths.remember_json).unwrap(), "{}");
    }

    #[test]
    fn refresh_without_remember_fails() {
        let (_tmp, paths) = setup_workspace();
        std::fs::remove_file(&paths.remember_json).unwrap();
        let err = refresh(&paths).unwrap_err();
        let tally = err.downcast_ref::<tally_core::TallyError>().unwrap();
        assert!(tally.is_config_missing());
        assert!(!paths.status_json.exists());
    }

    #[test]
    fn ingest_records_pickup() {
        let (_tmp, paths) = setup_workspace();
        std::fs::write(
            &paths.remember_json,
            r#"{"sections":{"dos":["a"],"instructions":{"next_tasks":["n1","n2"]}}}"#,
        )
        .unwrap();
        let close = new_logged_record("session_close", "wrapped up", None).unwrap();
        HistoryLog::open(&paths).append(&close).unwrap();

        let report = ingest(&paths).unwrap();
        assert_eq!(
            report.record.summary_or_empty(),
            "remember.json ingested; dos=1, donts=0, next=2"
        );
        assert_eq!(
            report.session_line,
            format!(
                "- Startup: ingested remember.json; last_6_days=1; picked up after: {}",
                close.ts
            )
        );

        let history = HistoryLog::open(&paths).read_all().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].kind(), "startup_ingest");
        let details = history[1].payload.details_value().unwrap();
        assert_eq!(details["next"], serde_json::json!(["n1", "n2"]));
        assert_eq!(details["context"]["last_6_days_entries"], 1);

        // normalized form is saved back
        let saved: Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.remember_json).unwrap()).unwrap();
        assert_eq!(saved["owner"], "workspace");
        assert_eq!(saved["sections"]["dos"], serde_json::json!(["a"]));

        let log = std::fs::read_to_string(&paths.session_log).unwrap();
        assert!(log.contains(&report.session_line));
        assert!(paths.archive_dir.is_dir());
    }

    #[test]
    fn ingest_on_empty_history_says_na() {
        let (_tmp, paths) = setup_workspace();
        let report = ingest(&paths).unwrap();
        assert!(report.session_line.ends_with("last_6_days=0; picked up after: n/a"));
    }
}
