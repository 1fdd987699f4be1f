//! One-shot migration of hand-kept legacy logs into the history log.
//!
//! Reads `docs/codex-log.md`, `CODEX.LOG.MD` and `docs/codex-archive/*.md`,
//! gleans records from them, merges those into `history.jsonl`, records a
//! lesson in the remember document, and finally removes the legacy files.
//! Dry run unless `apply` is set.

use crate::glean::{glean, LegacySource};
use crate::history::HistoryLog;
use crate::paths::TallyPaths;
use crate::remember::RememberStore;
use serde_json::json;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tally_core::{HistoryRecord, Payload};

/// Options controlling migration behavior.
#[derive(Debug, Clone, Default)]
pub struct MigrateOptions {
    /// Write history and remember, then delete legacy files.
    pub apply: bool,
}

/// Summary of a completed (or dry-run) migration.
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub applied: bool,
    pub sources_read: usize,
    pub gleaned: usize,
    pub duplicates_skipped: usize,
    pub history_before: usize,
    pub history_after: usize,
    pub lesson_added: bool,
    /// Workspace-relative legacy paths that were (or would be) removed.
    pub removed: Vec<String>,
}

/// Stable identity of a gleaned record, used to skip re-imports.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DedupKey {
    Note { source_file: String, marker: String },
    Decision(String),
}

fn dedup_key(record: &HistoryRecord) -> Option<DedupKey> {
    match &record.payload {
        Payload::LegacyNote(d) => Some(DedupKey::Note {
            source_file: d.source_file.clone()?,
            marker: d.marker.clone()?,
        }),
        Payload::Decision(_) => Some(DedupKey::Decision(record.summary_or_empty().to_string())),
        _ => None,
    }
}

/// Legacy text sources in scan order. Missing or unreadable files are skipped.
pub fn collect_sources(paths: &TallyPaths) -> Vec<LegacySource> {
    let mut files: Vec<PathBuf> = vec![paths.legacy_log.clone(), paths.legacy_summary.clone()];
    if let Ok(entries) = std::fs::read_dir(&paths.legacy_archive_dir) {
        let mut archived: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "md"))
            .collect();
        archived.sort();
        files.extend(archived);
    }

    files
        .into_iter()
        .filter(|p| p.is_file())
        .filter_map(|p| match std::fs::read(&p) {
            Ok(bytes) => Some(LegacySource {
                rel_path: paths.relative(&p),
                text: String::from_utf8_lossy(&bytes).into_owned(),
            }),
            Err(e) => {
                tracing::warn!(path = %p.display(), error = %e, "skipping unreadable legacy source");
                None
            }
        })
        .collect()
}

/// Legacy paths that exist and are slated for removal.
fn removal_targets(paths: &TallyPaths) -> Vec<&Path> {
    [
        paths.legacy_log.as_path(),
        paths.legacy_archive_dir.as_path(),
        paths.legacy_summary.as_path(),
        paths.legacy_agents_guide.as_path(),
    ]
    .into_iter()
    .filter(|p| p.exists())
    .collect()
}

/// Run the migration.
///
/// Fails with `ConfigMissing` when the remember document is absent or
/// invalid. On apply, gleaned records are appended after the existing log
/// bytes, and a failed history write aborts before the remember document is
/// touched or anything is deleted.
pub fn migrate_legacy(paths: &TallyPaths, opts: &MigrateOptions) -> anyhow::Result<MigrationReport> {
    let log = HistoryLog::open(paths);
    migrate_legacy_with(paths, opts, |gleaned| log.append_all(gleaned))
}

fn migrate_legacy_with<F>(
    paths: &TallyPaths,
    opts: &MigrateOptions,
    write_history: F,
) -> anyhow::Result<MigrationReport>
where
    F: FnOnce(&[HistoryRecord]) -> anyhow::Result<()>,
{
    let remember = RememberStore::open(paths);
    let mut doc = remember.load()?;

    let log = HistoryLog::open(paths);
    let history = log.read_all()?;

    let mut seen: HashSet<DedupKey> = history.iter().filter_map(dedup_key).collect();
    let sources = collect_sources(paths);

    let mut gleaned = Vec::new();
    let mut duplicates_skipped = 0;
    for source in &sources {
        for record in glean(source) {
            if let Some(key) = dedup_key(&record) {
                if !seen.insert(key) {
                    duplicates_skipped += 1;
                    continue;
                }
            }
            gleaned.push(record);
        }
    }

    let lesson_added = doc.add_lesson_once(json!({
        "title": "Legacy logs migrated",
        "notes": "CODEx logs gleaned; new persistence established.",
        "tags": ["process", "migration"],
    }));

    let targets = removal_targets(paths);
    let mut report = MigrationReport {
        applied: opts.apply,
        sources_read: sources.len(),
        gleaned: gleaned.len(),
        duplicates_skipped,
        history_before: history.len(),
        history_after: history.len() + gleaned.len(),
        lesson_added,
        removed: targets.iter().map(|p| paths.relative(p)).collect(),
    };

    if !opts.apply {
        return Ok(report);
    }

    write_history(&gleaned)?;

    let doc = tally_core::normalize(&doc.to_value());
    remember.save(&doc)?;

    report.removed.clear();
    for target in targets {
        let result = if target.is_dir() {
            std::fs::remove_dir_all(target)
        } else {
            std::fs::remove_file(target)
        };
        match result {
            Ok(()) => report.removed.push(paths.relative(target)),
            Err(e) => tracing::warn!(path = %target.display(), error = %e, "could not remove legacy path"),
        }
    }

    tracing::info!(
        gleaned = report.gleaned,
        skipped = report.duplicates_skipped,
        removed = report.removed.len(),
        "legacy migration applied"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::record::new_note_record;
    use tally_core::TallyError;

    const LOG: &str = "\
===== CODEx NOTE @ 2025-08-14T09:15:00Z =====
Navigation flyout fixed.
close-order: disabled for now
===== CODEx NOTE @ 2025-08-15 10:00:00 =====
Memory system updated to the new layout.
";

    fn seeded() -> (tempfile::TempDir, TallyPaths) {
        let tmp = tempfile::tempdir().unwrap();
        let paths = TallyPaths::discover(tmp.path());
        paths.ensure_layout().unwrap();
        std::fs::write(&paths.remember_json, r#"{"sections":{"dos":["ship"]}}"#).unwrap();
        std::fs::create_dir_all(&paths.legacy_archive_dir).unwrap();
        std::fs::write(&paths.legacy_log, LOG).unwrap();
        std::fs::write(
            paths.legacy_archive_dir.join("2025-07.md"),
            "===== CODEx NOTE @ 2025-07-01 =====\nOlder note.\n",
        )
        .unwrap();
        std::fs::write(paths.legacy_archive_dir.join("ignore.txt"), "x").unwrap();
        std::fs::write(&paths.legacy_agents_guide, "# agents\n").unwrap();
        HistoryLog::open(&paths)
            .append(&new_note_record("existing", None))
            .unwrap();
        (tmp, paths)
    }

    fn snapshot(paths: &TallyPaths) -> (Vec<u8>, Vec<u8>) {
        (
            std::fs::read(&paths.history_jsonl).unwrap(),
            std::fs::read(&paths.remember_json).unwrap(),
        )
    }

    #[test]
    fn dry_run_writes_nothing() {
        let (_tmp, paths) = seeded();
        let before = snapshot(&paths);

        let report = migrate_legacy(&paths, &MigrateOptions::default()).unwrap();
        assert!(!report.applied);
        assert_eq!(report.sources_read, 2);
        // three notes plus two heuristic decisions
        assert_eq!(report.gleaned, 5);
        assert_eq!((report.history_before, report.history_after), (1, 6));
        assert!(report.lesson_added);
        assert_eq!(
            report.removed,
            vec!["docs/codex-log.md", "docs/codex-archive", "AGENTS.md"]
        );

        assert_eq!(snapshot(&paths), before);
        assert!(paths.legacy_log.exists());
        assert!(paths.legacy_agents_guide.exists());
    }

    #[test]
    fn apply_merges_and_removes_legacy() {
        let (_tmp, paths) = seeded();
        let report = migrate_legacy(&paths, &MigrateOptions { apply: true }).unwrap();
        assert_eq!(report.gleaned, 5);
        assert_eq!(report.removed.len(), 3);

        let history = HistoryLog::open(&paths).read_all().unwrap();
        assert_eq!(history.len(), 6);
        assert_eq!(history[0].summary_or_empty(), "existing");
        assert_eq!(history[1].ts, "2025-08-14T09:15:00Z");
        assert_eq!(history.iter().filter(|r| r.kind() == "legacy_note").count(), 3);

        let doc = RememberStore::open(&paths).load().unwrap();
        assert_eq!(doc.sections.dos.len(), 1);
        assert_eq!(doc.sections.lessons_learned.len(), 1);

        assert!(!paths.legacy_log.exists());
        assert!(!paths.legacy_archive_dir.exists());
        assert!(!paths.legacy_agents_guide.exists());
    }

    #[test]
    fn rerun_skips_already_imported() {
        let (_tmp, paths) = seeded();
        migrate_legacy(&paths, &MigrateOptions { apply: true }).unwrap();

        // same legacy content shows up again
        std::fs::write(&paths.legacy_log, LOG).unwrap();
        let report = migrate_legacy(&paths, &MigrateOptions { apply: true }).unwrap();
        assert_eq!(report.gleaned, 0);
        assert_eq!(report.duplicates_skipped, 4);
        assert!(!report.lesson_added);

        let history = HistoryLog::open(&paths).read_all().unwrap();
        assert_eq!(history.len(), 6);
        let doc = RememberStore::open(&paths).load().unwrap();
        assert_eq!(doc.sections.lessons_learned.len(), 1);
    }

    #[test]
    fn heuristic_matched_in_two_sources_is_collapsed() {
        let (_tmp, paths) = seeded();
        std::fs::write(&paths.legacy_summary, "close-order: disabled\n").unwrap();
        let report = migrate_legacy(&paths, &MigrateOptions::default()).unwrap();
        assert_eq!(report.sources_read, 3);
        assert_eq!(report.gleaned, 5);
        assert_eq!(report.duplicates_skipped, 1);
    }

    #[test]
    fn apply_keeps_existing_history_bytes() {
        let (_tmp, paths) = seeded();
        let odd = concat!(
            "{\"ts\":\"2026-01-01T00:00:00Z\",\"timestamp\":\"2026-01-01 00:00:00\",\"type\":\"note\",\"summary\":\"both stamps\"}\n",
            "{\"ts\":\"2026-01-01T00:01:00Z\",\"type\":\"heartbeat\",\"summary\":\"heartbeat #1\",\"details\":{\"seq\":1,\"interval_sec\":60,\"changed_since_last\":true,\"host\":\"box\",\"stats\":{}}}\n",
        );
        let mut f = std::fs::OpenOptions::new()
            .append(true)
            .open(&paths.history_jsonl)
            .unwrap();
        std::io::Write::write_all(&mut f, odd.as_bytes()).unwrap();
        drop(f);
        let before = std::fs::read_to_string(&paths.history_jsonl).unwrap();

        migrate_legacy(&paths, &MigrateOptions { apply: true }).unwrap();

        let after = std::fs::read_to_string(&paths.history_jsonl).unwrap();
        assert!(after.starts_with(&before));
        assert_eq!(after.lines().count(), before.lines().count() + 5);
    }

    #[test]
    fn failed_history_write_touches_nothing_else() {
        let (_tmp, paths) = seeded();
        let (history_before, remember_before) = snapshot(&paths);

        let err = migrate_legacy_with(&paths, &MigrateOptions { apply: true }, |_| {
            anyhow::bail!("disk full")
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "disk full");

        assert_eq!(snapshot(&paths), (history_before, remember_before));
        assert!(paths.legacy_log.exists());
        assert!(paths.legacy_archive_dir.exists());
        assert!(paths.legacy_agents_guide.exists());
    }

    #[test]
    fn unreadable_history_aborts_before_any_change() {
        let (_tmp, paths) = seeded();
        let remember_before = std::fs::read(&paths.remember_json).unwrap();
        std::fs::remove_file(&paths.history_jsonl).unwrap();
        std::fs::create_dir(&paths.history_jsonl).unwrap();

        assert!(migrate_legacy(&paths, &MigrateOptions { apply: true }).is_err());
        assert_eq!(std::fs::read(&paths.remember_json).unwrap(), remember_before);
        assert!(paths.legacy_log.exists());
        assert!(paths.legacy_agents_guide.exists());
    }

    #[test]
    fn missing_remember_is_config_missing() {
        let (_tmp, paths) = seeded();
        std::fs::remove_file(&paths.remember_json).unwrap();
        let before = std::fs::read(&paths.history_jsonl).unwrap();

        let err = migrate_legacy(&paths, &MigrateOptions { apply: true }).unwrap_err();
        let tally = err.downcast_ref::<TallyError>().unwrap();
        assert!(tally.is_config_missing());
        assert_eq!(std::fs::read(&paths.history_jsonl).unwrap(), before);
        assert!(paths.legacy_log.exists());
    }
}
