use std::path::{Path, PathBuf};

/// All well-known paths under a workspace root.
#[derive(Debug, Clone)]
pub struct TallyPaths {
    pub root: PathBuf,
    pub persist_dir: PathBuf,
    pub history_jsonl: PathBuf,
    pub remember_json: PathBuf,
    pub status_json: PathBuf,
    pub config_json: PathBuf,
    pub heartbeat_pid: PathBuf,
    pub heartbeat_state: PathBuf,
    pub heartbeat_lock: PathBuf,
    pub heartbeat_log: PathBuf,
    pub archive_dir: PathBuf,
    pub docs_dir: PathBuf,
    pub session_log: PathBuf,
    pub legacy_log: PathBuf,
    pub legacy_archive_dir: PathBuf,
    pub legacy_summary: PathBuf,
    pub legacy_agents_guide: PathBuf,
}

impl TallyPaths {
    /// Derive all paths from a workspace root. Pure computation, no I/O.
    pub fn discover(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let persist_dir = root.join("persistence");
        let docs_dir = root.join("docs");
        Self {
            history_jsonl: persist_dir.join("history.jsonl"),
            remember_json: persist_dir.join("remember.json"),
            status_json: persist_dir.join("status.json"),
            config_json: persist_dir.join("config.json"),
            heartbeat_pid: persist_dir.join("heartbeat.pid"),
            heartbeat_state: persist_dir.join(".heartbeat-state.json"),
            heartbeat_lock: persist_dir.join("heartbeat.lock"),
            heartbeat_log: persist_dir.join("heartbeat.log"),
            archive_dir: persist_dir.join("archive"),
            session_log: docs_dir.join("session-log.md"),
            legacy_log: docs_dir.join("codex-log.md"),
            legacy_archive_dir: docs_dir.join("codex-archive"),
            legacy_summary: root.join("CODEX.LOG.MD"),
            legacy_agents_guide: root.join("AGENTS.md"),
            persist_dir,
            docs_dir,
            root,
        }
    }

    /// Create `persistence/` and `persistence/archive/`. Idempotent.
    pub fn ensure_layout(&self) -> anyhow::Result<()> {
        for dir in [&self.persist_dir, &self.archive_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Render `path` relative to the workspace root, with forward slashes.
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}
