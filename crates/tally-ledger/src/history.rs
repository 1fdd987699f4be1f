use crate::atomic::write_atomic;
use crate::paths::TallyPaths;
use std::io::Write;
use std::path::{Path, PathBuf};
use tally_core::{HistoryRecord, TallyError};

/// The append-only history log backed by `persistence/history.jsonl`.
///
/// There is no cross-process lock: each append is one `write` of one line,
/// and readers skip anything that does not parse.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn open(paths: &TallyPaths) -> Self {
        Self::at(&paths.history_jsonl)
    }

    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line, creating parent directories.
    pub fn append(&self, record: &HistoryRecord) -> Result<(), TallyError> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| TallyError::parse("history record", e.to_string()))?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TallyError::io(parent, e))?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| TallyError::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| TallyError::io(&self.path, e))?;
        Ok(())
    }

    /// Read every parseable record in file order. A missing file is empty.
    pub fn read_all(&self) -> Result<Vec<HistoryRecord>, TallyError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TallyError::io(&self.path, e)),
        };
        Ok(parse_jsonl(&String::from_utf8_lossy(&bytes)))
    }

    /// Replace the whole log with `records` (temp file + rename).
    pub fn rewrite(&self, records: &[HistoryRecord]) -> anyhow::Result<()> {
        let data = stringify_jsonl(records)?;
        write_atomic(&self.path, data.as_bytes())
    }

    /// Append `records` after the existing bytes in one atomic replace.
    ///
    /// Existing lines are copied byte for byte, including any that do not
    /// parse. A missing final newline is supplied before the new lines.
    pub fn append_all(&self, records: &[HistoryRecord]) -> anyhow::Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut data = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(TallyError::io(&self.path, e).into()),
        };
        if data.last().is_some_and(|b| *b != b'\n') {
            data.push(b'\n');
        }
        data.extend_from_slice(stringify_jsonl(records)?.as_bytes());
        write_atomic(&self.path, &data)
    }

    /// Size of the log in bytes, 0 when absent.
    pub fn byte_len(&self) -> u64 {
        file_len(&self.path)
    }
}

pub(crate) fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Parse newline-delimited JSON, skipping blank and malformed lines.
pub fn parse_jsonl(raw: &str) -> Vec<HistoryRecord> {
    let mut records = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<HistoryRecord>(line) {
            Ok(rec) => records.push(rec),
            Err(e) => tracing::debug!(line = idx + 1, error = %e, "skipping malformed history line"),
        }
    }
    records
}

/// One JSON object per line; trailing newline iff non-empty.
pub fn stringify_jsonl(records: &[HistoryRecord]) -> anyhow::Result<String> {
    let mut out = String::new();
    for rec in records {
        out.push_str(&serde_json::to_string(rec)?);
        out.push('\n');
    }
    Ok(out)
}
