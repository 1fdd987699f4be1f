//! Human-readable session log (`docs/session-log.md`).
//!
//! Append-only Markdown: each block is a `### <timestamp>` heading followed
//! by bullet lines.

use crate::paths::TallyPaths;
use std::io::Write;
use tally_core::clock::now_rfc3339;

/// Append a block stamped with the current time.
pub fn append_block(paths: &TallyPaths, lines: &[String]) -> anyhow::Result<()> {
    std::fs::create_dir_all(&paths.docs_dir)?;
    let mut block = format!("### {}\n", now_rfc3339());
    for line in lines {
        block.push_str(line);
        block.push('\n');
    }
    block.push('\n');

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.session_log)?;
    file.write_all(block.as_bytes())?;
    Ok(())
}

/// Whether the log contains at least one `### ` heading.
pub fn has_heading(content: &str) -> bool {
    content
        .lines()
        .any(|l| l.starts_with("###") && l.len() > 3 && l[3..].starts_with(char::is_whitespace))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_writes_heading_and_bullets() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = TallyPaths::discover(tmp.path());
        append_block(&paths, &["- Startup: ok".to_string()]).unwrap();
        append_block(&paths, &["- second".to_string()]).unwrap();

        let content = std::fs::read_to_string(&paths.session_log).unwrap();
        assert_eq!(content.matches("### ").count(), 2);
        assert!(content.contains("- Startup: ok\n"));
        assert!(has_heading(&content));
    }

    #[test]
    fn heading_detection() {
        assert!(has_heading("intro\n### 2026-01-01T00:00:00Z\n- x\n"));
        assert!(!has_heading("## not deep enough\n####nospace\n"));
        assert!(!has_heading(""));
    }
}
