//! Pattern-based extraction of records from free-text legacy logs.
//!
//! This is best effort, not a parser: the note-block scan and the heuristic
//! rules were written against one family of hand-kept logs and will under- or
//! over-glean on anything else.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};
use tally_core::clock::{format_rfc3339, parse_loose};
use tally_core::record::{new_decision_record, new_legacy_note_record};
use tally_core::{HistoryRecord, LegacyNoteDetails};

/// Lines scanned after a marker, the marker line included.
pub const NOTE_WINDOW: usize = 80;
/// Max characters of block text kept as the record summary.
pub const SUMMARY_CHARS: usize = 160;

static NOTE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^===== CODEx NOTE @\s+(.+?)\s+=====").unwrap());

static BLOCK_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^=====\s").unwrap());

/// A fixed pattern-to-record mapping, evaluated against a whole source text.
pub struct HeuristicRule {
    pub pattern: Regex,
    pub summary: &'static str,
    pub details: fn() -> Value,
}

/// Ordered heuristic rules. Each one fires at most once per source.
static HEURISTICS: LazyLock<Vec<HeuristicRule>> = LazyLock::new(|| {
    vec![
        HeuristicRule {
            pattern: Regex::new(r"(?i)close-order:\s*disabled").unwrap(),
            summary: "HTML rule close-order disabled initially to reduce noise",
            details: || json!({"tool": "html-validate", "rule": "close-order", "value": "off"}),
        },
        HeuristicRule {
            pattern: Regex::new(r"(?i)memory system updated").unwrap(),
            summary: "Legacy memory system replaced by new persistence",
            details: || json!({"from": "codex", "to": "persistence/*"}),
        },
    ]
});

/// One legacy file's text and where it came from.
#[derive(Debug, Clone)]
pub struct LegacySource {
    /// Workspace-relative path, used as the note's `source_file`.
    pub rel_path: String,
    pub text: String,
}

/// Scan for note blocks and emit one `legacy_note` per marker.
///
/// A marker whose timestamp cannot be read is skipped along with its block.
pub fn glean_notes(source: &LegacySource) -> Vec<HistoryRecord> {
    let lines: Vec<&str> = source.text.lines().collect();
    let mut out = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let Some(caps) = NOTE_MARKER.captures(line) else {
            continue;
        };
        let marker = caps[1].to_string();
        let Some(at) = parse_loose(&marker) else {
            tracing::debug!(file = %source.rel_path, line = i + 1, %marker, "skipping note with unreadable timestamp");
            continue;
        };

        let end = (i + NOTE_WINDOW).min(lines.len());
        let mut block = Vec::new();
        for next in &lines[i + 1..end] {
            if BLOCK_BOUNDARY.is_match(next) {
                break;
            }
            block.push(*next);
        }
        let text = block.join("\n");
        let text = text.trim();
        let summary: String = text.chars().take(SUMMARY_CHARS).collect();

        out.push(new_legacy_note_record(
            format_rfc3339(at),
            &summary,
            LegacyNoteDetails {
                source: "codex-note".to_string(),
                source_file: Some(source.rel_path.clone()),
                marker: Some(marker),
                length: text.chars().count(),
            },
        ));
    }
    out
}

/// Evaluate every heuristic rule against the full text.
pub fn glean_heuristics(text: &str) -> Vec<HistoryRecord> {
    HEURISTICS
        .iter()
        .filter(|rule| rule.pattern.is_match(text))
        .map(|rule| {
            let details: Option<Map<String, Value>> = match (rule.details)() {
                Value::Object(map) => Some(map),
                _ => None,
            };
            new_decision_record(rule.summary, details)
        })
        .collect()
}

/// Notes first, then heuristic decisions.
pub fn glean(source: &LegacySource) -> Vec<HistoryRecord> {
    let mut out = glean_notes(source);
    out.extend(glean_heuristics(&source.text));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::Payload;

    fn src(text: &str) -> LegacySource {
        LegacySource {
            rel_path: "docs/codex-log.md".to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn note_blocks_split_at_next_marker() {
        let text = "\
preamble
===== CODEx NOTE @ 2025-08-14T09:15:00Z =====
Fixed the flyout menu.
Left menu still flickers.
===== CODEx NOTE @ 2025-08-15 10:00:00 =====
Accordion done.
";
        let notes = glean_notes(&src(text));
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].ts, "2025-08-14T09:15:00Z");
        assert_eq!(
            notes[0].summary.as_deref(),
            Some("Fixed the flyout menu.\nLeft menu still flickers.")
        );
        assert_eq!(notes[1].ts, "2025-08-15T10:00:00Z");
        match &notes[1].payload {
            Payload::LegacyNote(d) => {
                assert_eq!(d.source, "codex-note");
                assert_eq!(d.source_file.as_deref(), Some("docs/codex-log.md"));
                assert_eq!(d.marker.as_deref(), Some("2025-08-15 10:00:00"));
                assert_eq!(d.length, "Accordion done.".len());
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn block_is_capped_by_window() {
        let mut text = String::from("===== CODEx NOTE @ 2025-01-01 =====\n");
        for i in 0..200 {
            text.push_str(&format!("line {i}\n"));
        }
        let notes = glean_notes(&src(&text));
        assert_eq!(notes.len(), 1);
        match &notes[0].payload {
            Payload::LegacyNote(d) => {
                let expected: usize = (0..NOTE_WINDOW - 1)
                    .map(|i| format!("line {i}").len())
                    .sum::<usize>()
                    + (NOTE_WINDOW - 2);
                assert_eq!(d.length, expected);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn summary_truncated_to_limit() {
        let body = "x".repeat(500);
        let text = format!("===== CODEx NOTE @ 2025-01-01 =====\n{body}\n");
        let notes = glean_notes(&src(&text));
        assert_eq!(notes[0].summary.as_ref().unwrap().chars().count(), SUMMARY_CHARS);
    }

    #[test]
    fn unreadable_marker_is_skipped() {
        let text = "===== CODEx NOTE @ sometime yesterday =====\nbody\n";
        assert!(glean_notes(&src(text)).is_empty());
    }

    #[test]
    fn heuristics_fire_independently() {
        let text = "settings: Close-Order: disabled\n... Memory System Updated today";
        let decisions = glean_heuristics(text);
        assert_eq!(decisions.len(), 2);
        assert!(decisions.iter().all(|d| d.kind() == "decision"));
        assert_eq!(
            decisions[0].payload.details_value().unwrap()["rule"],
            "close-order"
        );
        assert!(glean_heuristics("nothing relevant").is_empty());
    }

    #[test]
    fn glean_combines_notes_and_heuristics() {
        let text = "===== CODEx NOTE @ 2025-01-01 =====\nclose-order: disabled\n";
        let all = glean(&src(text));
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind(), "legacy_note");
        assert_eq!(all[1].kind(), "decision");
    }
}
