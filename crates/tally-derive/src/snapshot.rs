use serde_json::Value;
use tally_core::clock::{format_rfc3339, parse_loose};
use tally_core::status::{Highlights, StatusContext, StatusSummary};
use tally_core::{HistoryRecord, RememberDoc, StatusSnapshot};
use time::OffsetDateTime;

/// Max items copied into each highlights list.
pub const HIGHLIGHT_LIMIT: usize = 3;

fn head(items: &[Value]) -> Vec<Value> {
    items.iter().take(HIGHLIGHT_LIMIT).cloned().collect()
}

/// Most recent session close; falls back to the newest record of any kind.
pub fn last_session_close(history: &[HistoryRecord]) -> Option<&HistoryRecord> {
    history
        .iter()
        .rev()
        .find(|r| r.is_session_close())
        .or_else(|| history.last())
}

/// Records stamped no earlier than `days` before `now`. Unreadable
/// timestamps are not counted; a cutoff before the representable range
/// counts every readable one.
pub fn count_recent(history: &[HistoryRecord], now: OffsetDateTime, days: i64) -> usize {
    let cutoff = now.checked_sub(time::Duration::days(days));
    history
        .iter()
        .filter_map(|r| parse_loose(&r.ts))
        .filter(|at| cutoff.map_or(true, |c| *at >= c))
        .count()
}

/// Derive the status snapshot. Pure: the only time input is `now`.
pub fn build_status(
    remember: &RememberDoc,
    history: &[HistoryRecord],
    now: OffsetDateTime,
    recent_days: i64,
) -> StatusSnapshot {
    let s = &remember.sections;
    let ins = &s.instructions;

    StatusSnapshot {
        version: remember.version,
        updated_at: format_rfc3339(now),
        policy: remember.policy.clone(),
        summary: StatusSummary {
            dos: s.dos.len(),
            donts: s.donts.len(),
            focus_count: ins.current_focus.len(),
            next_tasks_count: ins.next_tasks.len(),
            open_questions_count: ins.open_questions.len(),
            lessons_count: s.lessons_learned.len(),
            great_modules_count: s.great_modules.len(),
            sop_count: s.sop.len(),
            history_entries: history.len(),
        },
        highlights: Highlights {
            current_focus: head(&ins.current_focus),
            next_tasks: head(&ins.next_tasks),
        },
        context: StatusContext {
            last_6_days_entries: count_recent(history, now, recent_days),
            last_session_close: last_session_close(history).cloned(),
        },
    }
}
