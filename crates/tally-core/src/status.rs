use crate::remember::Policy;
use crate::types::HistoryRecord;
use serde::Serialize;
use serde_json::Value;

/// Counts over the remember sections plus the history size.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSummary {
    pub dos: usize,
    pub donts: usize,
    pub focus_count: usize,
    pub next_tasks_count: usize,
    pub open_questions_count: usize,
    pub lessons_count: usize,
    pub great_modules_count: usize,
    pub sop_count: usize,
    pub history_entries: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Highlights {
    pub current_focus: Vec<Value>,
    pub next_tasks: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusContext {
    pub last_6_days_entries: usize,
    pub last_session_close: Option<HistoryRecord>,
}

/// Derived view written to `persistence/status.json`. Never hand-edited.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub version: u64,
    pub updated_at: String,
    pub policy: Policy,
    pub summary: StatusSummary,
    pub highlights: Highlights,
    pub context: StatusContext,
}
