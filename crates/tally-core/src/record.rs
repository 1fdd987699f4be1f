use crate::clock::now_rfc3339;
use crate::error::TallyError;
use crate::types::{
    Details, HeartbeatDetails, HeartbeatStats, HistoryRecord, LegacyNoteDetails, Payload,
    StopDetails,
};
use serde_json::{Map, Value};

fn record(ts: String, summary: &str, payload: Payload) -> HistoryRecord {
    HistoryRecord {
        ts,
        summary: Some(summary.to_string()),
        payload,
        extra: Map::new(),
    }
}

/// Create a record of any kind from operator input.
///
/// Fails when `summary` is blank. `details` is decoded against the kind's
/// typed shape the same way a line read back from disk would be.
pub fn new_logged_record(
    kind: &str,
    summary: &str,
    details: Option<Value>,
) -> Result<HistoryRecord, TallyError> {
    if summary.trim().is_empty() {
        return Err(TallyError::parse("record", "summary must not be empty"));
    }
    Ok(record(
        now_rfc3339(),
        summary,
        Payload::decode(kind.to_string(), details),
    ))
}

/// Parse a details argument given on the command line.
///
/// Objects pass through, other JSON is wrapped as `{"value": ..}`, and text
/// that is not JSON at all becomes `{"raw": ..}`.
pub fn parse_details_arg(arg: &str) -> Value {
    match serde_json::from_str::<Value>(arg) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(other) => serde_json::json!({ "value": other }),
        Err(_) => serde_json::json!({ "raw": arg }),
    }
}

pub fn new_note_record(summary: &str, details: Option<Details>) -> HistoryRecord {
    record(now_rfc3339(), summary, Payload::Note(details))
}

pub fn new_decision_record(summary: &str, details: Option<Details>) -> HistoryRecord {
    record(now_rfc3339(), summary, Payload::Decision(details))
}

pub fn new_heartbeat_record(
    seq: u64,
    interval_sec: u64,
    changed_since_last: bool,
    stats: HeartbeatStats,
) -> HistoryRecord {
    record(
        now_rfc3339(),
        &format!("heartbeat #{seq}"),
        Payload::Heartbeat(HeartbeatDetails {
            seq,
            interval_sec,
            changed_since_last,
            stats,
        }),
    )
}

pub fn new_heartbeat_stop_record(reason: &str) -> HistoryRecord {
    record(
        now_rfc3339(),
        "daemon exiting",
        Payload::HeartbeatStop(StopDetails {
            reason: reason.to_string(),
        }),
    )
}

pub fn new_startup_ingest_record(summary: &str, details: Details) -> HistoryRecord {
    record(now_rfc3339(), summary, Payload::StartupIngest(Some(details)))
}

/// A note gleaned from a legacy log; `ts` is the marker's own timestamp.
pub fn new_legacy_note_record(
    ts: String,
    summary: &str,
    details: LegacyNoteDetails,
) -> HistoryRecord {
    record(ts, summary, Payload::LegacyNote(details))
}

pub fn new_diagnose_record(source: &str) -> HistoryRecord {
    let mut details = Map::new();
    details.insert("source".to_string(), Value::from(source));
    record(
        now_rfc3339(),
        "diagnostic write test",
        Payload::Diagnose(Some(details)),
    )
}
