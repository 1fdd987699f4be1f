use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque key-value payload carried by untyped record kinds.
pub type Details = Map<String, Value>;

/// Well-known values of the `type` discriminant.
pub mod kind {
    pub const NOTE: &str = "note";
    pub const DECISION: &str = "decision";
    pub const ERROR: &str = "error";
    pub const CLOSE: &str = "close";
    pub const SESSION_CLOSE: &str = "session_close";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const HEARTBEAT_STOP: &str = "heartbeat_stop";
    pub const STARTUP_INGEST: &str = "startup_ingest";
    pub const LEGACY_NOTE: &str = "legacy_note";
    pub const DIAGNOSE: &str = "diagnose";
}

/// Stats sampled by the heartbeat daemon on every wake.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatStats {
    #[serde(default)]
    pub history_entries: usize,
    #[serde(default)]
    pub history_bytes: u64,
    #[serde(default)]
    pub session_log_bytes: u64,
    #[serde(default)]
    pub remember_updated_at: Option<String>,
}

impl HeartbeatStats {
    /// Whether anything the snapshot depends on moved since `prev`.
    /// The record count is informational and not compared.
    pub fn differs_from(&self, prev: Option<&HeartbeatStats>) -> bool {
        match prev {
            None => true,
            Some(p) => {
                p.history_bytes != self.history_bytes
                    || p.session_log_bytes != self.session_log_bytes
                    || p.remember_updated_at != self.remember_updated_at
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatDetails {
    pub seq: u64,
    pub interval_sec: u64,
    pub changed_since_last: bool,
    pub stats: HeartbeatStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopDetails {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyNoteDetails {
    pub source: String,
    /// Workspace-relative path of the file the note was gleaned from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    /// Marker timestamp text exactly as it appeared in the legacy log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    pub length: usize,
}

/// Type-specific body of a history record, keyed by the `type` discriminant.
///
/// A known kind whose `details` do not survive a decode/encode cycle
/// unchanged (extra keys, missing fields, other shapes) decodes as
/// [`Payload::Other`] with the same kind string, so rewriting the log never
/// drops or fills in data.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Note(Option<Details>),
    Decision(Option<Details>),
    Error(Option<Details>),
    Close(Option<Details>),
    SessionClose(Option<Details>),
    Heartbeat(HeartbeatDetails),
    HeartbeatStop(StopDetails),
    StartupIngest(Option<Details>),
    LegacyNote(LegacyNoteDetails),
    Diagnose(Option<Details>),
    Other { kind: String, details: Option<Value> },
}

impl Payload {
    pub fn kind(&self) -> &str {
        match self {
            Payload::Note(_) => kind::NOTE,
            Payload::Decision(_) => kind::DECISION,
            Payload::Error(_) => kind::ERROR,
            Payload::Close(_) => kind::CLOSE,
            Payload::SessionClose(_) => kind::SESSION_CLOSE,
            Payload::Heartbeat(_) => kind::HEARTBEAT,
            Payload::HeartbeatStop(_) => kind::HEARTBEAT_STOP,
            Payload::StartupIngest(_) => kind::STARTUP_INGEST,
            Payload::LegacyNote(_) => kind::LEGACY_NOTE,
            Payload::Diagnose(_) => kind::DIAGNOSE,
            Payload::Other { kind, .. } => kind,
        }
    }

    /// Decode a payload from its wire discriminant and raw details.
    pub fn decode(kind: String, details: Option<Value>) -> Payload {
        let decoded = match kind.as_str() {
            kind::HEARTBEAT => typed(&details).map(Payload::Heartbeat),
            kind::HEARTBEAT_STOP => typed(&details).map(Payload::HeartbeatStop),
            kind::LEGACY_NOTE => typed(&details).map(Payload::LegacyNote),
            other => match &details {
                None => plain(other, None),
                Some(Value::Object(map)) => plain(other, Some(map.clone())),
                Some(_) => None,
            },
        };
        decoded.unwrap_or(Payload::Other { kind, details })
    }

    /// Raw `details` value as written on the wire.
    pub fn details_value(&self) -> Option<Value> {
        match self {
            Payload::Note(d)
            | Payload::Decision(d)
            | Payload::Error(d)
            | Payload::Close(d)
            | Payload::SessionClose(d)
            | Payload::StartupIngest(d)
            | Payload::Diagnose(d) => d.clone().map(Value::Object),
            Payload::Heartbeat(d) => serde_json::to_value(d).ok(),
            Payload::HeartbeatStop(d) => serde_json::to_value(d).ok(),
            Payload::LegacyNote(d) => serde_json::to_value(d).ok(),
            Payload::Other { details, .. } => details.clone(),
        }
    }
}

fn typed<T: DeserializeOwned + Serialize>(details: &Option<Value>) -> Option<T> {
    let raw = details.as_ref()?;
    let decoded: T = serde_json::from_value(raw.clone()).ok()?;
    (serde_json::to_value(&decoded).ok()? == *raw).then_some(decoded)
}

fn plain(kind: &str, details: Option<Details>) -> Option<Payload> {
    let payload = match kind {
        kind::NOTE => Payload::Note(details),
        kind::DECISION => Payload::Decision(details),
        kind::ERROR => Payload::Error(details),
        kind::CLOSE => Payload::Close(details),
        kind::SESSION_CLOSE => Payload::SessionClose(details),
        kind::STARTUP_INGEST => Payload::StartupIngest(details),
        kind::DIAGNOSE => Payload::Diagnose(details),
        _ => return None,
    };
    Some(payload)
}

/// A single history record (one JSONL line in `history.jsonl`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRecord", into = "RawRecord")]
pub struct HistoryRecord {
    pub ts: String,
    pub summary: Option<String>,
    pub payload: Payload,
    /// Top-level keys written by older tools, kept verbatim.
    pub extra: Map<String, Value>,
}

impl HistoryRecord {
    pub fn kind(&self) -> &str {
        self.payload.kind()
    }

    /// Both `close` and `session_close` mark the end of a working session.
    pub fn is_session_close(&self) -> bool {
        matches!(self.kind(), kind::CLOSE | kind::SESSION_CLOSE)
    }

    pub fn summary_or_empty(&self) -> &str {
        self.summary.as_deref().unwrap_or("")
    }
}

#[derive(Serialize, Deserialize)]
struct RawRecord {
    #[serde(default)]
    ts: Option<String>,
    /// Older writers' name for `ts`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<Value>,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<RawRecord> for HistoryRecord {
    fn from(raw: RawRecord) -> Self {
        let mut extra = raw.extra;
        // `timestamp` stands in for a missing `ts`; otherwise it rides along in `extra`.
        let ts = match (raw.ts, raw.timestamp) {
            (Some(ts), alt) => {
                if let Some(alt) = alt {
                    extra.insert("timestamp".to_string(), alt);
                }
                ts
            }
            (None, Some(Value::String(alt))) => alt,
            (None, Some(alt)) => {
                extra.insert("timestamp".to_string(), alt);
                String::new()
            }
            (None, None) => String::new(),
        };
        Self {
            ts,
            summary: raw.summary,
            payload: Payload::decode(raw.kind, raw.details),
            extra,
        }
    }
}

impl From<HistoryRecord> for RawRecord {
    fn from(rec: HistoryRecord) -> Self {
        Self {
            details: rec.payload.details_value(),
            kind: rec.payload.kind().to_string(),
            ts: Some(rec.ts),
            timestamp: None,
            summary: rec.summary,
            extra: rec.extra,
        }
    }
}
