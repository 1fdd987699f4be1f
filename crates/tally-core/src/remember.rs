//! The remember document: operator-curated knowledge kept in
//! `persistence/remember.json`.
//!
//! [`normalize`] turns any JSON value into a complete [`RememberDoc`]. Fields
//! that are present and well typed win over the defaults one by one at every
//! nested object; missing or wrongly typed fields take the default; unknown
//! keys are carried through untouched.

use crate::clock::now_rfc3339;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

pub const REMEMBER_VERSION: u64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrunePolicy {
    pub preserve_types: Vec<String>,
    pub order: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PrunePolicy {
    fn default() -> Self {
        Self {
            preserve_types: vec!["decision".to_string()],
            order: "last_seen_at_asc".to_string(),
            extra: Map::new(),
        }
    }
}

impl PrunePolicy {
    fn merge_from(&mut self, obj: &Map<String, Value>) {
        take(obj, "preserve_types", &mut self.preserve_types);
        take(obj, "order", &mut self.order);
        self.extra = unknown_keys(obj, &["preserve_types", "order"]);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Policy {
    pub autoflush: bool,
    pub debounce_ms: u64,
    /// Advisory cap on log size; nothing prunes in-band.
    pub max_bytes: u64,
    pub prune: PrunePolicy,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            autoflush: true,
            debounce_ms: 1000,
            max_bytes: 524_288,
            prune: PrunePolicy::default(),
            extra: Map::new(),
        }
    }
}

impl Policy {
    fn merge_from(&mut self, obj: &Map<String, Value>) {
        take(obj, "autoflush", &mut self.autoflush);
        take(obj, "debounce_ms", &mut self.debounce_ms);
        take(obj, "max_bytes", &mut self.max_bytes);
        if let Some(Value::Object(prune)) = obj.get("prune") {
            self.prune.merge_from(prune);
        }
        self.extra = unknown_keys(obj, &["autoflush", "debounce_ms", "max_bytes", "prune"]);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Instructions {
    pub current_focus: Vec<Value>,
    pub next_tasks: Vec<Value>,
    pub open_questions: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Instructions {
    fn merge_from(&mut self, obj: &Map<String, Value>) {
        take(obj, "current_focus", &mut self.current_focus);
        take(obj, "next_tasks", &mut self.next_tasks);
        take(obj, "open_questions", &mut self.open_questions);
        self.extra = unknown_keys(obj, &["current_focus", "next_tasks", "open_questions"]);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Sections {
    pub dos: Vec<Value>,
    pub donts: Vec<Value>,
    pub instructions: Instructions,
    pub lessons_learned: Vec<Value>,
    pub great_modules: Vec<Value>,
    pub sop: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Sections {
    fn merge_from(&mut self, obj: &Map<String, Value>) {
        take(obj, "dos", &mut self.dos);
        take(obj, "donts", &mut self.donts);
        if let Some(Value::Object(instr)) = obj.get("instructions") {
            self.instructions.merge_from(instr);
        }
        take(obj, "lessons_learned", &mut self.lessons_learned);
        take(obj, "great_modules", &mut self.great_modules);
        take(obj, "sop", &mut self.sop);
        self.extra = unknown_keys(
            obj,
            &[
                "dos",
                "donts",
                "instructions",
                "lessons_learned",
                "great_modules",
                "sop",
            ],
        );
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RememberDoc {
    pub version: u64,
    pub updated_at: String,
    pub owner: String,
    pub policy: Policy,
    pub sections: Sections,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for RememberDoc {
    fn default() -> Self {
        Self {
            version: REMEMBER_VERSION,
            updated_at: now_rfc3339(),
            owner: "workspace".to_string(),
            policy: Policy::default(),
            sections: Sections::default(),
            extra: Map::new(),
        }
    }
}

impl RememberDoc {
    fn merge_from(&mut self, obj: &Map<String, Value>) {
        take(obj, "version", &mut self.version);
        take(obj, "owner", &mut self.owner);
        if let Some(Value::Object(policy)) = obj.get("policy") {
            self.policy.merge_from(policy);
        }
        if let Some(Value::Object(sections)) = obj.get("sections") {
            self.sections.merge_from(sections);
        }
        self.extra = unknown_keys(
            obj,
            &["version", "updated_at", "owner", "policy", "sections"],
        );
    }

    /// Append `lesson` to `lessons_learned` unless an entry with the same
    /// `title` is already there. Returns whether it was added.
    pub fn add_lesson_once(&mut self, lesson: Value) -> bool {
        let title = lesson.get("title").cloned();
        let exists = title.is_some()
            && self
                .sections
                .lessons_learned
                .iter()
                .any(|l| l.get("title") == title.as_ref());
        if exists {
            return false;
        }
        self.sections.lessons_learned.push(lesson);
        true
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Produce a complete document from `raw`, stamping `updated_at` with now.
pub fn normalize(raw: &Value) -> RememberDoc {
    let mut doc = RememberDoc::default();
    if let Some(obj) = raw.as_object() {
        doc.merge_from(obj);
    }
    doc.updated_at = now_rfc3339();
    doc
}

fn take<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str, slot: &mut T) {
    if let Some(v) = obj.get(key) {
        if let Ok(parsed) = serde_json::from_value(v.clone()) {
            *slot = parsed;
        }
    }
}

fn unknown_keys(obj: &Map<String, Value>, known: &[&str]) -> Map<String, Value> {
    obj.iter()
        .filter(|(k, _)| !known.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
