use crate::paths::TallyPaths;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tally_core::{normalize, RememberDoc, TallyError};

/// Access to `persistence/remember.json`.
#[derive(Debug, Clone)]
pub struct RememberStore {
    path: PathBuf,
}

impl RememberStore {
    pub fn open(paths: &TallyPaths) -> Self {
        Self {
            path: paths.remember_json.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read and parse the raw document.
    ///
    /// A missing file or invalid JSON is `ConfigMissing`: the document is
    /// operator-authored and cannot be synthesized on the caller's behalf.
    pub fn load_raw(&self) -> Result<Value, TallyError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TallyError::config_missing(&self.path, "file not found"));
            }
            Err(e) => return Err(TallyError::config_missing(&self.path, e.to_string())),
        };
        serde_json::from_str(&content)
            .map_err(|e| TallyError::config_missing(&self.path, format!("invalid JSON: {e}")))
    }

    /// Load and normalize.
    pub fn load(&self) -> Result<RememberDoc, TallyError> {
        Ok(normalize(&self.load_raw()?))
    }

    /// Load, or fall back to a fresh default document when the file is absent.
    /// Invalid JSON is still an error.
    pub fn load_or_default(&self) -> Result<RememberDoc, TallyError> {
        if !self.path.exists() {
            return Ok(RememberDoc::default());
        }
        self.load()
    }

    /// Write the document as 2-space pretty JSON, creating parent directories.
    /// Plain overwrite; the file is small and rarely rewritten.
    pub fn save(&self, doc: &RememberDoc) -> Result<(), TallyError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TallyError::io(parent, e))?;
        }
        let data = serde_json::to_string_pretty(doc)
            .map_err(|e| TallyError::parse("remember document", e.to_string()))?;
        std::fs::write(&self.path, data).map_err(|e| TallyError::io(&self.path, e))
    }

    /// Raw `updated_at` as stored on disk, without normalizing.
    pub fn stored_updated_at(&self) -> Option<String> {
        self.load_raw()
            .ok()?
            .get("updated_at")?
            .as_str()
            .map(|s| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_in(tmp: &tempfile::TempDir) -> RememberStore {
        RememberStore::open(&TallyPaths::discover(tmp.path()))
    }

    #[test]
    fn missing_document_is_config_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let err = store.load().unwrap_err();
        assert!(err.is_config_missing());
        assert!(!store.exists());
    }

    #[test]
    fn invalid_json_is_config_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load().unwrap_err().is_config_missing());
        assert!(store.load_or_default().unwrap_err().is_config_missing());
    }

    #[test]
    fn load_or_default_when_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let doc = store_in(&tmp).load_or_default().unwrap();
        assert_eq!(doc.owner, "workspace");
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let mut doc = normalize(&json!({"sections": {"dos": ["a", "b"]}}));
        doc.add_lesson_once(json!({"title": "t"}));
        store.save(&doc).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.starts_with("{\n  \"version\": 1,"));

        let loaded = store.load().unwrap();
        assert_eq!(loaded.sections.dos.len(), 2);
        assert_eq!(loaded.sections.lessons_learned.len(), 1);
        assert_eq!(store.stored_updated_at(), Some(doc.updated_at.clone()));
    }
}
