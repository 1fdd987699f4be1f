//! Error taxonomy shared by every tally crate.
//!
//! Store-level operations return [`TallyError`] so callers can tell a missing
//! remember document apart from a failed append. Higher layers wrap these in
//! `anyhow` with context.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TallyError {
    /// A required persisted document is absent or unparseable.
    #[error("{} missing or invalid: {reason}", path.display())]
    ConfigMissing { path: PathBuf, reason: String },

    /// Read/write/append failure on a workspace file.
    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A unit of input could not be parsed. Callers usually skip the unit.
    #[error("parse failure in {context}: {message}")]
    Parse { context: String, message: String },

    /// A pid was recorded but the process is gone.
    #[error("process {pid} is not running")]
    ProcessLookup { pid: u32 },
}

impl TallyError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config_missing(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ConfigMissing {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Whether the error means a required document is unavailable.
    pub fn is_config_missing(&self) -> bool {
        matches!(self, Self::ConfigMissing { .. })
    }
}
