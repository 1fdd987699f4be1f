pub mod atomic;
pub mod config;
pub mod glean;
pub mod history;
pub mod lock;
pub mod migrate;
pub mod paths;
pub mod remember;
pub mod session_log;

pub use atomic::write_atomic;
pub use config::WorkspaceConfig;
pub use history::HistoryLog;
pub use lock::DaemonLock;
pub use paths::TallyPaths;
pub use remember::RememberStore;
