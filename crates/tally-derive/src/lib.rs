mod snapshot;
mod writers;

pub use snapshot::{build_status, count_recent, last_session_close, HIGHLIGHT_LIMIT};
pub use writers::{ingest, refresh, refresh_with, IngestReport};
