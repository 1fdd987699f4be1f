use std::path::Path;
use tally_core::record::{new_logged_record, parse_details_arg};
use tally_ledger::{HistoryLog, TallyPaths};

/// `tally log <type> <summary> [details]`
pub fn execute(
    repo_root: &Path,
    kind: &str,
    summary: &str,
    details: Option<&str>,
) -> anyhow::Result<()> {
    if summary.trim().is_empty() {
        anyhow::bail!("Usage: tally log <type> <summary> [details-json]");
    }
    let paths = TallyPaths::discover(repo_root);
    let record = new_logged_record(kind, summary, details.map(parse_details_arg))?;
    HistoryLog::open(&paths).append(&record)?;
    println!("appended {kind}: {summary}");
    Ok(())
}
