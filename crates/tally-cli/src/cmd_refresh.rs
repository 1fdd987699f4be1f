use std::path::Path;
use tally_ledger::TallyPaths;

/// `tally refresh`
pub fn execute(repo_root: &Path) -> anyhow::Result<()> {
    let paths = TallyPaths::discover(repo_root);
    let snapshot = tally_derive::refresh(&paths)?;
    println!(
        "status.json updated ({} history entries, {} in the recent window)",
        snapshot.summary.history_entries, snapshot.context.last_6_days_entries
    );
    Ok(())
}
