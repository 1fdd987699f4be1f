use std::path::Path;
use tally_ledger::TallyPaths;

/// `tally ingest`
pub fn execute(repo_root: &Path) -> anyhow::Result<()> {
    let paths = TallyPaths::discover(repo_root);
    let report = tally_derive::ingest(&paths)?;
    println!("remember.json + history ingested.");
    println!("{}", report.session_line);
    println!("{}", serde_json::to_string_pretty(&report.snapshot)?);
    Ok(())
}
