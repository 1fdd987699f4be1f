use std::path::Path;
use tally_ledger::migrate::{migrate_legacy, MigrateOptions};
use tally_ledger::TallyPaths;

/// `tally migrate [--apply]`
pub fn execute(repo_root: &Path, apply: bool) -> anyhow::Result<()> {
    let paths = TallyPaths::discover(repo_root);
    let report = migrate_legacy(&paths, &MigrateOptions { apply })?;

    if !apply {
        println!("Dry run: no changes made.\n");
        println!("  sources read: {}", report.sources_read);
        println!("  gleaned entries: {}", report.gleaned);
        println!("  duplicates skipped: {}", report.duplicates_skipped);
        println!(
            "  history before/after: {} / {}",
            report.history_before, report.history_after
        );
        if report.lesson_added {
            println!("  would add lesson \"Legacy logs migrated\" to remember.json");
        }
        if report.removed.is_empty() {
            println!("  would remove: (nothing)");
        } else {
            println!("  would remove: {}", report.removed.join(", "));
        }
        println!("\nRe-run with --apply to write.");
    } else {
        println!("Migration applied:");
        println!("  gleaned entries: {}", report.gleaned);
        println!("  duplicates skipped: {}", report.duplicates_skipped);
        println!("  history entries: {}", report.history_after);
        for path in &report.removed {
            println!("  removed {path}");
        }
    }
    Ok(())
}
