use std::path::Path;
use std::process::Command;
use std::sync::mpsc;
use tally_ledger::TallyPaths;

/// `tally watchdog`: block until SIGTERM, SIGINT or SIGHUP, then stop the
/// heartbeat daemon if a pid file is present.
pub fn execute(repo_root: &Path) -> anyhow::Result<()> {
    let paths = TallyPaths::discover(repo_root);
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })?;

    tracing::info!(root = %paths.root.display(), "watchdog idle");
    let _ = rx.recv();

    if paths.heartbeat_pid.exists() {
        stop_heartbeat(&paths);
    }
    Ok(())
}

fn stop_command(exe: &Path, root: &Path) -> Command {
    let mut cmd = Command::new(exe);
    cmd.arg("heartbeat").arg("--stop").arg("--root").arg(root);
    cmd
}

/// Run `tally heartbeat --stop` and wait for it. Failures are printed only.
fn stop_heartbeat(paths: &TallyPaths) {
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            eprintln!("[watchdog] stop error: {e}");
            return;
        }
    };
    match stop_command(&exe, &paths.root).status() {
        Ok(status) if !status.success() => eprintln!("[watchdog] stop exited with {status}"),
        Ok(_) => {}
        Err(e) => eprintln!("[watchdog] stop error: {e}"),
    }
}
