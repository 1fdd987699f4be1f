use std::path::Path;
use tally_heartbeat::{
    install_termination_flag, DaemonController, DaemonState, HeartbeatLoop, StartOutcome,
    StopOutcome, SystemProcesses,
};
use tally_ledger::{TallyPaths, WorkspaceConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Run,
    Status,
}

/// `tally heartbeat [--start|--stop|--run|--status]`
pub fn execute(repo_root: &Path, action: Action) -> anyhow::Result<()> {
    let paths = TallyPaths::discover(repo_root);
    match action {
        Action::Start => start(paths),
        Action::Stop => stop(paths),
        Action::Status => status(paths),
        Action::Run => run(paths),
    }
}

fn start(paths: TallyPaths) -> anyhow::Result<()> {
    let log = paths.heartbeat_log.clone();
    let controller = DaemonController::new(paths, SystemProcesses);
    match controller.start()? {
        StartOutcome::AlreadyRunning(pid) => {
            println!("heartbeat already running (pid {pid})");
        }
        StartOutcome::Started {
            pid,
            replaced_stale,
        } => {
            if let Some(stale) = replaced_stale {
                println!("removed stale pid file (pid {stale})");
            }
            println!("heartbeat started");
            println!("- pid: {pid}");
            println!("- log: {}", log.display());
        }
    }
    Ok(())
}

fn stop(paths: TallyPaths) -> anyhow::Result<()> {
    let controller = DaemonController::new(paths, SystemProcesses);
    match controller.stop()? {
        StopOutcome::NotRunning => println!("heartbeat not running"),
        StopOutcome::StalePidRemoved(pid) => {
            println!("heartbeat was not running (stale pid {pid} cleaned)")
        }
        StopOutcome::Signalled(pid) => println!("sent SIGTERM to heartbeat (pid {pid})"),
    }
    Ok(())
}

fn status(paths: TallyPaths) -> anyhow::Result<()> {
    let log = paths.heartbeat_log.clone();
    let controller = DaemonController::new(paths, SystemProcesses);
    match controller.status()? {
        DaemonState::Running(pid) => {
            println!("heartbeat status: running");
            println!("- pid: {pid}");
        }
        _ => println!("heartbeat status: stopped"),
    }
    println!("- log: {}", log.display());
    Ok(())
}

fn run(paths: TallyPaths) -> anyhow::Result<()> {
    let cfg = WorkspaceConfig::load(&paths);
    let stop = install_termination_flag()?;
    HeartbeatLoop::new(paths, cfg).run(&stop)
}
