use anyhow::Result;
use std::fs;
use std::path::Path;
use tally_ledger::TallyPaths;

use crate::process::ProcessTable;

/// Where a daemon is in its lifecycle, as far as the pid file can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Stopped,
    /// Spawned, loop not yet confirmed.
    Starting(u32),
    Running(u32),
    /// SIGTERM sent; the daemon removes its own pid file on the way out.
    StoppingViaSignal(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    AlreadyRunning(u32),
    Started {
        pid: u32,
        /// Pid of a dead daemon whose pid file was cleaned up first.
        replaced_stale: Option<u32>,
    },
}

impl StartOutcome {
    pub fn state(&self) -> DaemonState {
        match *self {
            StartOutcome::AlreadyRunning(pid) => DaemonState::Running(pid),
            StartOutcome::Started { pid, .. } => DaemonState::Starting(pid),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    NotRunning,
    StalePidRemoved(u32),
    Signalled(u32),
}

impl StopOutcome {
    pub fn state(&self) -> DaemonState {
        match *self {
            StopOutcome::Signalled(pid) => DaemonState::StoppingViaSignal(pid),
            _ => DaemonState::Stopped,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PidFile {
    Missing,
    Unreadable,
    Pid(u32),
}

fn read_pid_file(path: &Path) -> Result<PidFile> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PidFile::Missing),
        Err(e) => return Err(e.into()),
    };
    Ok(match raw.trim().parse::<u32>() {
        Ok(pid) if pid > 0 => PidFile::Pid(pid),
        _ => PidFile::Unreadable,
    })
}

/// Starts, stops and inspects the heartbeat daemon through its pid file.
pub struct DaemonController<P: ProcessTable> {
    paths: TallyPaths,
    processes: P,
}

impl<P: ProcessTable> DaemonController<P> {
    pub fn new(paths: TallyPaths, processes: P) -> Self {
        Self { paths, processes }
    }

    fn remove_pid_file(&self) {
        let _ = fs::remove_file(&self.paths.heartbeat_pid);
    }

    /// Spawn the daemon unless a live one is already recorded.
    /// Returns as soon as the child is launched.
    pub fn start(&self) -> Result<StartOutcome> {
        fs::create_dir_all(&self.paths.persist_dir)?;

        let mut replaced_stale = None;
        match read_pid_file(&self.paths.heartbeat_pid)? {
            PidFile::Pid(pid) if self.processes.is_alive(pid) => {
                return Ok(StartOutcome::AlreadyRunning(pid));
            }
            PidFile::Pid(pid) => {
                tracing::info!(pid, "removing stale heartbeat pid file");
                self.remove_pid_file();
                replaced_stale = Some(pid);
            }
            PidFile::Unreadable => {
                tracing::info!("removing unreadable heartbeat pid file");
                self.remove_pid_file();
            }
            PidFile::Missing => {}
        }

        let pid = self
            .processes
            .spawn_daemon(&self.paths.root, &self.paths.heartbeat_log)?;
        fs::write(&self.paths.heartbeat_pid, pid.to_string())?;
        tracing::info!(pid, "heartbeat daemon spawned");
        Ok(StartOutcome::Started {
            pid,
            replaced_stale,
        })
    }

    /// Signal the recorded daemon. Does not wait for it to exit.
    pub fn stop(&self) -> Result<StopOutcome> {
        match read_pid_file(&self.paths.heartbeat_pid)? {
            PidFile::Missing => Ok(StopOutcome::NotRunning),
            PidFile::Unreadable => {
                self.remove_pid_file();
                Ok(StopOutcome::NotRunning)
            }
            PidFile::Pid(pid) if !self.processes.is_alive(pid) => {
                self.remove_pid_file();
                Ok(StopOutcome::StalePidRemoved(pid))
            }
            PidFile::Pid(pid) => {
                self.processes.terminate(pid)?;
                Ok(StopOutcome::Signalled(pid))
            }
        }
    }

    /// Read-only view of the pid file.
    pub fn status(&self) -> Result<DaemonState> {
        Ok(match read_pid_file(&self.paths.heartbeat_pid)? {
            PidFile::Pid(pid) if self.processes.is_alive(pid) => DaemonState::Running(pid),
            _ => DaemonState::Stopped,
        })
    }

    pub fn paths(&self) -> &TallyPaths {
        &self.paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;
    use std::path::PathBuf;

    #[derive(Default)]
    struct FakeProcesses {
        alive: RefCell<HashSet<u32>>,
        terminated: RefCell<Vec<u32>>,
        spawned: RefCell<Vec<(PathBuf, PathBuf)>>,
        next_pid: Cell<u32>,
    }

    impl FakeProcesses {
        fn with_alive(pids: &[u32]) -> Self {
            let fake = Self::default();
            fake.alive.borrow_mut().extend(pids.iter().copied());
            fake.next_pid.set(5000);
            fake
        }
    }

    impl ProcessTable for FakeProcesses {
        fn is_alive(&self, pid: u32) -> bool {
            self.alive.borrow().contains(&pid)
        }

        fn terminate(&self, pid: u32) -> Result<()> {
            self.terminated.borrow_mut().push(pid);
            Ok(())
        }

        fn spawn_daemon(&self, root: &Path, log: &Path) -> Result<u32> {
            let pid = self.next_pid.get();
            self.next_pid.set(pid + 1);
            self.alive.borrow_mut().insert(pid);
            self.spawned
                .borrow_mut()
                .push((root.to_path_buf(), log.to_path_buf()));
            Ok(pid)
        }
    }

    fn controller(alive: &[u32]) -> (tempfile::TempDir, DaemonController<FakeProcesses>) {
        let tmp = tempfile::tempdir().unwrap();
        let paths = TallyPaths::discover(tmp.path());
        (tmp, DaemonController::new(paths, FakeProcesses::with_alive(alive)))
    }

    fn pid_on_disk(c: &DaemonController<FakeProcesses>) -> Option<String> {
        fs::read_to_string(&c.paths().heartbeat_pid).ok()
    }

    #[test]
    fn start_from_clean_workspace() {
        let (_tmp, c) = controller(&[]);
        let outcome = c.start().unwrap();
        assert_eq!(
            outcome,
            StartOutcome::Started {
                pid: 5000,
                replaced_stale: None
            }
        );
        assert_eq!(outcome.state(), DaemonState::Starting(5000));
        assert_eq!(pid_on_disk(&c).as_deref(), Some("5000"));

        let spawned = c.processes.spawned.borrow();
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].0, c.paths().root);
        assert_eq!(spawned[0].1, c.paths().heartbeat_log);
    }

    #[test]
    fn start_is_noop_when_alive() {
        let (_tmp, c) = controller(&[321]);
        fs::create_dir_all(&c.paths().persist_dir).unwrap();
        fs::write(&c.paths().heartbeat_pid, "321\n").unwrap();

        assert_eq!(c.start().unwrap(), StartOutcome::AlreadyRunning(321));
        assert!(c.processes.spawned.borrow().is_empty());
        assert_eq!(pid_on_disk(&c).as_deref(), Some("321\n"));
    }

    #[test]
    fn start_replaces_stale_pid() {
        let (_tmp, c) = controller(&[]);
        fs::create_dir_all(&c.paths().persist_dir).unwrap();
        fs::write(&c.paths().heartbeat_pid, "999999").unwrap();

        let outcome = c.start().unwrap();
        assert_eq!(
            outcome,
            StartOutcome::Started {
                pid: 5000,
                replaced_stale: Some(999999)
            }
        );
        let recorded: u32 = pid_on_disk(&c).unwrap().parse().unwrap();
        assert_ne!(recorded, 999999);
        assert!(c.processes.is_alive(recorded));
        assert_eq!(c.status().unwrap(), DaemonState::Running(recorded));
    }

    #[test]
    fn start_replaces_garbage_pid_file() {
        let (_tmp, c) = controller(&[]);
        fs::create_dir_all(&c.paths().persist_dir).unwrap();
        fs::write(&c.paths().heartbeat_pid, "not a pid").unwrap();
        assert!(matches!(
            c.start().unwrap(),
            StartOutcome::Started {
                replaced_stale: None,
                ..
            }
        ));
    }

    #[test]
    fn stop_variants() {
        let (_tmp, c) = controller(&[77]);
        assert_eq!(c.stop().unwrap(), StopOutcome::NotRunning);

        fs::create_dir_all(&c.paths().persist_dir).unwrap();
        fs::write(&c.paths().heartbeat_pid, "12").unwrap();
        assert_eq!(c.stop().unwrap(), StopOutcome::StalePidRemoved(12));
        assert!(pid_on_disk(&c).is_none());

        fs::write(&c.paths().heartbeat_pid, "77").unwrap();
        let outcome = c.stop().unwrap();
        assert_eq!(outcome, StopOutcome::Signalled(77));
        assert_eq!(outcome.state(), DaemonState::StoppingViaSignal(77));
        assert_eq!(*c.processes.terminated.borrow(), vec![77]);
        // the daemon cleans up its own pid file
        assert!(pid_on_disk(&c).is_some());
    }

    #[test]
    fn status_reads_without_side_effects() {
        let (_tmp, c) = controller(&[]);
        assert_eq!(c.status().unwrap(), DaemonState::Stopped);
        fs::create_dir_all(&c.paths().persist_dir).unwrap();
        fs::write(&c.paths().heartbeat_pid, "12").unwrap();
        assert_eq!(c.status().unwrap(), DaemonState::Stopped);
        assert!(pid_on_disk(&c).is_some());
    }
}
