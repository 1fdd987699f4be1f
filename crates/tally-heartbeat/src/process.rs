use anyhow::{bail, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::process::{Command, Stdio};

/// The slice of the OS process table the daemon controller needs.
pub trait ProcessTable {
    fn is_alive(&self, pid: u32) -> bool;
    /// Ask `pid` to exit. Does not wait.
    fn terminate(&self, pid: u32) -> Result<()>;
    /// Launch a detached `heartbeat --run` for `root`, output appended to `log`.
    fn spawn_daemon(&self, root: &Path, log: &Path) -> Result<u32>;
}

/// The real process table.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcesses;

impl ProcessTable for SystemProcesses {
    fn is_alive(&self, pid: u32) -> bool {
        is_pid_running(pid)
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        terminate_pid(pid)
    }

    fn spawn_daemon(&self, root: &Path, log: &Path) -> Result<u32> {
        if let Some(parent) = log.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let exe = std::env::current_exe()?;
        let out = OpenOptions::new().create(true).append(true).open(log)?;
        let err = out.try_clone()?;

        let mut cmd = Command::new(exe);
        cmd.arg("heartbeat")
            .arg("--run")
            .arg("--root")
            .arg(root)
            .stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .stderr(Stdio::from(err));
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // own process group, so the launching terminal's ^C does not reach it
            cmd.process_group(0);
        }

        let child = cmd.spawn()?;
        Ok(child.id())
    }
}

pub fn is_pid_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        if pid == 0 || pid > i32::MAX as u32 {
            return false;
        }
        let stat_path = format!("/proc/{pid}/stat");
        if let Ok(content) = std::fs::read_to_string(&stat_path) {
            if let Some(close_paren) = content.rfind(')') {
                let state = content[close_paren + 1..]
                    .trim_start()
                    .chars()
                    .next()
                    .unwrap_or('X');
                return !matches!(state, 'Z' | 'X');
            }
        }
        // SAFETY: kill() with signal 0 only checks existence and permission.
        let ret = unsafe { libc::kill(pid as libc::pid_t, 0) };
        ret == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

pub fn terminate_pid(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        if pid == 0 || pid > i32::MAX as u32 {
            bail!("refusing to signal pid {pid}");
        }
        // SAFETY: kill() is async-signal-safe and has no memory effects here.
        let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if ret != 0 {
            bail!(
                "failed to terminate daemon pid {pid}: {}",
                std::io::Error::last_os_error()
            );
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        bail!("daemon stop is only implemented on unix in this build")
    }
}
