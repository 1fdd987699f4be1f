use crate::paths::TallyPaths;
use fs2::FileExt;
use std::fs::{File, OpenOptions};

/// Exclusive lock held by a running heartbeat loop (`persistence/heartbeat.lock`).
/// Released when dropped or when the process exits.
///
/// Only the daemon takes this lock; the history log and remember document
/// stay unlocked.
pub struct DaemonLock {
    _file: File,
}

impl DaemonLock {
    /// Try to acquire the lock (non-blocking).
    /// Returns an error if another heartbeat loop already holds it.
    pub fn acquire(paths: &TallyPaths) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&paths.persist_dir)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&paths.heartbeat_lock)
            .map_err(|e| {
                anyhow::anyhow!(
                    "cannot open lock file {}: {}",
                    paths.heartbeat_lock.display(),
                    e
                )
            })?;

        file.try_lock_exclusive().map_err(|_| {
            anyhow::anyhow!(
                "another heartbeat loop holds {}",
                paths.heartbeat_lock.display()
            )
        })?;

        Ok(Self { _file: file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let p = TallyPaths::discover(tmp.path());

        let lock = DaemonLock::acquire(&p).unwrap();
        // Second acquire should fail while first is held
        assert!(DaemonLock::acquire(&p).is_err());
        drop(lock);
        let _lock2 = DaemonLock::acquire(&p).unwrap();
    }
}
