use std::{
    fs::{File, OpenOptions},
    io::{self, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    process,
};

use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};

pub const LOCK_FILENAME: &str = "model.lock";

/// Exclusive advisory lock on a directory, held while its contents are being
/// rewritten. Other processes writing the same directory block until it is
/// released. The lock file itself is left in place: unlinking it while a
/// waiter holds an open handle would let two writers lock different inodes.
#[derive(Debug)]
pub struct WriterLock {
    file: File,
    path: PathBuf,
}

impl WriterLock {
    pub fn acquire(dir: &Path) -> io::Result<Self> {
        let path = dir.join(LOCK_FILENAME);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        if let Err(err) = file.try_lock_exclusive() {
            if err.kind() != io::ErrorKind::WouldBlock {
                return Err(err);
            }
            tracing::info!(
                target: "lifecycle",
                path = %path.display(),
                "model directory locked by another writer; waiting"
            );
            file.lock_exclusive()?;
        }

        write_lock_info(&mut file, process::id())?;
        tracing::debug!(
            target: "lifecycle",
            pid = process::id(),
            path = %path.display(),
            "acquired model writer lock"
        );
        Ok(Self { file, path })
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            tracing::warn!(
                target: "lifecycle",
                path = %self.path.display(),
                error = %err,
                "failed to release model writer lock"
            );
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    acquired_at: i64,
}

fn write_lock_info(file: &mut File, pid: u32) -> io::Result<()> {
    let info = LockInfo {
        pid,
        acquired_at: Utc::now().timestamp_millis(),
    };
    let payload = serde_json::to_vec(&info).map_err(io::Error::other)?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&payload)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_owner_and_releases_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _lock = WriterLock::acquire(dir.path()).unwrap();
            let raw = std::fs::read(dir.path().join(LOCK_FILENAME)).unwrap();
            let info: LockInfo = serde_json::from_slice(&raw).unwrap();
            assert_eq!(info.pid, process::id());
        }
        // Re-acquiring after drop must not block.
        let _again = WriterLock::acquire(dir.path()).unwrap();
    }
}
