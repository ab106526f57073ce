//! Lock file management for single-instance enforcement.
//!
//! Two schedulers driving the same mount would fight over every slew, so
//! `heliotrack run` holds an exclusive `fs2` lock for its whole lifetime. The
//! lock is advisory and released by the kernel when the process exits, which
//! means a leftover file from a crashed run never blocks a new one.

use anyhow::{Context, Result, bail};
use fs2::FileExt;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::constants::LOCK_FILE_NAME;

/// Held for as long as the scheduler runs; the lock is released on drop.
#[derive(Debug)]
pub struct InstanceLock {
    _file: File,
    path: PathBuf,
}

impl InstanceLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Directory the lock file lives in: `$XDG_RUNTIME_DIR`, else `/tmp`.
pub fn default_lock_dir() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

/// Acquire the exclusive instance lock in `dir`.
///
/// The lock file holds the PID of the owner on its first line and the mount
/// driver name on the second, so a refused start can say who holds it.
pub fn acquire_lock(dir: &Path, device: &str) -> Result<InstanceLock> {
    let path = dir.join(LOCK_FILE_NAME);

    // Open without truncating so a running owner's content survives a failed attempt
    let mut file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("Failed to open lock file {}", path.display()))?;

    if file.try_lock_exclusive().is_err() {
        let owner = std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| content.lines().next().map(str::to_string))
            .filter(|pid| !pid.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        bail!("heliotrack is already running (PID: {owner})");
    }

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())?;
    writeln!(file, "{device}")?;
    file.flush()?;

    Ok(InstanceLock { _file: file, path })
}

/// PID of the process holding the lock in `dir`, if any.
pub fn running_instance_pid(dir: &Path) -> Result<Option<u32>> {
    let path = dir.join(LOCK_FILE_NAME);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).context("Failed to open lock file"),
    };

    if file.try_lock_shared().is_ok() {
        // Nobody holds it; the file is left over from an earlier run
        let _ = FileExt::unlock(&file);
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path).context("Failed to read lock file")?;
    let pid = content
        .lines()
        .next()
        .and_then(|line| line.trim().parse::<u32>().ok())
        .context("Lock file does not contain a PID")?;
    Ok(Some(pid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_is_exclusive_and_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();

        let lock = acquire_lock(dir.path(), "simulator").unwrap();
        let content = std::fs::read_to_string(lock.path()).unwrap();
        assert_eq!(
            content,
            format!("{}\nsimulator\n", std::process::id())
        );

        let err = acquire_lock(dir.path(), "simulator").unwrap_err();
        assert!(err.to_string().contains("already running"));
        assert_eq!(
            running_instance_pid(dir.path()).unwrap(),
            Some(std::process::id())
        );

        drop(lock);
        assert!(acquire_lock(dir.path(), "skyx").is_ok());
    }

    #[test]
    fn test_leftover_file_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LOCK_FILE_NAME), "999999\nskyx\n").unwrap();
        assert_eq!(running_instance_pid(dir.path()).unwrap(), None);
        assert!(acquire_lock(dir.path(), "skyx").is_ok());
    }
}
