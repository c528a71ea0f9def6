//! Opens a dbpath: acquires the advisory lock file, detects a stale lock
//! from a prior process, and refuses to start if journal files are present
//! without `--journal`.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StoreOpenerError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Another process currently holds the dbpath lock.
    #[error("dbpath {0} is locked by another mongod process")]
    Locked(PathBuf),

    /// Journal files exist on disk but the node was started with
    /// `--nojournal`; starting would silently diverge from durability the
    /// data files were written under.
    #[error("journal files present in {0} but node started without --journal")]
    JournalPresentWithoutJournalFlag(PathBuf),
}

const LOCK_FILE_NAME: &str = "mongod.lock";
const JOURNAL_DIR_NAME: &str = "journal";

pub struct LockFile {
    path: PathBuf,
    file: File,
}

impl LockFile {
    /// Acquires the dbpath lock file, writing the current process id into
    /// it. A zero-byte lock file (or one containing only whitespace) is
    /// treated as stale — left behind by an unclean shutdown — and is
    /// reclaimed rather than rejected.
    pub fn acquire(dbpath: &Path, pid: u32) -> Result<Self, StoreOpenerError> {
        fs::create_dir_all(dbpath)?;
        let path = dbpath.join(LOCK_FILE_NAME);
        let mut file = OpenOptions::new().create(true).read(true).write(true).open(&path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let existing_pid: Option<u32> = contents.trim().parse().ok();
        if let Some(existing) = existing_pid {
            if existing != 0 && process_is_alive(existing) {
                return Err(StoreOpenerError::Locked(path));
            }
        }
        file.set_len(0)?;
        use std::io::Seek;
        file.seek(std::io::SeekFrom::Start(0))?;
        write!(file, "{pid}")?;
        file.sync_all()?;
        Ok(LockFile { path, file })
    }

    pub fn release(self) -> Result<(), StoreOpenerError> {
        drop(self.file);
        fs::remove_file(&self.path)?;
        Ok(())
    }
}

/// Best-effort liveness check; on platforms without `/proc` this always
/// reports the holder alive, which is the conservative (refuse-to-start)
/// choice.
#[cfg(target_os = "linux")]
fn process_is_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_is_alive(_pid: u32) -> bool {
    true
}

/// Verifies the journal-flag invariant: if `journal/` exists under `dbpath`
/// and the node was not started with `--journal`, refuse to start rather
/// than silently running without the durability the data files assume.
pub fn check_journal_flag(dbpath: &Path, journal_enabled: bool) -> Result<(), StoreOpenerError> {
    let journal_dir = dbpath.join(JOURNAL_DIR_NAME);
    if journal_dir.exists() && !journal_enabled {
        return Err(StoreOpenerError::JournalPresentWithoutJournalFlag(journal_dir));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquiring_twice_with_a_live_pid_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let _lock = LockFile::acquire(dir.path(), std::process::id()).unwrap();
        let err = LockFile::acquire(dir.path(), std::process::id()).unwrap_err();
        assert!(matches!(err, StoreOpenerError::Locked(_)));
    }

    #[test]
    fn release_then_reacquire_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let lock = LockFile::acquire(dir.path(), std::process::id()).unwrap();
        lock.release().unwrap();
        assert!(LockFile::acquire(dir.path(), std::process::id()).is_ok());
    }

    #[test]
    fn journal_dir_without_flag_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(JOURNAL_DIR_NAME)).unwrap();
        let err = check_journal_flag(dir.path(), false).unwrap_err();
        assert!(matches!(err, StoreOpenerError::JournalPresentWithoutJournalFlag(_)));
        assert!(check_journal_flag(dir.path(), true).is_ok());
    }
}
