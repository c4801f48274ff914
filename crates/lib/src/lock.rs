//! Per-target advisory locking.
//!
//! Two invocations building the same target must not interleave their
//! invalidate, record and commit steps. Each target gets lock files under
//! `<meta>/.locks/`, keyed by a digest of the normalized target name.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::consts::LOCK_KEY_LEN;
use crate::target::Target;
use crate::util::hash::fingerprint_bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
  /// Held for a whole `build()` of the target.
  Build,
  /// Held while writing dependency records owned by the target.
  Records,
}

impl LockScope {
  fn as_str(self) -> &'static str {
    match self {
      LockScope::Build => "build",
      LockScope::Records => "records",
    }
  }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at_unix: u64,
  pub command: String,
  pub target: String,
}

#[derive(Debug, Error)]
pub enum TargetLockError {
  #[error("failed to create lock directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to open lock file {path}: {source}")]
  OpenFile {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write lock metadata: {0}")]
  WriteMetadata(#[source] io::Error),

  #[error("failed to acquire lock {path}: {source}")]
  LockFailed {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// An acquired lock, released when dropped.
pub struct TargetLock {
  file: File,
  lock_path: PathBuf,
}

impl TargetLock {
  /// Acquire the lock for `target`, waiting for other holders.
  pub fn acquire(locks_dir: &Path, target: &Target, scope: LockScope, command: &str) -> Result<Self, TargetLockError> {
    let lock_path = lock_path(locks_dir, target, scope);

    std::fs::create_dir_all(locks_dir).map_err(|source| TargetLockError::CreateDir {
      path: locks_dir.to_path_buf(),
      source,
    })?;

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(|source| TargetLockError::OpenFile {
        path: lock_path.clone(),
        source,
      })?;

    match lock(&file, false) {
      Ok(()) => {}
      Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
        match read_metadata_at(&lock_path) {
          Some(holder) => info!(
            name = %target,
            pid = holder.pid,
            command = %holder.command,
            "waiting for another build of this target"
          ),
          None => info!(name = %target, scope = scope.as_str(), "waiting for lock"),
        }
        lock(&file, true).map_err(|source| TargetLockError::LockFailed {
          path: lock_path.clone(),
          source,
        })?;
      }
      Err(source) => {
        return Err(TargetLockError::LockFailed {
          path: lock_path.clone(),
          source,
        });
      }
    }

    if scope == LockScope::Build {
      write_metadata(&file, command, target)?;
    }

    debug!(name = %target, scope = scope.as_str(), "lock acquired");
    Ok(TargetLock { file, lock_path })
  }

  /// Reads the lock metadata from the held file handle.
  ///
  /// Opening a second handle would fail on Windows, where the lock is mandatory.
  pub fn read_metadata(&self) -> io::Result<LockMetadata> {
    use std::io::{Seek, SeekFrom};

    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }
}

/// Lock file for a target and scope.
pub fn lock_path(locks_dir: &Path, target: &Target, scope: LockScope) -> PathBuf {
  let key = fingerprint_bytes(target.name().as_bytes());
  locks_dir.join(format!("{}.{}.lock", &key.0[..LOCK_KEY_LEN], scope.as_str()))
}

fn write_metadata(file: &File, command: &str, target: &Target) -> Result<(), TargetLockError> {
  let metadata = LockMetadata {
    version: 1,
    pid: std::process::id(),
    started_at_unix: SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_secs(),
    command: command.to_string(),
    target: target.name().to_string(),
  };

  file.set_len(0).map_err(TargetLockError::WriteMetadata)?;
  let mut writer = io::BufWriter::new(file);
  serde_json::to_writer_pretty(&mut writer, &metadata)
    .map_err(|e| TargetLockError::WriteMetadata(io::Error::other(e)))?;
  writer.flush().map_err(TargetLockError::WriteMetadata)?;

  Ok(())
}

fn read_metadata_at(lock_path: &Path) -> Option<LockMetadata> {
  let mut file = File::open(lock_path).ok()?;
  let mut contents = String::new();
  file.read_to_string(&mut contents).ok()?;
  serde_json::from_str(&contents).ok()
}

#[cfg(unix)]
fn lock(file: &File, blocking: bool) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  let operation = if blocking {
    FlockOperation::LockExclusive
  } else {
    FlockOperation::NonBlockingLockExclusive
  };

  flock(file.as_fd(), operation).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn lock(file: &File, blocking: bool) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;
  let flags = if blocking {
    LOCKFILE_EXCLUSIVE_LOCK
  } else {
    LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK
  };

  // SAFETY: OVERLAPPED is a plain data struct that is valid when zero-initialized.
  // LockFileEx is safe to call with a valid file handle and zeroed OVERLAPPED.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(handle, flags, 0, 1, 0, &mut overlapped)
  };

  if result == 0 {
    let err = io::Error::last_os_error();
    // ERROR_LOCK_VIOLATION
    if err.raw_os_error() == Some(33) {
      return Err(io::Error::from(io::ErrorKind::WouldBlock));
    }
    Err(err)
  } else {
    Ok(())
  }
}
