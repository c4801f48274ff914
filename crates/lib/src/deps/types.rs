use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::lock::TargetLockError;
use crate::util::hash::{Fingerprint, HashError, fingerprint_file};

/// Evidence that a target's last successful build read `path` while it had
/// content `fingerprint`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct DependencyRecord {
  pub fingerprint: Fingerprint,
  pub path: String,
}

impl DependencyRecord {
  /// Whether the dependency still has the recorded content.
  pub fn is_current(&self, root: &Path) -> bool {
    fingerprint_file(&root.join(&self.path))
      .map(|fp| fp == self.fingerprint)
      .unwrap_or(false)
  }
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("failed to create dependency store {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to fingerprint dependency: {0}")]
  Fingerprint(#[from] HashError),

  #[error("failed to write dependency record {path}: {source}")]
  WriteRecord {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read dependency records in {path}: {source}")]
  ReadRecords {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to invalidate dependency store {path}: {source}")]
  Invalidate {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Lock(#[from] TargetLockError),
}

impl StoreError {
  /// Whether the underlying failure was a permission problem.
  pub fn is_permission_denied(&self) -> bool {
    let source = match self {
      StoreError::CreateDir { source, .. }
      | StoreError::WriteRecord { source, .. }
      | StoreError::ReadRecords { source, .. }
      | StoreError::Invalidate { source, .. } => source,
      StoreError::Fingerprint(err) => &err.source,
      StoreError::Lock(_) => return false,
    };
    source.kind() == io::ErrorKind::PermissionDenied
  }
}
