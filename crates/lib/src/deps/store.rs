//! Dependency record storage (`<meta>/<escaped target>/<fingerprint>`).
//!
//! Every target gets one flat directory directly under the metadata root, so
//! no store ever contains another target's store.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::deps::{DependencyRecord, StoreError};
use crate::lock::{LockScope, TargetLock};
use crate::target::Target;
use crate::util::hash::{Fingerprint, fingerprint_file};

#[derive(Debug, Clone)]
pub struct DependencyStore {
  root: PathBuf,
  meta_dir: PathBuf,
  locks_dir: PathBuf,
}

impl DependencyStore {
  pub fn new(config: &EngineConfig) -> Self {
    Self {
      root: config.root.clone(),
      meta_dir: config.meta_dir.clone(),
      locks_dir: config.locks_dir(),
    }
  }

  pub fn store_dir(&self, owner: &Target) -> PathBuf {
    self.meta_dir.join(store_dir_name(owner))
  }

  /// Whether `owner` has a store directory, i.e. was built with tracked
  /// dependencies.
  pub fn exists(&self, owner: &Target) -> bool {
    self.store_dir(owner).is_dir()
  }

  /// Record that `owner` depends on the current content of `dependency`.
  ///
  /// Creates the store directory on demand. A dependency that was recorded
  /// earlier with different content loses its old record, so each dependency
  /// has at most one live record per owner.
  pub fn record(&self, owner: &Target, dependency: &Target) -> Result<DependencyRecord, StoreError> {
    let fingerprint = fingerprint_file(&dependency.path(&self.root))?;

    let dir = self.store_dir(owner);
    fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDir {
      path: dir.clone(),
      source,
    })?;

    let _lock = TargetLock::acquire(&self.locks_dir, owner, LockScope::Records, "record")?;

    for (existing, mut paths) in read_record_files(&dir)? {
      if existing == fingerprint || !paths.iter().any(|p| p == dependency.name()) {
        continue;
      }
      paths.retain(|p| p != dependency.name());
      let path = dir.join(existing.as_str());
      debug!(owner = %owner, dependency = %dependency, old = %existing, "replacing outdated record");
      if paths.is_empty() {
        remove_record(&path)?;
      } else {
        write_record(&path, &paths)?;
      }
    }

    let record_path = dir.join(fingerprint.as_str());
    let mut paths = read_record(&record_path)?;
    if !paths.iter().any(|p| p == dependency.name()) {
      paths.push(dependency.name().to_string());
      write_record(&record_path, &paths)?;
    }

    debug!(owner = %owner, dependency = %dependency, fingerprint = %fingerprint, "recorded dependency");

    Ok(DependencyRecord {
      fingerprint,
      path: dependency.name().to_string(),
    })
  }

  /// All records of `owner`, sorted. Empty when the owner has no store yet.
  pub fn list(&self, owner: &Target) -> Result<Vec<DependencyRecord>, StoreError> {
    let dir = self.store_dir(owner);
    if !dir.is_dir() {
      return Ok(Vec::new());
    }

    let mut records: Vec<DependencyRecord> = read_record_files(&dir)?
      .into_iter()
      .flat_map(|(fingerprint, paths)| {
        paths.into_iter().map(move |path| DependencyRecord {
          fingerprint: fingerprint.clone(),
          path,
        })
      })
      .collect();
    records.sort();
    Ok(records)
  }

  /// Remove every record of `owner`. Succeeds when there is nothing to remove.
  pub fn invalidate(&self, owner: &Target) -> Result<(), StoreError> {
    let dir = self.store_dir(owner);
    match fs::remove_dir_all(&dir) {
      Ok(()) => {
        debug!(owner = %owner, "invalidated dependency records");
        Ok(())
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(source) => Err(StoreError::Invalidate { path: dir, source }),
    }
  }
}

/// Directory name of a target's store.
///
/// `%` and `/` are percent-escaped, as is a leading `.` so that store names
/// never clash with `.locks` or other dot entries of the metadata root.
fn store_dir_name(owner: &Target) -> String {
  let mut escaped = String::with_capacity(owner.name().len());
  for (idx, c) in owner.name().char_indices() {
    match c {
      '%' => escaped.push_str("%25"),
      '/' => escaped.push_str("%2F"),
      '.' if idx == 0 => escaped.push_str("%2E"),
      c => escaped.push(c),
    }
  }
  escaped
}

/// Every record file in `dir` with the paths it holds.
///
/// Subdirectories and files whose name is not a fingerprint are skipped.
fn read_record_files(dir: &Path) -> Result<Vec<(Fingerprint, Vec<String>)>, StoreError> {
  let to_error = |source| StoreError::ReadRecords {
    path: dir.to_path_buf(),
    source,
  };

  let mut files = Vec::new();
  for entry in fs::read_dir(dir).map_err(to_error)? {
    let entry = entry.map_err(to_error)?;
    if !entry.file_type().map_err(to_error)?.is_file() {
      continue;
    }

    let name = entry.file_name();
    let Some(fingerprint) = name.to_str().and_then(|n| n.parse::<Fingerprint>().ok()) else {
      warn!(path = %entry.path().display(), "skipping unrecognized file in dependency store");
      continue;
    };

    let paths = read_record(&entry.path())?;
    files.push((fingerprint, paths));
  }
  Ok(files)
}

fn read_record(path: &Path) -> Result<Vec<String>, StoreError> {
  match fs::read_to_string(path) {
    Ok(content) => Ok(content.lines().filter(|l| !l.is_empty()).map(str::to_string).collect()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
    Err(source) => Err(StoreError::ReadRecords {
      path: path.to_path_buf(),
      source,
    }),
  }
}

fn write_record(path: &Path, paths: &[String]) -> Result<(), StoreError> {
  let mut content = String::new();
  for p in paths {
    content.push_str(p);
    content.push('\n');
  }
  fs::write(path, content).map_err(|source| StoreError::WriteRecord {
    path: path.to_path_buf(),
    source,
  })
}

fn remove_record(path: &Path) -> Result<(), StoreError> {
  match fs::remove_file(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(source) => Err(StoreError::WriteRecord {
      path: path.to_path_buf(),
      source,
    }),
  }
}
