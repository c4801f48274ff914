//! Target names.
//!
//! A target is identified by a path relative to the engine's working
//! directory. Names are normalized to `/`-separated relative paths so that the
//! same file always maps to the same dependency store and lock.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::consts::STACK_SEPARATOR;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
  #[error("empty target name")]
  Empty,

  #[error("target {0:?} is outside the working directory")]
  OutsideRoot(String),

  #[error("target {0:?} is not valid UTF-8")]
  NotUtf8(String),

  #[error("target {0:?} contains a newline")]
  Newline(String),

  #[error("target {0:?} is inside the metadata directory")]
  InMetaDir(String),
}

/// A normalized target name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Target {
  name: String,
}

impl Target {
  /// Parse a target as given on the command line or by a build procedure.
  ///
  /// Relative names are taken relative to `root`. Absolute paths are accepted
  /// only when they live under `root`.
  pub fn parse(root: &Path, raw: &str) -> Result<Self, TargetError> {
    Self::parse_in(root, root, raw)
  }

  /// Like [`Target::parse`], but relative names are taken relative to `dir`,
  /// the directory the request was made from.
  ///
  /// `..` is resolved lexically and may not climb above `root`.
  pub fn parse_in(root: &Path, dir: &Path, raw: &str) -> Result<Self, TargetError> {
    if raw.is_empty() {
      return Err(TargetError::Empty);
    }
    if raw.contains(STACK_SEPARATOR) {
      return Err(TargetError::Newline(raw.to_string()));
    }

    let path = dir.join(raw);
    let relative = if path.is_absolute() {
      path
        .strip_prefix(root)
        .map_err(|_| TargetError::OutsideRoot(raw.to_string()))?
    } else {
      path.as_path()
    };

    let mut parts: Vec<&str> = Vec::new();
    for component in relative.components() {
      match component {
        Component::CurDir => {}
        Component::Normal(part) => {
          let part = part.to_str().ok_or_else(|| TargetError::NotUtf8(raw.to_string()))?;
          parts.push(part);
        }
        Component::ParentDir => {
          if parts.pop().is_none() {
            return Err(TargetError::OutsideRoot(raw.to_string()));
          }
        }
        Component::RootDir | Component::Prefix(_) => {
          return Err(TargetError::OutsideRoot(raw.to_string()));
        }
      }
    }

    if parts.is_empty() {
      return Err(TargetError::Empty);
    }

    Ok(Target { name: parts.join("/") })
  }

  /// Parse a name that is already relative to the working directory, such as
  /// a path stored in a dependency record.
  pub fn from_relative(name: &str) -> Result<Self, TargetError> {
    if Path::new(name).is_absolute() {
      return Err(TargetError::OutsideRoot(name.to_string()));
    }
    Self::parse(Path::new(""), name)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Location of the target's file.
  pub fn path(&self, root: &Path) -> PathBuf {
    root.join(&self.name)
  }

  pub fn file_name(&self) -> &str {
    self.name.rsplit('/').next().unwrap_or(&self.name)
  }

  /// Directory part of the name, if the target is not at the top level.
  pub fn dir(&self) -> Option<&str> {
    self.name.rfind('/').map(|idx| &self.name[..idx])
  }

  /// Substring after the final `.` of the file name.
  ///
  /// Dotfiles such as `.profile` have no extension.
  pub fn extension(&self) -> Option<&str> {
    let file_name = self.file_name();
    match file_name.rfind('.') {
      Some(0) | None => None,
      Some(idx) => Some(&file_name[idx + 1..]),
    }
  }

  /// The full name without its final extension.
  pub fn stem(&self) -> &str {
    match self.extension() {
      Some(ext) => &self.name[..self.name.len() - ext.len() - 1],
      None => &self.name,
    }
  }

  /// A sibling target in the same directory.
  pub fn sibling(&self, file_name: &str) -> Target {
    let name = match self.dir() {
      Some(dir) => format!("{}/{}", dir, file_name),
      None => file_name.to_string(),
    };
    Target { name }
  }
}

impl fmt::Display for Target {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.name)
  }
}
