//! Build procedure discovery.
//!
//! A target's procedure is found by naming convention, first match wins:
//!
//! 1. `<target>.<suffix>`
//! 2. `default.<extension>.<suffix>` in the target's directory, only when the
//!    target has an extension
//!
//! Absence is a normal outcome, never an error.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::trace;

use crate::consts::DEFAULT_PROCEDURE_STEM;
use crate::target::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcedureKind {
  /// Written for exactly this target.
  Exact,
  /// Fallback shared by every target with the same extension.
  Default,
}

/// A resolved build procedure bound to its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Procedure {
  /// The procedure file as a target name, so it can be recorded as a dependency.
  pub name: Target,
  pub path: PathBuf,
  pub kind: ProcedureKind,
}

#[derive(Debug, Clone)]
pub struct ProcedureResolver {
  root: PathBuf,
  suffix: String,
}

impl ProcedureResolver {
  pub fn new(root: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
    Self {
      root: root.into(),
      suffix: suffix.into(),
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn resolve(&self, target: &Target) -> Option<Procedure> {
    let exact = target.sibling(&format!("{}.{}", target.file_name(), self.suffix));
    if let Some(procedure) = self.existing(exact, ProcedureKind::Exact) {
      return Some(procedure);
    }

    let ext = target.extension().filter(|ext| !ext.is_empty())?;
    let fallback = target.sibling(&format!("{}.{}.{}", DEFAULT_PROCEDURE_STEM, ext, self.suffix));
    self.existing(fallback, ProcedureKind::Default)
  }

  /// Whether a procedure resolves for `target`.
  pub fn is_buildable(&self, target: &Target) -> bool {
    self.resolve(target).is_some()
  }

  fn existing(&self, name: Target, kind: ProcedureKind) -> Option<Procedure> {
    let path = name.path(&self.root);
    if path.is_file() {
      trace!(procedure = %name, "found build procedure");
      Some(Procedure { name, path, kind })
    } else {
      None
    }
  }
}
