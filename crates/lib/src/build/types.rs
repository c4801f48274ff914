use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::deps::StoreError;
use crate::lock::TargetLockError;
use crate::staleness::StalenessError;
use crate::target::TargetError;

/// Which step of a build failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStage {
  Resolution,
  Evaluation,
  Execution,
  Commit,
  Metadata,
}

impl std::fmt::Display for BuildStage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      BuildStage::Resolution => "resolution",
      BuildStage::Evaluation => "evaluation",
      BuildStage::Execution => "execution",
      BuildStage::Commit => "commit",
      BuildStage::Metadata => "metadata",
    };
    f.write_str(name)
  }
}

/// Errors that abort the processing of one target.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error("invalid target: {0}")]
  Target(#[from] TargetError),

  /// No procedure resolves and no file exists.
  #[error("don't know how to build {target}")]
  Unresolved { target: String },

  /// The procedure ran and exited non-zero (or was killed).
  #[error("{procedure} failed for {target} ({})", describe_exit(*code))]
  ProcedureFailed {
    target: String,
    procedure: String,
    code: Option<i32>,
  },

  /// The procedure could not be started.
  #[error("failed to run {procedure} for {target}: {source}")]
  Spawn {
    target: String,
    procedure: String,
    #[source]
    source: io::Error,
  },

  #[error("dependency cycle: {}", chain.join(" -> "))]
  Cycle { chain: Vec<String> },

  #[error("dependency chain deeper than {limit} levels at {target}")]
  TooDeep { target: String, limit: usize },

  #[error("failed to prepare output for {target}: {source}")]
  PrepareOutput {
    target: String,
    #[source]
    source: io::Error,
  },

  #[error("{procedure} wrote to both stdout and $3 for {target}")]
  ConflictingOutputs { target: String, procedure: String },

  #[error("failed to commit output for {target}: {source}")]
  Commit {
    target: String,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Lock(#[from] TargetLockError),
}

impl From<StalenessError> for BuildError {
  fn from(err: StalenessError) -> Self {
    match err {
      StalenessError::Cycle { chain } => BuildError::Cycle { chain },
      StalenessError::TooDeep { target, limit } => BuildError::TooDeep { target, limit },
      StalenessError::Store(e) => BuildError::Store(e),
    }
  }
}

fn describe_exit(code: Option<i32>) -> String {
  match code {
    Some(code) => format!("exit code {}", code),
    None => "killed by signal".to_string(),
  }
}

impl BuildError {
  pub fn stage(&self) -> BuildStage {
    match self {
      BuildError::Target(_) | BuildError::Unresolved { .. } => BuildStage::Resolution,
      BuildError::Cycle { .. } | BuildError::TooDeep { .. } => BuildStage::Evaluation,
      BuildError::ProcedureFailed { .. } | BuildError::Spawn { .. } | BuildError::PrepareOutput { .. } => {
        BuildStage::Execution
      }
      BuildError::ConflictingOutputs { .. } | BuildError::Commit { .. } => BuildStage::Commit,
      BuildError::Store(_) | BuildError::Lock(_) => BuildStage::Metadata,
    }
  }
}

/// What a successful build produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Output {
  /// The target file was atomically replaced.
  Written { bytes: u64 },
  /// The procedure produced nothing; the target file was left alone.
  Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildStatus {
  /// Nothing changed since the last build.
  UpToDate,
  /// No procedure, existing file: a source.
  Source,
  Built { output: Output },
}

/// Result of one successful `build()`.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
  pub target: String,
  #[serde(flatten)]
  pub status: BuildStatus,
  /// Parent target this one was recorded as a dependency of.
  pub registered_with: Option<String>,
  /// Nesting depth of the request.
  pub depth: usize,
  pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
  /// Rebuild even when up to date.
  pub force: bool,
}

/// Outcome for one requested target.
#[derive(Debug)]
pub struct TargetResult {
  pub target: String,
  pub result: Result<BuildReport, BuildError>,
}

/// Results of building several requested targets in order.
#[derive(Debug, Default)]
pub struct BuildSummary {
  pub results: Vec<TargetResult>,
}

impl BuildSummary {
  pub fn is_success(&self) -> bool {
    self.results.iter().all(|r| r.result.is_ok())
  }

  pub fn failures(&self) -> impl Iterator<Item = (&str, &BuildError)> {
    self
      .results
      .iter()
      .filter_map(|r| r.result.as_ref().err().map(|e| (r.target.as_str(), e)))
  }

  pub fn built(&self) -> usize {
    self
      .results
      .iter()
      .filter(|r| matches!(r.result, Ok(BuildReport { status: BuildStatus::Built { .. }, .. })))
      .count()
  }
}
