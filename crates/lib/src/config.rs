//! Engine configuration.
//!
//! Every setting has a default derived from the working directory and can be
//! overridden through `REDO_*` environment variables, which is also how nested
//! invocations inherit the settings of the build that spawned them.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::consts::{
  DEFAULT_MAX_DEPTH, DEFAULT_PROCEDURE_SUFFIX, ENV_MAX_DEPTH, ENV_META_DIR, ENV_ROOT, ENV_SHELL, LOCKS_DIR_NAME,
  META_DIR_NAME,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
  /// Working directory that target names are relative to.
  pub root: PathBuf,

  /// Metadata root holding one dependency store per target.
  pub meta_dir: PathBuf,

  /// Suffix of build procedure files (`<target>.<suffix>`).
  pub procedure_suffix: String,

  /// Interpreter for build procedures. `None` uses the platform default.
  pub shell: Option<String>,

  /// Maximum nesting of staleness walks and nested builds.
  pub max_depth: usize,

  /// Engine binary exported to procedures as `$REDO`.
  pub redo_exe: Option<PathBuf>,
}

impl EngineConfig {
  /// Configuration with defaults for the given working directory.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    let root = root.into();
    Self {
      meta_dir: root.join(META_DIR_NAME),
      root,
      procedure_suffix: DEFAULT_PROCEDURE_SUFFIX.to_string(),
      shell: None,
      max_depth: DEFAULT_MAX_DEPTH,
      redo_exe: None,
    }
  }

  /// Configuration for `dir`, with environment overrides applied.
  ///
  /// `REDO_ROOT` replaces `dir` entirely, so nested invocations keep using the
  /// root of the outermost build. The root is canonicalized when it exists.
  pub fn from_env(dir: &Path) -> Self {
    let root = std::env::var_os(ENV_ROOT)
      .filter(|v| !v.is_empty())
      .map(PathBuf::from)
      .unwrap_or_else(|| dir.to_path_buf());
    let root = dunce::canonicalize(&root).unwrap_or(root);

    let mut config = Self::new(root);

    if let Some(meta) = std::env::var_os(ENV_META_DIR).filter(|v| !v.is_empty()) {
      config.meta_dir = config.root.join(PathBuf::from(meta));
    }

    if let Ok(shell) = std::env::var(ENV_SHELL)
      && !shell.is_empty()
    {
      config.shell = Some(shell);
    }

    if let Ok(raw) = std::env::var(ENV_MAX_DEPTH) {
      match raw.parse::<usize>() {
        Ok(depth) if depth > 0 => config.max_depth = depth,
        _ => warn!(value = %raw, default = DEFAULT_MAX_DEPTH, "ignoring invalid {}", ENV_MAX_DEPTH),
      }
    }

    config
  }

  pub fn with_redo_exe(mut self, exe: Option<PathBuf>) -> Self {
    self.redo_exe = exe;
    self
  }

  pub fn locks_dir(&self) -> PathBuf {
    self.meta_dir.join(LOCKS_DIR_NAME)
  }
}
