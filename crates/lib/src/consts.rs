//! Names and defaults shared across the engine.

pub const APP_NAME: &str = "redo";

/// Metadata root, relative to the working directory.
pub const META_DIR_NAME: &str = ".redo";

/// Subdirectory of the metadata root holding per-target lock files.
pub const LOCKS_DIR_NAME: &str = ".locks";

pub const DEFAULT_PROCEDURE_SUFFIX: &str = "do";

/// Base name of extension-keyed fallback procedures (`default.<ext>.do`).
pub const DEFAULT_PROCEDURE_STEM: &str = "default";

pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Length of the hex prefix used to key lock files.
pub const LOCK_KEY_LEN: usize = 20;

pub const ENV_ROOT: &str = "REDO_ROOT";
pub const ENV_META_DIR: &str = "REDO_META_DIR";
pub const ENV_SHELL: &str = "REDO_SHELL";
pub const ENV_MAX_DEPTH: &str = "REDO_MAX_DEPTH";
pub const ENV_PARENT: &str = "REDO_PARENT";
pub const ENV_STACK: &str = "REDO_STACK";
pub const ENV_EXE: &str = "REDO";

/// Separator between ancestor names in `REDO_STACK`.
pub const STACK_SEPARATOR: char = '\n';
