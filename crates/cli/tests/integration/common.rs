//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated project directory.
pub struct TestEnv {
  _temp: TempDir,
  pub root: PathBuf,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();
    Self { _temp: temp, root }
  }

  /// Write a file relative to the project root.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.root.join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn read_file(&self, relative_path: &str) -> String {
    std::fs::read_to_string(self.root.join(relative_path))
      .unwrap_or_else(|e| panic!("Failed to read {}: {}", relative_path, e))
  }

  pub fn exists(&self, relative_path: &str) -> bool {
    self.root.join(relative_path).exists()
  }

  /// A `redo` command run from the project root, detached from any
  /// enclosing build.
  pub fn redo_cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("redo");
    cmd.current_dir(&self.root);
    for var in ["REDO_ROOT", "REDO_META_DIR", "REDO_PARENT", "REDO_STACK", "REDO_SHELL", "REDO_MAX_DEPTH", "RUST_LOG"] {
      cmd.env_remove(var);
    }
    cmd
  }

  /// Parse the JSON a `-o json` invocation printed.
  pub fn json_output(&self, args: &[&str]) -> serde_json::Value {
    let output = self.redo_cmd().args(["-o", "json"]).args(args).output().unwrap();
    serde_json::from_slice(&output.stdout).unwrap()
  }
}
