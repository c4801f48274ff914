//! Test helpers for redo-lib.
//!
//! [`Workspace`] wraps a temporary project root. [`NestingRunner`] stands in
//! for procedures that call back into the engine, which in the real tool
//! happens through a child `redo` process.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tempfile::TempDir;

use crate::build::{
  BuildError, BuildOptions, BuildReport, Engine, Invocation, ProcedureExit, ProcedureRunner, ShellRunner,
};
use crate::config::EngineConfig;

pub struct Workspace {
  _dir: TempDir,
  root: PathBuf,
}

impl Workspace {
  pub fn new() -> Self {
    let dir = TempDir::new().unwrap();
    let root = dunce::canonicalize(dir.path()).unwrap();
    Self { _dir: dir, root }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn path(&self, rel: &str) -> PathBuf {
    self.root.join(rel)
  }

  pub fn write(&self, rel: &str, content: &str) {
    let path = self.path(rel);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
  }

  pub fn read(&self, rel: &str) -> String {
    fs::read_to_string(self.path(rel)).unwrap()
  }

  pub fn config(&self) -> EngineConfig {
    EngineConfig::new(self.root.clone())
  }

  pub fn engine(&self) -> Engine {
    Engine::new(self.config())
  }

  /// An engine whose procedures first build the listed dependencies.
  pub fn nesting_engine(&self, nested: &[(&str, &[&str])]) -> Engine<NestingRunner> {
    let runner = NestingRunner {
      inner: ShellRunner::default(),
      config: self.config(),
      nested: nested
        .iter()
        .map(|(target, deps)| (target.to_string(), deps.iter().map(|d| d.to_string()).collect()))
        .collect(),
    };
    Engine::with_runner(self.config(), runner)
  }

  /// File name to content for every file directly in `dir`.
  pub fn snapshot_dir(&self, dir: &Path) -> BTreeMap<String, String> {
    fs::read_dir(dir)
      .unwrap()
      .flatten()
      .filter(|e| e.path().is_file())
      .map(|e| {
        (
          e.file_name().to_string_lossy().into_owned(),
          fs::read_to_string(e.path()).unwrap(),
        )
      })
      .collect()
  }

  /// Temp outputs left in the root directory.
  pub fn leftover_temps(&self) -> Vec<String> {
    fs::read_dir(&self.root)
      .unwrap()
      .flatten()
      .map(|e| e.file_name().to_string_lossy().into_owned())
      .filter(|name| name.contains(".redo-tmp.") || name.contains(".redo-out."))
      .collect()
  }
}

/// Builds the configured dependencies of a target in-process, then runs its
/// procedure with [`ShellRunner`].
#[derive(Clone)]
pub struct NestingRunner {
  inner: ShellRunner,
  config: EngineConfig,
  nested: HashMap<String, Vec<String>>,
}

type BoxedBuild<'a> = Pin<Box<dyn Future<Output = Result<BuildReport, BuildError>> + 'a>>;

impl ProcedureRunner for NestingRunner {
  async fn run(&self, invocation: Invocation) -> io::Result<ProcedureExit> {
    if let Some(deps) = self.nested.get(&invocation.target) {
      let engine = Engine::with_runner(self.config.clone(), self.clone());
      let options = BuildOptions::default();
      for dep in deps {
        let target = engine.target(dep).map_err(io::Error::other)?;
        // Boxed to break the recursive future type.
        let build: BoxedBuild<'_> = Box::pin(engine.build(&target, &invocation.context, &options));
        if build.await.is_err() {
          return Ok(ProcedureExit { code: Some(1) });
        }
      }
    }
    self.inner.run(invocation).await
  }
}
