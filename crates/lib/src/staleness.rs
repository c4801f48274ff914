//! Up-to-date evaluation over the recorded dependency graph.
//!
//! A target is fresh when it has a dependency store and every recorded
//! dependency still has its recorded fingerprint. Dependencies that are
//! themselves buildable must be fresh as well, so staleness propagates through
//! the graph discovered by earlier builds. Evaluation never writes.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::deps::{DependencyStore, StoreError};
use crate::resolve::ProcedureResolver;
use crate::target::Target;
use crate::util::hash::{Fingerprint, fingerprint_file};

/// Verdict of a staleness check, with the reason when stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "dependency", rename_all = "snake_case")]
pub enum Freshness {
  UpToDate,
  /// No dependency store: never built with tracked dependencies.
  NeverBuilt,
  /// A recorded dependency can no longer be read.
  MissingDependency(String),
  /// A recorded dependency's content changed since the last build.
  ChangedDependency(String),
  /// A buildable dependency is itself stale.
  StaleDependency(String),
  /// A record names a path that cannot be a target.
  CorruptRecord(String),
}

impl Freshness {
  pub fn is_up_to_date(&self) -> bool {
    matches!(self, Freshness::UpToDate)
  }
}

impl std::fmt::Display for Freshness {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Freshness::UpToDate => write!(f, "up to date"),
      Freshness::NeverBuilt => write!(f, "never built"),
      Freshness::MissingDependency(dep) => write!(f, "dependency {} is missing", dep),
      Freshness::ChangedDependency(dep) => write!(f, "dependency {} changed", dep),
      Freshness::StaleDependency(dep) => write!(f, "dependency {} is stale", dep),
      Freshness::CorruptRecord(dep) => write!(f, "unusable dependency record {:?}", dep),
    }
  }
}

#[derive(Debug, Error)]
pub enum StalenessError {
  #[error("dependency cycle: {}", chain.join(" -> "))]
  Cycle { chain: Vec<String> },

  #[error("dependency chain deeper than {limit} levels at {target}")]
  TooDeep { target: String, limit: usize },

  #[error(transparent)]
  Store(#[from] StoreError),
}

enum Visit {
  InProgress,
  Done(Freshness),
}

/// State of one evaluation.
///
/// Results and fingerprints are cached only for the duration of a walk, so a
/// later walk always sees the current file contents.
#[derive(Default)]
struct Walk {
  visits: HashMap<Target, Visit>,
  stack: Vec<Target>,
  fingerprints: HashMap<Target, Option<Fingerprint>>,
}

impl Walk {
  fn fingerprint(&mut self, root: &Path, target: &Target) -> Option<Fingerprint> {
    self
      .fingerprints
      .entry(target.clone())
      .or_insert_with(|| fingerprint_file(&target.path(root)).ok())
      .clone()
  }

  fn chain_to(&self, target: &Target) -> Vec<String> {
    let start = self.stack.iter().position(|t| t == target).unwrap_or(0);
    self.stack[start..]
      .iter()
      .chain(std::iter::once(target))
      .map(|t| t.name().to_string())
      .collect()
  }
}

pub struct StalenessEvaluator<'a> {
  store: &'a DependencyStore,
  resolver: &'a ProcedureResolver,
  max_depth: usize,
}

impl<'a> StalenessEvaluator<'a> {
  pub fn new(store: &'a DependencyStore, resolver: &'a ProcedureResolver, max_depth: usize) -> Self {
    Self {
      store,
      resolver,
      max_depth,
    }
  }

  pub fn is_up_to_date(&self, target: &Target) -> Result<bool, StalenessError> {
    Ok(self.evaluate(target)?.is_up_to_date())
  }

  /// Evaluate `target` and explain the verdict.
  pub fn evaluate(&self, target: &Target) -> Result<Freshness, StalenessError> {
    let mut walk = Walk::default();
    let freshness = self.visit(target, &mut walk)?;
    debug!(name = %target, freshness = %freshness, "evaluated staleness");
    Ok(freshness)
  }

  fn visit(&self, target: &Target, walk: &mut Walk) -> Result<Freshness, StalenessError> {
    match walk.visits.get(target) {
      Some(Visit::Done(freshness)) => return Ok(freshness.clone()),
      Some(Visit::InProgress) => {
        return Err(StalenessError::Cycle {
          chain: walk.chain_to(target),
        });
      }
      None => {}
    }

    if walk.stack.len() >= self.max_depth {
      return Err(StalenessError::TooDeep {
        target: target.name().to_string(),
        limit: self.max_depth,
      });
    }

    walk.visits.insert(target.clone(), Visit::InProgress);
    walk.stack.push(target.clone());
    let result = self.check_records(target, walk);
    walk.stack.pop();

    match &result {
      Ok(freshness) => {
        walk.visits.insert(target.clone(), Visit::Done(freshness.clone()));
      }
      Err(_) => {
        walk.visits.remove(target);
      }
    }
    result
  }

  fn check_records(&self, target: &Target, walk: &mut Walk) -> Result<Freshness, StalenessError> {
    if !self.store.exists(target) {
      return Ok(Freshness::NeverBuilt);
    }

    let root = self.resolver.root();
    for record in self.store.list(target)? {
      let Ok(dependency) = Target::from_relative(&record.path) else {
        warn!(owner = %target, path = %record.path, "dependency record names an invalid path");
        return Ok(Freshness::CorruptRecord(record.path));
      };

      match walk.fingerprint(root, &dependency) {
        None => return Ok(Freshness::MissingDependency(record.path)),
        Some(current) if current != record.fingerprint => {
          return Ok(Freshness::ChangedDependency(record.path));
        }
        Some(_) => {}
      }

      if self.resolver.is_buildable(&dependency) && !self.visit(&dependency, walk)?.is_up_to_date() {
        return Ok(Freshness::StaleDependency(record.path));
      }
    }

    Ok(Freshness::UpToDate)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::EngineConfig;
  use std::fs;
  use tempfile::TempDir;

  struct Fixture {
    temp: TempDir,
    store: DependencyStore,
    resolver: ProcedureResolver,
  }

  impl Fixture {
    fn new() -> Self {
      let temp = TempDir::new().unwrap();
      let config = EngineConfig::new(temp.path());
      Self {
        store: DependencyStore::new(&config),
        resolver: ProcedureResolver::new(temp.path(), "do"),
        temp,
      }
    }

    fn write(&self, name: &str, content: &str) {
      fs::write(self.temp.path().join(name), content).unwrap();
    }

    fn record(&self, owner: &str, dep: &str) {
      self.store.record(&t(owner), &t(dep)).unwrap();
    }

    fn evaluator(&self) -> StalenessEvaluator<'_> {
      StalenessEvaluator::new(&self.store, &self.resolver, 16)
    }
  }

  fn t(name: &str) -> Target {
    Target::from_relative(name).unwrap()
  }

  #[test]
  fn never_built_is_stale() {
    let fx = Fixture::new();
    fx.write("a.out", "old");
    assert_eq!(fx.evaluator().evaluate(&t("a.out")).unwrap(), Freshness::NeverBuilt);
  }

  #[test]
  fn unchanged_dependencies_are_up_to_date() {
    let fx = Fixture::new();
    fx.write("a.src", "source");
    fx.write("a.out.do", "cat a.src");
    fx.record("a.out", "a.out.do");
    fx.record("a.out", "a.src");

    assert!(fx.evaluator().is_up_to_date(&t("a.out")).unwrap());
  }

  #[test]
  fn empty_store_is_up_to_date() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.store.store_dir(&t("a.out"))).unwrap();
    assert!(fx.evaluator().is_up_to_date(&t("a.out")).unwrap());
  }

  #[test]
  fn changed_dependency_is_stale() {
    let fx = Fixture::new();
    fx.write("a.src", "v1");
    fx.record("a.out", "a.src");
    fx.write("a.src", "v2");

    assert_eq!(
      fx.evaluator().evaluate(&t("a.out")).unwrap(),
      Freshness::ChangedDependency("a.src".to_string())
    );
  }

  #[test]
  fn missing_dependency_is_stale() {
    let fx = Fixture::new();
    fx.write("a.src", "v1");
    fx.record("a.out", "a.src");
    fs::remove_file(fx.temp.path().join("a.src")).unwrap();

    assert_eq!(
      fx.evaluator().evaluate(&t("a.out")).unwrap(),
      Freshness::MissingDependency("a.src".to_string())
    );
  }

  #[test]
  fn staleness_is_transitive() {
    let fx = Fixture::new();
    fx.write("s.src", "v1");
    fx.write("b.gen.do", "cat s.src");
    fx.write("b.gen", "generated");
    fx.record("b.gen", "b.gen.do");
    fx.record("b.gen", "s.src");
    fx.write("a.out.do", "cat b.gen");
    fx.record("a.out", "a.out.do");
    fx.record("a.out", "b.gen");

    assert!(fx.evaluator().is_up_to_date(&t("a.out")).unwrap());

    fx.write("s.src", "v2");
    assert_eq!(
      fx.evaluator().evaluate(&t("a.out")).unwrap(),
      Freshness::StaleDependency("b.gen".to_string())
    );
  }

  #[test]
  fn source_dependencies_are_not_recursed() {
    let fx = Fixture::new();
    fx.write("a.src", "v1");
    fx.record("a.out", "a.src");

    // a.src has no store of its own, but it is not buildable either.
    assert!(fx.evaluator().is_up_to_date(&t("a.out")).unwrap());
  }

  #[test]
  fn cycle_is_an_error() {
    let fx = Fixture::new();
    fx.write("a.do", "");
    fx.write("b.do", "");
    fx.write("a", "a");
    fx.write("b", "b");
    fx.record("a", "b");
    fx.record("b", "a");

    let err = fx.evaluator().evaluate(&t("a")).unwrap_err();
    match err {
      StalenessError::Cycle { chain } => assert_eq!(chain, vec!["a", "b", "a"]),
      other => panic!("expected cycle, got {other:?}"),
    }
  }

  #[test]
  fn depth_guard_trips() {
    let fx = Fixture::new();
    for i in 0..20 {
      fx.write(&format!("t{i}.do"), "");
      fx.write(&format!("t{i}"), "x");
    }
    for i in 0..19 {
      fx.record(&format!("t{i}"), &format!("t{}", i + 1));
    }

    let err = fx.evaluator().evaluate(&t("t0")).unwrap_err();
    assert!(matches!(err, StalenessError::TooDeep { limit: 16, .. }));
  }

  #[test]
  fn diamond_is_not_a_cycle() {
    let fx = Fixture::new();
    for name in ["top", "left", "right", "base"] {
      fx.write(&format!("{name}.do"), "");
      fx.write(name, name);
    }
    fx.write("base.src", "x");
    fx.record("base", "base.src");
    fx.record("left", "base");
    fx.record("right", "base");
    fx.record("top", "left");
    fx.record("top", "right");

    assert!(fx.evaluator().is_up_to_date(&t("top")).unwrap());
  }

  #[test]
  fn corrupt_record_is_stale() {
    let fx = Fixture::new();
    let dir = fx.store.store_dir(&t("a.out"));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(crate::util::hash::fingerprint_bytes(b"x").as_str()), "../escape\n").unwrap();

    assert_eq!(
      fx.evaluator().evaluate(&t("a.out")).unwrap(),
      Freshness::CorruptRecord("../escape".to_string())
    );
  }

  #[test]
  fn evaluation_does_not_write() {
    let fx = Fixture::new();
    fx.write("a.src", "v1");
    fx.record("a.out", "a.src");
    let dir = fx.store.store_dir(&t("a.out"));
    let before: Vec<_> = fs::read_dir(&dir).unwrap().map(|e| e.unwrap().file_name()).collect();

    fx.write("a.src", "v2");
    assert!(!fx.evaluator().is_up_to_date(&t("a.out")).unwrap());

    let after: Vec<_> = fs::read_dir(&dir).unwrap().map(|e| e.unwrap().file_name()).collect();
    assert_eq!(before, after);
  }
}
