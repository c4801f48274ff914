//! Implementation of `redo --deps`.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use redo_lib::build::Engine;

use crate::output::{self, OutputFormat, print_info, print_json, truncate_hash};

/// List the dependencies recorded by each target's last build.
pub fn cmd_deps(engine: &Engine, dir: &Path, targets: &[String], format: OutputFormat) -> Result<bool> {
  let root = &engine.config().root;
  let mut listing = Vec::new();

  for raw in targets {
    let target = engine.target_in(dir, raw)?;
    let records = engine
      .dependencies(&target)
      .with_context(|| format!("Failed to read dependency records of {}", target))?;

    if format.is_json() {
      let deps: Vec<_> = records
        .iter()
        .map(|r| json!({ "path": r.path, "fingerprint": r.fingerprint.as_str(), "current": r.is_current(root) }))
        .collect();
      listing.push(json!({ "target": target.name(), "dependencies": deps }));
      continue;
    }

    if records.is_empty() {
      print_info(0, target.name(), "(no recorded dependencies)");
      continue;
    }

    print_info(0, target.name(), "");
    for record in &records {
      let state = if record.is_current(root) { "" } else { " (changed)" };
      eprintln!(
        "    {} {} {}{}",
        output::symbols::INFO,
        truncate_hash(record.fingerprint.as_str()),
        record.path,
        state
      );
    }
  }

  if format.is_json() {
    print_json(&listing)?;
  }

  Ok(true)
}
