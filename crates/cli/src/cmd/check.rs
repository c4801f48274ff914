//! Implementation of `redo --check`.
//!
//! Reports why each target is or is not up to date without building anything.

use std::path::Path;

use anyhow::Result;
use serde_json::json;

use redo_lib::build::Engine;
use redo_lib::staleness::Freshness;

use crate::output::{OutputFormat, print_error, print_info, print_json, print_success};

/// Returns `true` only when every target is up to date.
pub fn cmd_check(engine: &Engine, dir: &Path, targets: &[String], format: OutputFormat) -> Result<bool> {
  let mut all_fresh = true;
  let mut results = Vec::new();

  for raw in targets {
    let verdict = engine
      .target_in(dir, raw)
      .map_err(|e| e.to_string())
      .and_then(|target| engine.evaluate(&target).map_err(|e| e.to_string()));

    match verdict {
      Ok(freshness) => {
        all_fresh &= freshness.is_up_to_date();
        if format.is_json() {
          results.push(json!({ "target": raw, "up_to_date": freshness.is_up_to_date(), "freshness": freshness }));
        } else {
          print_freshness(raw, &freshness);
        }
      }
      Err(e) => {
        all_fresh = false;
        if format.is_json() {
          results.push(json!({ "target": raw, "up_to_date": false, "error": e }));
        } else {
          print_error(0, &format!("{}: {}", raw, e));
        }
      }
    }
  }

  if format.is_json() {
    print_json(&results)?;
  }

  Ok(all_fresh)
}

fn print_freshness(target: &str, freshness: &Freshness) {
  if freshness.is_up_to_date() {
    print_success(0, target, "(up to date)");
  } else {
    print_info(0, target, &format!("({})", freshness));
  }
}
