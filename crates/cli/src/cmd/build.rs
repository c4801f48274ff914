//! Implementation of the default `redo <targets>` command.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;

use redo_lib::build::{BuildContext, BuildOptions, BuildReport, BuildStatus, Engine, Output};

use crate::output::{format_bytes, format_duration, print_error, print_info, print_json, print_success};

/// Build every target in order. Returns whether all of them succeeded.
pub fn cmd_build(
  engine: &Engine,
  dir: &Path,
  targets: &[String],
  ctx: &BuildContext,
  options: &BuildOptions,
  format: crate::output::OutputFormat,
) -> Result<bool> {
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let summary = rt.block_on(engine.build_all(dir, targets, ctx, options));

  if format.is_json() {
    let results: Vec<_> = summary
      .results
      .iter()
      .map(|r| match &r.result {
        Ok(report) => json!({ "ok": true, "report": report }),
        Err(e) => json!({ "ok": false, "target": r.target, "stage": e.stage(), "error": e.to_string() }),
      })
      .collect();
    print_json(&json!({ "success": summary.is_success(), "results": results }))?;
  } else {
    for r in &summary.results {
      match &r.result {
        Ok(report) => print_report(report),
        Err(e) => print_error(ctx.depth(), &format!("{}: {} ({} failed)", r.target, e, e.stage())),
      }
    }
  }

  Ok(summary.is_success())
}

fn print_report(report: &BuildReport) {
  let elapsed = format_duration(Duration::from_millis(report.elapsed_ms));
  match report.status {
    BuildStatus::Built {
      output: Output::Written { bytes },
    } => print_success(
      report.depth,
      &report.target,
      &format!("(built, {} in {})", format_bytes(bytes), elapsed),
    ),
    BuildStatus::Built { output: Output::Empty } => {
      print_success(report.depth, &report.target, &format!("(built, no output, in {})", elapsed))
    }
    BuildStatus::UpToDate => print_info(report.depth, &report.target, "(up to date)"),
    BuildStatus::Source => print_info(report.depth, &report.target, "(source)"),
  }
}
