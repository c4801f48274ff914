//! CLI output formatting utilities.
//!
//! Human-readable output goes to stderr with colored status symbols, so a
//! nested `redo` never writes into the stdout its parent build captures.
//! JSON goes to stdout and is only produced when asked for.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const INFO: &str = "•";
}

pub fn truncate_hash(hash: &str) -> &str {
  let len = hash.len().min(12);
  &hash[..len]
}

pub fn format_bytes(bytes: u64) -> String {
  const KB: u64 = 1024;
  const MB: u64 = KB * 1024;
  const GB: u64 = MB * 1024;

  if bytes >= GB {
    format!("{:.1} GB", bytes as f64 / GB as f64)
  } else if bytes >= MB {
    format!("{:.1} MB", bytes as f64 / MB as f64)
  } else if bytes >= KB {
    format!("{:.1} KB", bytes as f64 / KB as f64)
  } else {
    format!("{} B", bytes)
  }
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    format!("{}m {}s", secs / 60, secs % 60)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

fn indent(depth: usize) -> String {
  "  ".repeat(depth)
}

pub fn print_success(depth: usize, message: &str, detail: &str) {
  eprintln!(
    "{}{} {} {}",
    indent(depth),
    symbols::SUCCESS.if_supports_color(Stream::Stderr, |s| s.green()),
    message,
    detail.if_supports_color(Stream::Stderr, |s| s.dimmed())
  );
}

pub fn print_error(depth: usize, message: &str) {
  eprintln!(
    "{}{} {}",
    indent(depth),
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_info(depth: usize, message: &str, detail: &str) {
  eprintln!(
    "{}{} {} {}",
    indent(depth),
    symbols::INFO.if_supports_color(Stream::Stderr, |s| s.blue()),
    message,
    detail.if_supports_color(Stream::Stderr, |s| s.dimmed())
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
