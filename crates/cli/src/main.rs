mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use redo_lib::build::{BuildContext, BuildOptions, Engine};
use redo_lib::config::EngineConfig;

use crate::cmd::{cmd_build, cmd_check, cmd_deps};
use crate::output::{OutputFormat, print_error};

/// redo - build targets from `.do` scripts, rebuilding only what changed
#[derive(Parser)]
#[command(name = "redo")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Targets to build, relative to the working directory
  #[arg(required = true)]
  targets: Vec<String>,

  /// Rebuild the named targets even if they are up to date
  #[arg(short, long)]
  force: bool,

  /// Only report whether each target is up to date
  #[arg(long, conflicts_with_all = ["deps", "force"])]
  check: bool,

  /// List the recorded dependencies of each target
  #[arg(long, conflicts_with = "force")]
  deps: bool,

  /// Run as if started in DIR
  #[arg(short = 'C', long, value_name = "DIR")]
  directory: Option<PathBuf>,

  /// Enable debug logging
  #[arg(short, long)]
  verbose: bool,

  /// Output format
  #[arg(short, long, value_enum, default_value_t)]
  output: OutputFormat,
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  match run(cli) {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::FAILURE,
    Err(e) => {
      print_error(0, &format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}

/// Logs go to stderr; stdout may be the output of an enclosing build.
fn init_tracing(verbose: bool) {
  let filter = if verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn run(cli: Cli) -> Result<bool> {
  let dir = match &cli.directory {
    Some(dir) => dunce::canonicalize(dir).with_context(|| format!("Cannot enter directory {}", dir.display()))?,
    None => {
      let cwd = std::env::current_dir().context("Cannot determine working directory")?;
      dunce::canonicalize(&cwd).unwrap_or(cwd)
    }
  };

  let config = EngineConfig::from_env(&dir).with_redo_exe(std::env::current_exe().ok());
  let ctx = BuildContext::from_env(&config.root).context("Invalid build context in environment")?;
  debug!(root = %config.root.display(), depth = ctx.depth(), "starting");
  let engine = Engine::new(config);

  // Names are relative to where redo was started, even when a nested
  // invocation inherits the outer root.
  if cli.check {
    return cmd_check(&engine, &dir, &cli.targets, cli.output);
  }
  if cli.deps {
    return cmd_deps(&engine, &dir, &cli.targets, cli.output);
  }

  let options = BuildOptions { force: cli.force };
  cmd_build(&engine, &dir, &cli.targets, &ctx, &options, cli.output)
}
