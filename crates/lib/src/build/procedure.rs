//! Running build procedures.
//!
//! The engine hands a procedure three positional arguments (target, stem,
//! private output path) and the build context, and only looks at the exit
//! status and the two output files afterwards. [`ProcedureRunner`] is that
//! seam; [`ShellRunner`] is the default implementation.

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::build::context::BuildContext;
use crate::consts::{ENV_EXE, ENV_META_DIR, ENV_ROOT};

/// Everything needed to run one build procedure.
#[derive(Debug)]
pub struct Invocation {
  /// Absolute path of the procedure file.
  pub procedure: PathBuf,
  /// `$1`: the target name.
  pub target: String,
  /// `$2`: the target name without its final extension.
  pub stem: String,
  /// `$3`: private temporary file for the output.
  pub output: PathBuf,
  /// Working directory.
  pub cwd: PathBuf,
  /// Context for builds the procedure requests; its parent is `target`.
  pub context: BuildContext,
  /// Variables to export in addition to the inherited environment.
  pub env: Vec<(String, String)>,
  /// Destination of the procedure's stdout.
  pub stdout: File,
}

/// How a procedure ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcedureExit {
  /// `None` when terminated by a signal.
  pub code: Option<i32>,
}

impl ProcedureExit {
  pub fn success(self) -> bool {
    self.code == Some(0)
  }
}

pub trait ProcedureRunner {
  /// Run the procedure to completion. `Err` means it could not be started.
  fn run(&self, invocation: Invocation) -> impl Future<Output = io::Result<ProcedureExit>>;
}

/// Runs procedures as shell scripts: `<shell> -e <procedure> $1 $2 $3`.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
  shell: Option<String>,
}

impl ShellRunner {
  pub fn new(shell: Option<String>) -> Self {
    Self { shell }
  }
}

impl ProcedureRunner for ShellRunner {
  async fn run(&self, invocation: Invocation) -> io::Result<ProcedureExit> {
    let (shell, shell_args) = get_shell(self.shell.as_deref());

    info!(
      procedure = %invocation.procedure.display(),
      name = %invocation.target,
      "running build procedure"
    );

    let mut command = Command::new(&shell);
    command
      .args(&shell_args)
      .arg(&invocation.procedure)
      .arg(&invocation.target)
      .arg(&invocation.stem)
      .arg(&invocation.output)
      .current_dir(&invocation.cwd)
      .stdin(Stdio::null())
      .stdout(Stdio::from(invocation.stdout))
      .stderr(Stdio::inherit());

    for (key, value) in invocation.context.to_env() {
      command.env(key, value);
    }
    for (key, value) in &invocation.env {
      command.env(key, value);
    }

    debug!(shell = %shell, cwd = ?invocation.cwd, "spawning process");

    let status = command.status().await?;
    let exit = ProcedureExit { code: status.code() };
    debug!(name = %invocation.target, code = ?exit.code, "build procedure exited");
    Ok(exit)
  }
}

/// Variables every procedure receives so nested invocations share the same
/// root and metadata directory.
pub fn engine_env(config: &crate::config::EngineConfig) -> Vec<(String, String)> {
  let mut env = vec![
    (ENV_ROOT.to_string(), config.root.to_string_lossy().into_owned()),
    (ENV_META_DIR.to_string(), config.meta_dir.to_string_lossy().into_owned()),
  ];
  if let Some(exe) = &config.redo_exe {
    env.push((ENV_EXE.to_string(), exe.to_string_lossy().into_owned()));
  }
  env
}

/// Shell and leading arguments.
///
/// `-e` makes the first failing command fail the whole procedure.
fn get_shell(override_shell: Option<&str>) -> (String, Vec<String>) {
  if let Some(shell) = override_shell {
    return (shell.to_string(), vec!["-e".to_string()]);
  }

  #[cfg(unix)]
  {
    ("/bin/sh".to_string(), vec!["-e".to_string()])
  }

  #[cfg(windows)]
  {
    ("sh".to_string(), vec!["-e".to_string()])
  }
}
