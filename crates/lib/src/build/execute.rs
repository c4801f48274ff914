//! Build orchestration.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;

use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info, warn};

use crate::build::context::BuildContext;
use crate::build::procedure::{Invocation, ProcedureRunner, ShellRunner, engine_env};
use crate::build::{BuildError, BuildOptions, BuildReport, BuildStatus, BuildSummary, Output, TargetResult};
use crate::config::EngineConfig;
use crate::deps::{DependencyRecord, DependencyStore, StoreError};
use crate::lock::{LockScope, TargetLock};
use crate::resolve::{Procedure, ProcedureResolver};
use crate::staleness::{Freshness, StalenessError, StalenessEvaluator};
use crate::target::{Target, TargetError};

/// Marker between the target's file name and the random suffix of temp files.
const OUTPUT_TMP_TAG: &str = "redo-tmp";
const STDOUT_TMP_TAG: &str = "redo-out";
const TMP_RAND_LEN: usize = 6;

/// The build engine for one working directory.
pub struct Engine<R = ShellRunner> {
  config: EngineConfig,
  resolver: ProcedureResolver,
  store: DependencyStore,
  runner: R,
}

impl Engine<ShellRunner> {
  pub fn new(config: EngineConfig) -> Self {
    let runner = ShellRunner::new(config.shell.clone());
    Self::with_runner(config, runner)
  }
}

impl<R: ProcedureRunner> Engine<R> {
  pub fn with_runner(config: EngineConfig, runner: R) -> Self {
    Self {
      resolver: ProcedureResolver::new(config.root.clone(), config.procedure_suffix.clone()),
      store: DependencyStore::new(&config),
      config,
      runner,
    }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn store(&self) -> &DependencyStore {
    &self.store
  }

  pub fn resolver(&self) -> &ProcedureResolver {
    &self.resolver
  }

  /// Parse a target name relative to this engine's root.
  pub fn target(&self, raw: &str) -> Result<Target, TargetError> {
    self.target_in(&self.config.root, raw)
  }

  /// Parse a target name relative to `dir`, which must lie under the root.
  pub fn target_in(&self, dir: &Path, raw: &str) -> Result<Target, TargetError> {
    let target = Target::parse_in(&self.config.root, dir, raw)?;
    self.check_not_metadata(&target)?;
    Ok(target)
  }

  fn check_not_metadata(&self, target: &Target) -> Result<(), TargetError> {
    if target.path(&self.config.root).starts_with(&self.config.meta_dir) {
      return Err(TargetError::InMetaDir(target.name().to_string()));
    }
    Ok(())
  }

  pub fn staleness(&self) -> StalenessEvaluator<'_> {
    StalenessEvaluator::new(&self.store, &self.resolver, self.config.max_depth)
  }

  pub fn is_up_to_date(&self, target: &Target) -> Result<bool, StalenessError> {
    self.staleness().is_up_to_date(target)
  }

  pub fn evaluate(&self, target: &Target) -> Result<Freshness, StalenessError> {
    self.staleness().evaluate(target)
  }

  pub fn dependencies(&self, target: &Target) -> Result<Vec<DependencyRecord>, StoreError> {
    self.store.list(target)
  }

  /// Build each requested target in order, with relative names taken
  /// relative to `dir`.
  ///
  /// A failing target does not stop the ones after it.
  pub async fn build_all<S: AsRef<str>>(
    &self,
    dir: &Path,
    targets: &[S],
    ctx: &BuildContext,
    options: &BuildOptions,
  ) -> BuildSummary {
    let mut summary = BuildSummary::default();

    for raw in targets {
      let raw = raw.as_ref();
      let (name, result) = match self.target_in(dir, raw) {
        Ok(target) => (target.name().to_string(), self.build(&target, ctx, options).await),
        Err(e) => (raw.to_string(), Err(e.into())),
      };

      if let Err(e) = &result {
        debug!(name = %name, stage = %e.stage(), error = %e, "build failed");
      }
      summary.results.push(TargetResult { target: name, result });
    }

    summary
  }

  /// Bring `target` up to date.
  ///
  /// When `ctx` has a parent, the target is recorded as a dependency of that
  /// parent on every successful path, since the parent's records were cleared
  /// when its own build started.
  pub async fn build(
    &self,
    target: &Target,
    ctx: &BuildContext,
    options: &BuildOptions,
  ) -> Result<BuildReport, BuildError> {
    let start = Instant::now();

    self.check_not_metadata(target)?;
    if ctx.contains(target) {
      return Err(BuildError::Cycle {
        chain: ctx.chain_with(target),
      });
    }
    if ctx.depth() >= self.config.max_depth {
      return Err(BuildError::TooDeep {
        target: target.name().to_string(),
        limit: self.config.max_depth,
      });
    }

    let _lock = TargetLock::acquire(
      &self.config.locks_dir(),
      target,
      LockScope::Build,
      &format!("redo {}", target),
    )?;
    self.sweep_stale_outputs(target);

    let status = if !options.force && self.is_up_to_date(target)? {
      debug!(name = %target, "up to date");
      BuildStatus::UpToDate
    } else {
      self.rebuild(target, ctx).await?
    };

    let registered_with = self.register_with_parent(target, ctx)?;

    Ok(BuildReport {
      target: target.name().to_string(),
      status,
      registered_with,
      depth: ctx.depth(),
      elapsed_ms: start.elapsed().as_millis() as u64,
    })
  }

  async fn rebuild(&self, target: &Target, ctx: &BuildContext) -> Result<BuildStatus, BuildError> {
    self.store.invalidate(target)?;

    let Some(procedure) = self.resolver.resolve(target) else {
      if target.path(&self.config.root).exists() {
        debug!(name = %target, "no build procedure, treating as source");
        return Ok(BuildStatus::Source);
      }
      return Err(BuildError::Unresolved {
        target: target.name().to_string(),
      });
    };

    match self.execute(target, &procedure, ctx).await {
      Ok(output) => {
        info!(name = %target, procedure = %procedure.name, output = ?output, "built");
        Ok(BuildStatus::Built { output })
      }
      Err(e) => {
        // Records written before the failure would make the target look
        // fresh next time.
        if let Err(cleanup) = self.store.invalidate(target) {
          warn!(name = %target, error = %cleanup, "failed to discard records of failed build");
        }
        Err(e)
      }
    }
  }

  async fn execute(&self, target: &Target, procedure: &Procedure, ctx: &BuildContext) -> Result<Output, BuildError> {
    self.store.record(target, &procedure.name)?;

    let target_path = target.path(&self.config.root);
    let dir = target_path.parent().unwrap_or(self.config.root.as_path());
    let prepare = |source| BuildError::PrepareOutput {
      target: target.name().to_string(),
      source,
    };

    fs::create_dir_all(dir).map_err(prepare)?;
    let output = temp_output(dir, target, OUTPUT_TMP_TAG).map_err(prepare)?;
    let stdout = temp_output(dir, target, STDOUT_TMP_TAG).map_err(prepare)?;
    let stdout_handle = stdout.as_file().try_clone().map_err(prepare)?;

    let invocation = Invocation {
      procedure: procedure.path.clone(),
      target: target.name().to_string(),
      stem: target.stem().to_string(),
      output: output.path().to_path_buf(),
      cwd: self.config.root.clone(),
      context: ctx.child(target),
      env: engine_env(&self.config),
      stdout: stdout_handle,
    };

    let exit = self
      .runner
      .run(invocation)
      .await
      .map_err(|source| BuildError::Spawn {
        target: target.name().to_string(),
        procedure: procedure.name.name().to_string(),
        source,
      })?;

    if !exit.success() {
      warn!(name = %target, code = ?exit.code, "build procedure failed, keeping previous output");
      return Err(BuildError::ProcedureFailed {
        target: target.name().to_string(),
        procedure: procedure.name.name().to_string(),
        code: exit.code,
      });
    }

    self.commit(target, procedure, &target_path, output, stdout)
  }

  /// Move the produced output into place.
  ///
  /// The rename is atomic, so readers never see a partially written target.
  fn commit(
    &self,
    target: &Target,
    procedure: &Procedure,
    target_path: &Path,
    output: NamedTempFile,
    stdout: NamedTempFile,
  ) -> Result<Output, BuildError> {
    let commit_error = |source| BuildError::Commit {
      target: target.name().to_string(),
      source,
    };

    // The procedure may have removed or replaced $3, so go by path.
    let output_len = fs::metadata(output.path()).map(|m| m.len()).unwrap_or(0);
    let stdout_len = stdout.as_file().metadata().map_err(commit_error)?.len();

    let (file, bytes) = match (output_len > 0, stdout_len > 0) {
      (true, true) => {
        return Err(BuildError::ConflictingOutputs {
          target: target.name().to_string(),
          procedure: procedure.name.name().to_string(),
        });
      }
      (true, false) => (output, output_len),
      (false, true) => (stdout, stdout_len),
      (false, false) => {
        debug!(name = %target, "build produced no output, leaving target untouched");
        return Ok(Output::Empty);
      }
    };

    file.persist(target_path).map_err(|e| commit_error(e.error))?;
    Ok(Output::Written { bytes })
  }

  fn register_with_parent(&self, target: &Target, ctx: &BuildContext) -> Result<Option<String>, BuildError> {
    let Some(parent) = ctx.parent() else {
      return Ok(None);
    };

    if !target.path(&self.config.root).is_file() {
      debug!(name = %target, parent = %parent, "no file to register with parent");
      return Ok(None);
    }

    self.store.record(parent, target)?;
    Ok(Some(parent.name().to_string()))
  }

  /// Remove temp files left behind by builds that were killed.
  fn sweep_stale_outputs(&self, target: &Target) {
    let target_path = target.path(&self.config.root);
    let Some(dir) = target_path.parent() else {
      return;
    };
    let Ok(entries) = fs::read_dir(dir) else {
      return;
    };

    for entry in entries.flatten() {
      let name = entry.file_name();
      let Some(name) = name.to_str() else {
        continue;
      };
      if is_temp_output_of(name, target) {
        match fs::remove_file(entry.path()) {
          Ok(()) => debug!(path = %entry.path().display(), "removed stale temporary output"),
          Err(e) if e.kind() == io::ErrorKind::NotFound => {}
          Err(e) => warn!(path = %entry.path().display(), error = %e, "failed to remove stale temporary output"),
        }
      }
    }
  }
}

fn temp_prefix(target: &Target, tag: &str) -> String {
  format!(".{}.{}.", target.file_name(), tag)
}

fn temp_output(dir: &Path, target: &Target, tag: &str) -> io::Result<NamedTempFile> {
  let prefix = temp_prefix(target, tag);
  let mut builder = Builder::new();
  builder.prefix(&prefix).rand_bytes(TMP_RAND_LEN);

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    // The umask still applies, so this becomes the usual 0644.
    builder.permissions(fs::Permissions::from_mode(0o666));
  }

  builder.tempfile_in(dir)
}

fn is_temp_output_of(file_name: &str, target: &Target) -> bool {
  [OUTPUT_TMP_TAG, STDOUT_TMP_TAG].iter().any(|tag| {
    file_name
      .strip_prefix(&temp_prefix(target, tag))
      .is_some_and(|rest| rest.len() == TMP_RAND_LEN && rest.chars().all(|c| c.is_ascii_alphanumeric()))
  })
}
