//! redo-lib: an incremental build engine in the redo family.
//!
//! Targets are built by running `.do` procedures. While a procedure runs, every
//! target it asks for is recorded as a dependency together with a content
//! fingerprint, so the next build can tell exactly what changed:
//! - `Target`: a root-relative file name that can be built
//! - `ProcedureResolver`: finds `<target>.do` or `default.<ext>.do`
//! - `DependencyStore`: per-target records under `.redo/`
//! - `StalenessEvaluator`: the recursive up-to-date check
//! - `Engine`: runs procedures and commits their output atomically

pub mod build;
pub mod config;
pub mod consts;
pub mod deps;
pub mod lock;
pub mod resolve;
pub mod staleness;
pub mod target;
pub mod util;
