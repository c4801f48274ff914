//! Building targets.
//!
//! A build checks whether the target is stale, and if so clears its old
//! dependency records, runs its procedure, atomically commits the output and
//! registers the target with the build that requested it.
//!
//! # Submodules
//!
//! - [`context`] - the explicit "currently building" context
//! - [`execute`] - the [`Engine`] driving each build
//! - [`procedure`] - running procedures behind the [`ProcedureRunner`] seam

pub mod context;
pub mod execute;
pub mod procedure;
mod types;

pub use context::BuildContext;
pub use execute::Engine;
pub use procedure::{Invocation, ProcedureExit, ProcedureRunner, ShellRunner};
pub use types::*;
