mod build;
mod check;
mod deps;

pub use build::cmd_build;
pub use check::cmd_check;
pub use deps::cmd_deps;
