//! Persistent dependency records.
//!
//! Each built target owns a directory `<meta>/<target>/`. Every file in it is a
//! dependency record: the file name is the fingerprint a dependency had when
//! the record was written, and the content is the dependency's path followed
//! by a newline. Comparing the name with the dependency's current fingerprint
//! is the staleness signal, so no separate index is needed.
//!
//! Dependencies with identical content share a fingerprint; their paths are
//! kept as separate lines of the same record file.
//!
//! # Submodules
//!
//! - [`store`] - reading, writing and invalidating records

pub mod store;
mod types;

pub use store::DependencyStore;
pub use types::*;
