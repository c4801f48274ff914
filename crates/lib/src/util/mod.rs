//! Shared utilities.
//!
//! Content fingerprinting and test helpers.

pub mod hash;

#[cfg(test)]
pub mod testutil;
