//! Integration tests that drive the `redo` binary over real `.do` scripts.

mod build_tests;
mod check_tests;
mod common;
mod nested_tests;
