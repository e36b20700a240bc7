//! # DevStack CLI Integration Test Common Helpers
//!
//! File: cli/tests/common.rs
//! Repository: https://github.com/devstack-cli/devstack
//!
//! ## Overview
//!
//! This module provides shared utility functions and re-exports common crates
//! used across multiple integration test files (`main_tests.rs`, `cli.rs`).
//! This avoids code duplication in the test suite.
//!
//! Integration tests are located in the `cli/tests/` directory and each `.rs` file
//! in that directory (that isn't a module like this one) is compiled as a separate
//! test crate linked against the main `devstack` binary crate.
//!

// Allow potentially unused code in this common module, as different test files might use different helpers.
#![allow(dead_code)]

// Re-export common crates/modules needed by multiple test files
pub use assert_cmd::Command;

/// # Get DevStack Command (`devstack_cmd`)
///
/// Helper function to create an `assert_cmd::Command` instance pointing to the
/// compiled `devstack` binary target for the current test run.
///
/// This ensures tests execute the correct binary being built.
///
/// ## Panics
/// Panics if the `devstack` binary cannot be found via `Command::cargo_bin`.
///
/// ## Returns
/// * `Command` - An `assert_cmd::Command` ready to have arguments added and assertions run.
pub fn devstack_cmd() -> Command {
    Command::cargo_bin("devstack").expect("Failed to find devstack binary for testing")
}

/// # Write Project Config (`write_project_config`)
///
/// Writes a `.devstack.toml` with the given contents into `dir` so a test can
/// run the binary with that directory as its working directory and have the
/// project-local configuration discovery pick it up.
///
/// ## Panics
/// Panics if the file cannot be written (test environment problem).
pub fn write_project_config(dir: &std::path::Path, contents: &str) {
    std::fs::write(dir.join(".devstack.toml"), contents)
        .expect("Failed to write test .devstack.toml");
}
