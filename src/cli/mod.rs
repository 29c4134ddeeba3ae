//! Command-line interface for commit-eval.
//!
//! Provides the `run` command for head-to-head agent comparisons and the
//! `fixtures` command for inspecting fixture directories.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, AgentSpec, Cli};
