//! commit-eval: head-to-head benchmarking of commit message agents.
//!
//! Each agent gets three attempts per fixture. Every attempt is cleaned,
//! validated and scored, the three attempts are judged as a set, and the two
//! agents' results are compared into a per-fixture verdict.

pub mod cli;
pub mod commit;
pub mod config;
pub mod error;
pub mod eval;
pub mod fixtures;
pub mod generator;
pub mod judge;
pub mod llm;
pub mod metrics;
pub mod report;
pub mod utils;

// Re-export commonly used error types
pub use config::{ConfigError, EvalConfig, FailurePolicy};
pub use error::{EvalError, FixtureError, GeneratorError, JudgeError, LlmError, ReportError};
