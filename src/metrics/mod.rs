//! Prometheus metrics for evaluation runs.
//!
//! Tracks attempt outcomes, scoring paths, final-score distributions, fixture
//! verdicts and LLM usage. The CLI can dump the text exposition to a file at
//! the end of a run.
//!
//! # Example
//!
//! ```ignore
//! use commit_eval::metrics::{init_metrics, export_metrics};
//!
//! init_metrics().expect("Failed to initialize metrics");
//! // ... run an evaluation ...
//! let metrics_text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::{MetricsCollector, TokenUsage};
pub use prometheus::{export_metrics, init_metrics};

pub use prometheus::{
    ATTEMPTS_TOTAL, ATTEMPT_DURATION, COMPARISONS_TOTAL, FINAL_SCORE, FIXTURES_IN_PROGRESS,
    LLM_LATENCY, LLM_REQUESTS_TOTAL, LLM_TOKENS_TOTAL, META_EVALUATIONS_TOTAL, REGISTRY,
};
