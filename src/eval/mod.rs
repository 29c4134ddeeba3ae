//! Multi-attempt evaluation pipeline.
//!
//! - [`AttemptRunner`] runs three generation attempts per agent and fixture
//!   and classifies each one.
//! - [`MetaEvaluator`] turns an [`AttemptSet`] into an [`EvalResult`], through
//!   the judge or the deterministic fallback.
//! - [`EvalRunner`] walks fixtures, compares the two agents and reports.
//!
//! # Example
//!
//! ```ignore
//! use commit_eval::eval::EvalRunner;
//!
//! let runner = EvalRunner::new(agent_a, agent_b, judge, reporter, &config)?;
//! let comparisons = runner.run(&fixtures).await?;
//! for comparison in &comparisons {
//!     println!("{}: {:?}", comparison.fixture, comparison.winner_name());
//! }
//! ```

pub mod attempt;
pub mod meta;
pub mod runner;
pub mod scoring;
pub mod shutdown;
pub mod types;

pub use attempt::{classify_output, AttemptRunner, ClassifiedOutput};
pub use meta::{accept_judgement, MetaEvaluator};
pub use runner::EvalRunner;
pub use scoring::{
    best_attempt, decide_winner, fallback_final_score, FallbackPolicy, FALLBACK_REASONING,
    TIE_THRESHOLD,
};
pub use shutdown::ShutdownSignal;
pub use types::{
    AttemptMetrics, AttemptOutcome, AttemptSet, EvalComparison, EvalResult, EvalResultDraft,
    FailureType, ScoringPath, SuccessRate, Winner, ATTEMPTS_PER_AGENT, MAX_SCORE,
};
