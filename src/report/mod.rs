//! Persistence and reporting of evaluation results.
//!
//! The runner hands every [`EvalResult`] to [`Reporter::save_results`] as soon
//! as it exists, and the full list of comparisons to
//! [`Reporter::generate_report`] once at the end of a run.

pub mod file;
pub mod memory;

pub use file::FileReporter;
pub use memory::MemoryReporter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::eval::{EvalComparison, EvalResult, Winner};

/// Sink for results and reports.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Persist one per-agent result.
    async fn save_results(&self, result: &EvalResult) -> Result<(), ReportError>;

    /// Produce the batch report for a finished run.
    async fn generate_report(&self, comparisons: &[EvalComparison]) -> Result<(), ReportError>;

    /// Compare against the stored baseline for the same fixture; `None` when there is none.
    async fn compare_with_baseline(
        &self,
        comparison: &EvalComparison,
    ) -> Result<Option<BaselineDiff>, ReportError>;
}

/// Score movement of a fixture relative to its baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineDiff {
    pub fixture: String,
    /// False when the fixture's diff or status changed since the baseline.
    pub fingerprint_matches: bool,
    /// Current minus baseline final score for agent A, when both exist.
    pub agent_a_delta: Option<f64>,
    pub agent_b_delta: Option<f64>,
    pub baseline_winner: Option<Winner>,
    pub current_winner: Option<Winner>,
}

impl BaselineDiff {
    pub fn between(baseline: &EvalComparison, current: &EvalComparison) -> Self {
        fn delta(baseline: Option<&EvalResult>, current: Option<&EvalResult>) -> Option<f64> {
            Some(current?.final_score() - baseline?.final_score())
        }

        Self {
            fixture: current.fixture.clone(),
            fingerprint_matches: baseline.fixture_fingerprint == current.fixture_fingerprint,
            agent_a_delta: delta(
                baseline.agent_a_result.as_ref(),
                current.agent_a_result.as_ref(),
            ),
            agent_b_delta: delta(
                baseline.agent_b_result.as_ref(),
                current.agent_b_result.as_ref(),
            ),
            baseline_winner: baseline.winner,
            current_winner: current.winner,
        }
    }

    pub fn winner_changed(&self) -> bool {
        self.baseline_winner != self.current_winner
    }

    /// Whether either agent moved by at least `threshold`.
    pub fn is_significant(&self, threshold: f64) -> bool {
        [self.agent_a_delta, self.agent_b_delta]
            .iter()
            .flatten()
            .any(|d| d.abs() >= threshold)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::comparison;
    use super::*;

    #[test]
    fn test_baseline_diff_between() {
        let baseline = comparison("simple", Some(7.0), Some(8.0));
        let current = comparison("simple", Some(8.5), Some(7.5));
        let diff = BaselineDiff::between(&baseline, &current);

        assert!(diff.fingerprint_matches);
        assert!((diff.agent_a_delta.expect("delta") - 1.5).abs() < 1e-9);
        assert!((diff.agent_b_delta.expect("delta") + 0.5).abs() < 1e-9);
        assert_eq!(diff.baseline_winner, Some(Winner::AgentB));
        assert_eq!(diff.current_winner, Some(Winner::AgentA));
        assert!(diff.winner_changed());
        assert!(diff.is_significant(1.0));
        assert!(!diff.is_significant(2.0));
    }

    #[test]
    fn test_baseline_diff_with_gap() {
        let baseline = comparison("simple", Some(7.0), None);
        let mut current = comparison("simple", Some(7.0), Some(6.0));
        current.fixture_fingerprint = "changed".to_string();
        let diff = BaselineDiff::between(&baseline, &current);

        assert!(!diff.fingerprint_matches);
        assert_eq!(diff.agent_a_delta, Some(0.0));
        assert_eq!(diff.agent_b_delta, None);
        assert!(diff.winner_changed());
    }
}
