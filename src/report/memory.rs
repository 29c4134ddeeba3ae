//! In-memory reporter for tests and embedding.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{BaselineDiff, Reporter};
use crate::error::ReportError;
use crate::eval::{EvalComparison, EvalResult};

/// Keeps everything it is given; baselines are set explicitly.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    results: Mutex<Vec<EvalResult>>,
    reports: Mutex<Vec<Vec<EvalComparison>>>,
    baselines: Mutex<HashMap<String, EvalComparison>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baseline(self, comparison: EvalComparison) -> Self {
        self.set_baseline(comparison);
        self
    }

    pub fn set_baseline(&self, comparison: EvalComparison) {
        self.baselines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(comparison.fixture.clone(), comparison);
    }

    /// Results saved so far, in save order.
    pub fn results(&self) -> Vec<EvalResult> {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Every batch passed to `generate_report`.
    pub fn reports(&self) -> Vec<Vec<EvalComparison>> {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Reporter for MemoryReporter {
    async fn save_results(&self, result: &EvalResult) -> Result<(), ReportError> {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(result.clone());
        Ok(())
    }

    async fn generate_report(&self, comparisons: &[EvalComparison]) -> Result<(), ReportError> {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(comparisons.to_vec());
        Ok(())
    }

    async fn compare_with_baseline(
        &self,
        comparison: &EvalComparison,
    ) -> Result<Option<BaselineDiff>, ReportError> {
        let baselines = self.baselines.lock().unwrap_or_else(|e| e.into_inner());
        Ok(baselines
            .get(&comparison.fixture)
            .map(|baseline| BaselineDiff::between(baseline, comparison)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::test_support::{comparison, result};

    #[tokio::test]
    async fn test_records_everything() {
        let reporter = MemoryReporter::new();
        reporter
            .save_results(&result("claude", "simple", 8.0))
            .await
            .expect("save");
        reporter
            .generate_report(&[comparison("simple", Some(8.0), Some(7.0))])
            .await
            .expect("report");

        assert_eq!(reporter.results().len(), 1);
        assert_eq!(reporter.reports().len(), 1);
        assert_eq!(reporter.reports()[0][0].fixture, "simple");
    }

    #[tokio::test]
    async fn test_baseline_lookup() {
        let reporter =
            MemoryReporter::new().with_baseline(comparison("simple", Some(6.0), Some(7.0)));
        let current = comparison("simple", Some(8.0), Some(7.0));

        let diff = reporter
            .compare_with_baseline(&current)
            .await
            .expect("compare")
            .expect("baseline");
        assert_eq!(diff.agent_a_delta, Some(2.0));

        let other = comparison("other", Some(8.0), Some(7.0));
        assert!(reporter
            .compare_with_baseline(&other)
            .await
            .expect("compare")
            .is_none());
    }
}
