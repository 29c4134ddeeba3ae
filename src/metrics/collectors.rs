//! High-level recording interface over the raw Prometheus metrics.

use super::prometheus::{
    ATTEMPTS_TOTAL, ATTEMPT_DURATION, COMPARISONS_TOTAL, FINAL_SCORE, FIXTURES_IN_PROGRESS,
    LLM_LATENCY, LLM_REQUESTS_TOTAL, LLM_TOKENS_TOTAL, META_EVALUATIONS_TOTAL,
};
use crate::eval::{AttemptOutcome, EvalComparison, EvalResult};

/// Token usage information for LLM requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    /// Number of input/prompt tokens.
    pub input_tokens: u64,
    /// Number of output/completion tokens.
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Metrics collector for the evaluation pipeline.
///
/// Every method is a no-op until `init_metrics()` has run, so library users
/// and tests never need a registry.
///
/// # Example
///
/// ```ignore
/// use commit_eval::metrics::{init_metrics, MetricsCollector};
///
/// init_metrics().expect("Failed to init metrics");
/// let collector = MetricsCollector::new();
/// collector.record_attempt("claude", &outcome, 4.2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record one classified generation attempt.
    pub fn record_attempt(&self, agent: &str, outcome: &AttemptOutcome, duration_secs: f64) {
        let label = outcome.label();

        if let Some(attempts) = ATTEMPTS_TOTAL.get() {
            attempts.with_label_values(&[agent, label]).inc();
        }

        if let Some(duration) = ATTEMPT_DURATION.get() {
            duration.with_label_values(&[agent]).observe(duration_secs);
        }

        tracing::trace!(
            agent = agent,
            outcome = label,
            duration_secs = duration_secs,
            "Recorded attempt metric"
        );
    }

    /// Record a finished per-agent evaluation.
    pub fn record_evaluation(&self, result: &EvalResult) {
        let path = result.scoring().to_string();

        if let Some(evaluations) = META_EVALUATIONS_TOTAL.get() {
            evaluations
                .with_label_values(&[result.agent(), path.as_str()])
                .inc();
        }

        if let Some(final_score) = FINAL_SCORE.get() {
            final_score
                .with_label_values(&[result.agent()])
                .observe(result.final_score());
        }

        tracing::trace!(
            agent = result.agent(),
            path = %path,
            final_score = result.final_score(),
            "Recorded evaluation metric"
        );
    }

    /// Record a fixture verdict.
    pub fn record_comparison(&self, comparison: &EvalComparison) {
        let winner = comparison
            .winner
            .map(|w| w.to_string())
            .unwrap_or_else(|| "none".to_string());

        if let Some(comparisons) = COMPARISONS_TOTAL.get() {
            comparisons.with_label_values(&[winner.as_str()]).inc();
        }

        tracing::trace!(fixture = %comparison.fixture, winner = %winner, "Recorded comparison metric");
    }

    /// Record an LLM API request.
    pub fn record_llm_request(
        &self,
        model: &str,
        success: bool,
        latency_secs: f64,
        tokens: TokenUsage,
    ) {
        let status = if success { "success" } else { "failure" };

        if let Some(llm_requests) = LLM_REQUESTS_TOTAL.get() {
            llm_requests.with_label_values(&[model, status]).inc();
        }

        if let Some(llm_latency) = LLM_LATENCY.get() {
            llm_latency
                .with_label_values(&[model])
                .observe(latency_secs);
        }

        if let Some(llm_tokens) = LLM_TOKENS_TOTAL.get() {
            llm_tokens
                .with_label_values(&[model, "input"])
                .inc_by(tokens.input_tokens as f64);
            llm_tokens
                .with_label_values(&[model, "output"])
                .inc_by(tokens.output_tokens as f64);
        }

        tracing::trace!(
            model = model,
            status = status,
            latency_secs = latency_secs,
            input_tokens = tokens.input_tokens,
            output_tokens = tokens.output_tokens,
            "Recorded LLM request metric"
        );
    }

    pub fn inc_fixtures_in_progress(&self) {
        if let Some(gauge) = FIXTURES_IN_PROGRESS.get() {
            gauge.inc();
        }
    }

    pub fn dec_fixtures_in_progress(&self) {
        if let Some(gauge) = FIXTURES_IN_PROGRESS.get() {
            gauge.dec();
        }
    }
}
