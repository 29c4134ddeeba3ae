//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by commit-eval and provides
//! functions for initializing, registering, and exporting metrics.

use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all commit-eval metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Generation attempts, labeled by agent and outcome (`success` or failure type).
pub static ATTEMPTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Wall-clock duration of one generation attempt, labeled by agent.
pub static ATTEMPT_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Per-agent evaluations, labeled by agent and scoring path (`judge`/`fallback`).
pub static META_EVALUATIONS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Distribution of final scores, labeled by agent.
pub static FINAL_SCORE: OnceLock<HistogramVec> = OnceLock::new();

/// Fixture verdicts, labeled by winner (`agent_a`, `agent_b`, `tie`, `none`).
pub static COMPARISONS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Fixtures currently being evaluated.
pub static FIXTURES_IN_PROGRESS: OnceLock<Gauge> = OnceLock::new();

/// Total LLM API requests, labeled by model and status.
pub static LLM_REQUESTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// LLM API request latency in seconds, labeled by model.
pub static LLM_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Total tokens used, labeled by model and type (input/output).
pub static LLM_TOKENS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Call once at startup. Until then every [`super::MetricsCollector`] method
/// is a no-op. Repeated calls keep the first registry.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails, typically due to
/// duplicate metric names or invalid metric configurations.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    // Attempt metrics
    let attempts_total = CounterVec::new(
        Opts::new("commit_eval_attempts_total", "Total generation attempts"),
        &["agent", "outcome"],
    )?;

    let attempt_duration = HistogramVec::new(
        HistogramOpts::new(
            "commit_eval_attempt_duration_seconds",
            "Generation attempt duration in seconds",
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["agent"],
    )?;

    // Evaluation metrics
    let meta_evaluations_total = CounterVec::new(
        Opts::new(
            "commit_eval_meta_evaluations_total",
            "Per-agent evaluations by scoring path",
        ),
        &["agent", "path"],
    )?;

    let final_score = HistogramVec::new(
        HistogramOpts::new("commit_eval_final_score", "Distribution of final scores")
            .buckets(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]),
        &["agent"],
    )?;

    let comparisons_total = CounterVec::new(
        Opts::new("commit_eval_comparisons_total", "Fixture verdicts by winner"),
        &["winner"],
    )?;

    let fixtures_in_progress = Gauge::new(
        "commit_eval_fixtures_in_progress",
        "Number of fixtures currently being evaluated",
    )?;

    // LLM metrics
    let llm_requests_total = CounterVec::new(
        Opts::new("commit_eval_llm_requests_total", "Total LLM API requests"),
        &["model", "status"],
    )?;

    let llm_latency = HistogramVec::new(
        HistogramOpts::new(
            "commit_eval_llm_latency_seconds",
            "LLM API request latency in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 120.0]),
        &["model"],
    )?;

    let llm_tokens_total = CounterVec::new(
        Opts::new("commit_eval_llm_tokens_total", "Total tokens used"),
        &["model", "type"],
    )?;

    registry.register(Box::new(attempts_total.clone()))?;
    registry.register(Box::new(attempt_duration.clone()))?;
    registry.register(Box::new(meta_evaluations_total.clone()))?;
    registry.register(Box::new(final_score.clone()))?;
    registry.register(Box::new(comparisons_total.clone()))?;
    registry.register(Box::new(fixtures_in_progress.clone()))?;
    registry.register(Box::new(llm_requests_total.clone()))?;
    registry.register(Box::new(llm_latency.clone()))?;
    registry.register(Box::new(llm_tokens_total.clone()))?;

    // If any of these fail, metrics were already initialized (idempotent)
    let _ = REGISTRY.set(registry);
    let _ = ATTEMPTS_TOTAL.set(attempts_total);
    let _ = ATTEMPT_DURATION.set(attempt_duration);
    let _ = META_EVALUATIONS_TOTAL.set(meta_evaluations_total);
    let _ = FINAL_SCORE.set(final_score);
    let _ = COMPARISONS_TOTAL.set(comparisons_total);
    let _ = FIXTURES_IN_PROGRESS.set(fixtures_in_progress);
    let _ = LLM_REQUESTS_TOTAL.set(llm_requests_total);
    let _ = LLM_LATENCY.set(llm_latency);
    let _ = LLM_TOKENS_TOTAL.set(llm_tokens_total);

    tracing::info!("Prometheus metrics initialized successfully");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Returns a comment line instead when the registry has not been initialized
/// or encoding fails.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
