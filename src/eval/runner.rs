//! Run orchestration: fixtures × two agents, sequentially.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::attempt::AttemptRunner;
use super::meta::MetaEvaluator;
use super::shutdown::ShutdownSignal;
use super::types::{EvalComparison, EvalResult, Winner};
use crate::config::{EvalConfig, FailurePolicy};
use crate::error::EvalError;
use crate::fixtures::{Fixture, FixtureSource};
use crate::generator::Agent;
use crate::judge::Judge;
use crate::metrics::MetricsCollector;
use crate::report::Reporter;

/// What happened to one agent on one fixture.
enum AgentStep {
    Done(Option<EvalResult>),
    /// The fixture's remaining agent is skipped.
    SkipRest,
}

/// Compares two agents across a list of fixtures.
pub struct EvalRunner {
    run_id: Uuid,
    agent_a: Agent,
    agent_b: Agent,
    attempts: AttemptRunner,
    meta: MetaEvaluator,
    reporter: Arc<dyn Reporter>,
    failure_policy: FailurePolicy,
    compare_baseline: bool,
    shutdown: ShutdownSignal,
    metrics: MetricsCollector,
}

impl EvalRunner {
    /// Create a runner.
    ///
    /// # Errors
    ///
    /// `EvalError::Configuration` when the config is invalid or the agent
    /// names are empty or identical.
    pub fn new(
        agent_a: Agent,
        agent_b: Agent,
        judge: Arc<dyn Judge>,
        reporter: Arc<dyn Reporter>,
        config: &EvalConfig,
    ) -> Result<Self, EvalError> {
        config.validate()?;

        if agent_a.name().trim().is_empty() || agent_b.name().trim().is_empty() {
            return Err(EvalError::Configuration(
                "agent names cannot be empty".to_string(),
            ));
        }
        if agent_a.name() == agent_b.name() {
            return Err(EvalError::Configuration(format!(
                "both agents are named '{}'; results would overwrite each other",
                agent_a.name()
            )));
        }

        Ok(Self {
            run_id: Uuid::new_v4(),
            agent_a,
            agent_b,
            attempts: AttemptRunner::new(judge.clone()),
            meta: MetaEvaluator::new(judge, config.fallback),
            reporter,
            failure_policy: config.failure_policy,
            compare_baseline: config.compare_baseline,
            shutdown: ShutdownSignal::new(),
            metrics: MetricsCollector::new(),
        })
    }

    /// Observe an externally owned shutdown flag.
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Evaluate every fixture in order and generate the report once.
    pub async fn run(&self, fixtures: &[Fixture]) -> Result<Vec<EvalComparison>, EvalError> {
        info!(
            run_id = %self.run_id,
            agent_a = self.agent_a.name(),
            agent_b = self.agent_b.name(),
            fixtures = fixtures.len(),
            policy = %self.failure_policy,
            "Starting evaluation run"
        );

        let mut comparisons = Vec::with_capacity(fixtures.len());
        for fixture in fixtures {
            if self.shutdown.is_requested() {
                warn!(run_id = %self.run_id, "Shutdown requested, stopping before next fixture");
                break;
            }
            if let Some(comparison) = self.evaluate_fixture(fixture).await? {
                comparisons.push(comparison);
            }
        }

        self.finish(comparisons).await
    }

    /// Load fixtures by name and evaluate them; an empty list means all.
    ///
    /// Fixtures that cannot be loaded are logged and skipped.
    pub async fn run_from_source(
        &self,
        source: &dyn FixtureSource,
        names: &[String],
    ) -> Result<Vec<EvalComparison>, EvalError> {
        let names = if names.is_empty() {
            source.list().await?
        } else {
            names.to_vec()
        };

        info!(
            run_id = %self.run_id,
            agent_a = self.agent_a.name(),
            agent_b = self.agent_b.name(),
            fixtures = names.len(),
            policy = %self.failure_policy,
            "Starting evaluation run"
        );

        let mut comparisons = Vec::with_capacity(names.len());
        for name in &names {
            if self.shutdown.is_requested() {
                warn!(run_id = %self.run_id, "Shutdown requested, stopping before next fixture");
                break;
            }

            let fixture = match source.load(name).await {
                Ok(fixture) => fixture,
                Err(e) => {
                    let err = EvalError::from(e);
                    error!(fixture = %name, error = %err, "Skipping fixture");
                    continue;
                }
            };

            if let Some(comparison) = self.evaluate_fixture(&fixture).await? {
                comparisons.push(comparison);
            }
        }

        self.finish(comparisons).await
    }

    /// Evaluate both agents on one fixture.
    ///
    /// Returns `None` when shutdown interrupted the fixture.
    pub async fn evaluate_fixture(
        &self,
        fixture: &Fixture,
    ) -> Result<Option<EvalComparison>, EvalError> {
        self.metrics.inc_fixtures_in_progress();
        let result = self.compare_agents(fixture).await;
        self.metrics.dec_fixtures_in_progress();
        result
    }

    async fn compare_agents(&self, fixture: &Fixture) -> Result<Option<EvalComparison>, EvalError> {
        info!(fixture = %fixture.name, "Evaluating fixture");

        if self.shutdown.is_requested() {
            return Ok(None);
        }
        let (agent_a_result, skip_rest) = match self.step(&self.agent_a, fixture).await? {
            AgentStep::Done(result) => (result, false),
            AgentStep::SkipRest => (None, true),
        };

        let agent_b_result = if skip_rest {
            warn!(
                fixture = %fixture.name,
                agent = self.agent_b.name(),
                "Skipping remaining agent for fixture"
            );
            None
        } else {
            if self.shutdown.is_requested() {
                warn!(fixture = %fixture.name, "Shutdown requested between agents, dropping fixture");
                return Ok(None);
            }
            match self.step(&self.agent_b, fixture).await? {
                AgentStep::Done(result) => result,
                AgentStep::SkipRest => None,
            }
        };

        let comparison = EvalComparison::new(
            fixture.name.clone(),
            fixture.fingerprint(),
            self.agent_a.name(),
            self.agent_b.name(),
            agent_a_result,
            agent_b_result,
        );

        self.metrics.record_comparison(&comparison);
        info!(
            fixture = %comparison.fixture,
            agent_a_score = ?comparison.agent_a_result.as_ref().map(EvalResult::final_score),
            agent_b_score = ?comparison.agent_b_result.as_ref().map(EvalResult::final_score),
            winner = comparison.winner_name().unwrap_or("none"),
            "Fixture compared"
        );

        if self.compare_baseline {
            self.log_baseline(&comparison).await;
        }

        Ok(Some(comparison))
    }

    /// Evaluate one agent and apply the failure policy to any error.
    async fn step(&self, agent: &Agent, fixture: &Fixture) -> Result<AgentStep, EvalError> {
        match self.evaluate_agent(agent, fixture).await {
            Ok(result) => Ok(AgentStep::Done(Some(result))),
            Err(e) => match self.failure_policy {
                FailurePolicy::ContinueRecordGap => {
                    error!(
                        fixture = %fixture.name,
                        agent = agent.name(),
                        error = %e,
                        "Agent evaluation failed, recording gap"
                    );
                    Ok(AgentStep::Done(None))
                }
                FailurePolicy::SkipFixture => {
                    error!(
                        fixture = %fixture.name,
                        agent = agent.name(),
                        error = %e,
                        "Agent evaluation failed, skipping rest of fixture"
                    );
                    Ok(AgentStep::SkipRest)
                }
                FailurePolicy::AbortRun => {
                    error!(
                        fixture = %fixture.name,
                        agent = agent.name(),
                        error = %e,
                        "Agent evaluation failed, aborting run"
                    );
                    Err(e)
                }
            },
        }
    }

    /// Attempts, meta evaluation and persistence for one agent.
    pub async fn evaluate_agent(
        &self,
        agent: &Agent,
        fixture: &Fixture,
    ) -> Result<EvalResult, EvalError> {
        let attempts = self.attempts.run_attempts(agent, fixture).await?;
        let result = self
            .meta
            .evaluate(agent.name(), &attempts, &fixture.diff, &fixture.name)
            .await?;

        if let Err(e) = self.reporter.save_results(&result).await {
            warn!(
                fixture = %fixture.name,
                agent = agent.name(),
                error = %e,
                "Failed to save result, keeping it in memory"
            );
        }
        Ok(result)
    }

    async fn log_baseline(&self, comparison: &EvalComparison) {
        match self.reporter.compare_with_baseline(comparison).await {
            Ok(Some(diff)) => {
                if !diff.fingerprint_matches {
                    warn!(
                        fixture = %diff.fixture,
                        "Fixture changed since baseline, deltas are not comparable"
                    );
                }
                info!(
                    fixture = %diff.fixture,
                    agent_a_delta = ?diff.agent_a_delta,
                    agent_b_delta = ?diff.agent_b_delta,
                    winner_changed = diff.winner_changed(),
                    "Baseline comparison"
                );
            }
            Ok(None) => debug!(fixture = %comparison.fixture, "No baseline for fixture"),
            Err(e) => warn!(fixture = %comparison.fixture, error = %e, "Baseline comparison failed"),
        }
    }

    async fn finish(
        &self,
        comparisons: Vec<EvalComparison>,
    ) -> Result<Vec<EvalComparison>, EvalError> {
        self.reporter.generate_report(&comparisons).await?;

        let count = |w: Winner| comparisons.iter().filter(|c| c.winner == Some(w)).count();
        info!(
            run_id = %self.run_id,
            comparisons = comparisons.len(),
            agent_a_wins = count(Winner::AgentA),
            agent_b_wins = count(Winner::AgentB),
            ties = count(Winner::Tie),
            interrupted = self.shutdown.is_requested(),
            "Evaluation run finished"
        );
        Ok(comparisons)
    }
}
