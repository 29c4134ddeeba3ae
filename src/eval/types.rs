//! Data model for attempts, per-agent results and head-to-head comparisons.
//!
//! Every [`EvalResult`] is built through [`EvalResult::try_from`] on an
//! [`EvalResultDraft`], including when it is deserialized from disk, so the
//! result invariants hold for every value of the type.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EvalError;

/// Number of independent generation attempts per agent and fixture.
pub const ATTEMPTS_PER_AGENT: usize = 3;

/// Upper bound of every score in the model.
pub const MAX_SCORE: f64 = 10.0;

/// Scores closer than this are treated as equal.
pub(crate) const SCORE_EPSILON: f64 = 1e-9;

fn in_score_range(value: f64) -> bool {
    value.is_finite() && (0.0..=MAX_SCORE).contains(&value)
}

// ============================================================================
// Attempt outcomes
// ============================================================================

/// Why an attempt did not produce a usable commit message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    /// Output still carried preambles or sentinel markers after cleaning.
    Cleaning,
    /// Cleaned output is not a structurally valid conventional commit.
    Validation,
    /// The generator ran but produced nothing usable (timeout, empty output).
    Generation,
    /// The agent CLI or API could not be reached.
    ApiError,
}

impl FailureType {
    /// Label used in logs, metrics and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureType::Cleaning => "cleaning",
            FailureType::Validation => "validation",
            FailureType::Generation => "generation",
            FailureType::ApiError => "api_error",
        }
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality dimensions for a single commit message, each in `[0, 10]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttemptMetrics {
    pub clarity: f64,
    #[serde(alias = "conventionalFormat")]
    pub conventional_format: f64,
    pub scope: f64,
    pub specificity: f64,
}

impl AttemptMetrics {
    pub fn new(clarity: f64, conventional_format: f64, scope: f64, specificity: f64) -> Self {
        Self {
            clarity,
            conventional_format,
            scope,
            specificity,
        }
    }

    /// Arithmetic mean of the four dimensions.
    pub fn overall(&self) -> f64 {
        (self.clarity + self.conventional_format + self.scope + self.specificity) / 4.0
    }

    /// Check that every dimension is a finite score in range.
    pub fn validate(&self) -> Result<(), String> {
        let named = [
            ("clarity", self.clarity),
            ("conventional_format", self.conventional_format),
            ("scope", self.scope),
            ("specificity", self.specificity),
        ];
        for (name, value) in named {
            if !in_score_range(value) {
                return Err(format!("metric '{}' = {} is outside [0, 10]", name, value));
            }
        }
        Ok(())
    }
}

/// Outcome of one generation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success {
        attempt_number: u8,
        commit_message: String,
        metrics: AttemptMetrics,
        overall_score: f64,
    },
    Failure {
        attempt_number: u8,
        failure_type: FailureType,
        failure_reason: String,
    },
}

impl AttemptOutcome {
    /// Build a success outcome; `overall_score` is derived from the metrics.
    pub fn success(
        attempt_number: u8,
        commit_message: impl Into<String>,
        metrics: AttemptMetrics,
    ) -> Result<Self, EvalError> {
        let outcome = AttemptOutcome::Success {
            attempt_number,
            commit_message: commit_message.into(),
            metrics,
            overall_score: metrics.overall(),
        };
        outcome.check()?;
        Ok(outcome)
    }

    /// Build a failure outcome.
    pub fn failure(
        attempt_number: u8,
        failure_type: FailureType,
        failure_reason: impl Into<String>,
    ) -> Self {
        let mut failure_reason = failure_reason.into();
        if failure_reason.trim().is_empty() {
            failure_reason = format!("{} failure", failure_type);
        }
        AttemptOutcome::Failure {
            attempt_number,
            failure_type,
            failure_reason,
        }
    }

    pub fn attempt_number(&self) -> u8 {
        match self {
            AttemptOutcome::Success { attempt_number, .. }
            | AttemptOutcome::Failure { attempt_number, .. } => *attempt_number,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success { .. })
    }

    /// Overall score of a success, `None` for failures.
    pub fn overall_score(&self) -> Option<f64> {
        match self {
            AttemptOutcome::Success { overall_score, .. } => Some(*overall_score),
            AttemptOutcome::Failure { .. } => None,
        }
    }

    pub fn commit_message(&self) -> Option<&str> {
        match self {
            AttemptOutcome::Success { commit_message, .. } => Some(commit_message),
            AttemptOutcome::Failure { .. } => None,
        }
    }

    pub fn failure_type(&self) -> Option<FailureType> {
        match self {
            AttemptOutcome::Failure { failure_type, .. } => Some(*failure_type),
            AttemptOutcome::Success { .. } => None,
        }
    }

    /// Short label for logs and metrics: `success` or the failure type.
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success { .. } => "success",
            AttemptOutcome::Failure { failure_type, .. } => failure_type.as_str(),
        }
    }

    fn check(&self) -> Result<(), EvalError> {
        let number = self.attempt_number();
        if number == 0 || number as usize > ATTEMPTS_PER_AGENT {
            return Err(EvalError::InvariantViolation(format!(
                "attempt number {} is outside 1..={}",
                number, ATTEMPTS_PER_AGENT
            )));
        }
        match self {
            AttemptOutcome::Success {
                commit_message,
                metrics,
                overall_score,
                ..
            } => {
                if commit_message.trim().is_empty() {
                    return Err(EvalError::InvariantViolation(format!(
                        "attempt {} succeeded with an empty commit message",
                        number
                    )));
                }
                metrics.validate().map_err(|e| {
                    EvalError::InvariantViolation(format!("attempt {}: {}", number, e))
                })?;
                if (overall_score - metrics.overall()).abs() > 1e-6 {
                    return Err(EvalError::InvariantViolation(format!(
                        "attempt {} overall score {} does not equal the metric mean {}",
                        number,
                        overall_score,
                        metrics.overall()
                    )));
                }
            }
            AttemptOutcome::Failure { failure_reason, .. } => {
                if failure_reason.trim().is_empty() {
                    return Err(EvalError::InvariantViolation(format!(
                        "attempt {} failed without a reason",
                        number
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Exactly [`ATTEMPTS_PER_AGENT`] outcomes, ordered by attempt number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<AttemptOutcome>", into = "Vec<AttemptOutcome>")]
pub struct AttemptSet([AttemptOutcome; ATTEMPTS_PER_AGENT]);

impl AttemptSet {
    /// Validate count, numbering and per-outcome invariants.
    pub fn new(outcomes: Vec<AttemptOutcome>) -> Result<Self, EvalError> {
        for (index, outcome) in outcomes.iter().enumerate() {
            if outcome.attempt_number() as usize != index + 1 {
                return Err(EvalError::InvariantViolation(format!(
                    "attempt at position {} is numbered {}",
                    index + 1,
                    outcome.attempt_number()
                )));
            }
            outcome.check()?;
        }
        let count = outcomes.len();
        let array: [AttemptOutcome; ATTEMPTS_PER_AGENT] = outcomes.try_into().map_err(|_| {
            EvalError::InvariantViolation(format!(
                "expected {} attempts, got {}",
                ATTEMPTS_PER_AGENT, count
            ))
        })?;
        Ok(Self(array))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttemptOutcome> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[AttemptOutcome] {
        &self.0
    }

    /// Look up an outcome by its 1-based attempt number.
    pub fn get(&self, attempt_number: u8) -> Option<&AttemptOutcome> {
        (attempt_number as usize)
            .checked_sub(1)
            .and_then(|index| self.0.get(index))
    }

    pub fn successes(&self) -> impl Iterator<Item = &AttemptOutcome> {
        self.0.iter().filter(|o| o.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failure_count(&self) -> usize {
        ATTEMPTS_PER_AGENT - self.success_count()
    }

    pub fn success_rate(&self) -> SuccessRate {
        SuccessRate {
            successes: self.success_count(),
        }
    }
}

impl TryFrom<Vec<AttemptOutcome>> for AttemptSet {
    type Error = EvalError;

    fn try_from(outcomes: Vec<AttemptOutcome>) -> Result<Self, Self::Error> {
        Self::new(outcomes)
    }
}

impl From<AttemptSet> for Vec<AttemptOutcome> {
    fn from(set: AttemptSet) -> Self {
        set.0.into()
    }
}

// ============================================================================
// Success rate
// ============================================================================

/// Successful attempts out of [`ATTEMPTS_PER_AGENT`], rendered as `"K/3"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SuccessRate {
    successes: usize,
}

impl SuccessRate {
    pub fn new(successes: usize) -> Result<Self, EvalError> {
        if successes > ATTEMPTS_PER_AGENT {
            return Err(EvalError::InvariantViolation(format!(
                "success count {} exceeds {} attempts",
                successes, ATTEMPTS_PER_AGENT
            )));
        }
        Ok(Self { successes })
    }

    pub fn successes(&self) -> usize {
        self.successes
    }

    pub fn ratio(&self) -> f64 {
        self.successes as f64 / ATTEMPTS_PER_AGENT as f64
    }
}

impl fmt::Display for SuccessRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.successes, ATTEMPTS_PER_AGENT)
    }
}

impl FromStr for SuccessRate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, den) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| format!("success rate '{}' is not of the form K/{}", s, ATTEMPTS_PER_AGENT))?;
        let successes: usize = num
            .trim()
            .parse()
            .map_err(|_| format!("invalid success count in '{}'", s))?;
        let total: usize = den
            .trim()
            .parse()
            .map_err(|_| format!("invalid attempt total in '{}'", s))?;
        if total != ATTEMPTS_PER_AGENT {
            return Err(format!(
                "success rate '{}' must be out of {} attempts",
                s, ATTEMPTS_PER_AGENT
            ));
        }
        SuccessRate::new(successes).map_err(|e| e.to_string())
    }
}

impl TryFrom<String> for SuccessRate {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SuccessRate> for String {
    fn from(rate: SuccessRate) -> Self {
        rate.to_string()
    }
}

// ============================================================================
// Per-agent result
// ============================================================================

/// Which path produced an [`EvalResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPath {
    /// Holistic scores from the external judge.
    Judge,
    /// Locally computed scores; the judge was unavailable or rejected.
    Fallback,
}

impl fmt::Display for ScoringPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringPath::Judge => write!(f, "judge"),
            ScoringPath::Fallback => write!(f, "fallback"),
        }
    }
}

/// Unvalidated fields of an [`EvalResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalResultDraft {
    pub agent: String,
    pub fixture: String,
    pub attempts: AttemptSet,
    pub best_attempt: Option<u8>,
    pub consistency_score: f64,
    pub error_rate_impact: f64,
    pub final_score: f64,
    pub success_rate: SuccessRate,
    pub reasoning: String,
    pub scoring: ScoringPath,
    pub evaluated_at: DateTime<Utc>,
}

/// Holistic result for one agent on one fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EvalResultDraft")]
pub struct EvalResult {
    agent: String,
    fixture: String,
    attempts: AttemptSet,
    best_attempt: Option<u8>,
    consistency_score: f64,
    error_rate_impact: f64,
    final_score: f64,
    success_rate: SuccessRate,
    reasoning: String,
    scoring: ScoringPath,
    evaluated_at: DateTime<Utc>,
}

impl TryFrom<EvalResultDraft> for EvalResult {
    type Error = EvalError;

    fn try_from(draft: EvalResultDraft) -> Result<Self, Self::Error> {
        validate_draft(&draft).map_err(EvalError::InvariantViolation)?;
        Ok(Self {
            agent: draft.agent,
            fixture: draft.fixture,
            attempts: draft.attempts,
            best_attempt: draft.best_attempt,
            consistency_score: draft.consistency_score,
            error_rate_impact: draft.error_rate_impact,
            final_score: draft.final_score,
            success_rate: draft.success_rate,
            reasoning: draft.reasoning,
            scoring: draft.scoring,
            evaluated_at: draft.evaluated_at,
        })
    }
}

fn validate_draft(draft: &EvalResultDraft) -> Result<(), String> {
    if draft.agent.trim().is_empty() {
        return Err("agent name is empty".to_string());
    }
    if draft.fixture.trim().is_empty() {
        return Err("fixture name is empty".to_string());
    }
    if draft.reasoning.trim().is_empty() {
        return Err("reasoning is empty".to_string());
    }

    let successes = draft.attempts.success_count();
    if draft.success_rate.successes() != successes {
        return Err(format!(
            "success rate {} does not match {} successful attempts",
            draft.success_rate, successes
        ));
    }

    match (successes, draft.best_attempt) {
        (0, Some(best)) => {
            return Err(format!(
                "best attempt {} named although no attempt succeeded",
                best
            ));
        }
        (0, None) => {}
        (_, None) => {
            return Err("best attempt missing although an attempt succeeded".to_string());
        }
        (_, Some(best)) => match draft.attempts.get(best) {
            Some(outcome) if outcome.is_success() => {}
            Some(_) => return Err(format!("best attempt {} is not a success", best)),
            None => return Err(format!("best attempt {} is outside 1..=3", best)),
        },
    }

    if !in_score_range(draft.final_score) {
        return Err(format!("final score {} is outside [0, 10]", draft.final_score));
    }
    if successes == 0 && draft.final_score.abs() > SCORE_EPSILON {
        return Err(format!(
            "final score {} must be 0 when no attempt succeeded",
            draft.final_score
        ));
    }
    if !in_score_range(draft.consistency_score) {
        return Err(format!(
            "consistency score {} is outside [0, 10]",
            draft.consistency_score
        ));
    }
    if !draft.error_rate_impact.is_finite() || draft.error_rate_impact > 0.0 {
        return Err(format!(
            "error rate impact {} must be a non-positive number",
            draft.error_rate_impact
        ));
    }
    Ok(())
}

impl EvalResult {
    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn fixture(&self) -> &str {
        &self.fixture
    }

    pub fn attempts(&self) -> &AttemptSet {
        &self.attempts
    }

    pub fn best_attempt(&self) -> Option<u8> {
        self.best_attempt
    }

    /// The outcome referenced by `best_attempt`; always a success.
    pub fn best_outcome(&self) -> Option<&AttemptOutcome> {
        self.best_attempt.and_then(|n| self.attempts.get(n))
    }

    pub fn consistency_score(&self) -> f64 {
        self.consistency_score
    }

    pub fn error_rate_impact(&self) -> f64 {
        self.error_rate_impact
    }

    pub fn final_score(&self) -> f64 {
        self.final_score
    }

    pub fn success_rate(&self) -> SuccessRate {
        self.success_rate
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn scoring(&self) -> ScoringPath {
        self.scoring
    }

    pub fn evaluated_at(&self) -> DateTime<Utc> {
        self.evaluated_at
    }
}

// ============================================================================
// Comparison
// ============================================================================

/// Verdict between the two agents on one fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    AgentA,
    AgentB,
    Tie,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::AgentA => write!(f, "agent_a"),
            Winner::AgentB => write!(f, "agent_b"),
            Winner::Tie => write!(f, "tie"),
        }
    }
}

/// Head-to-head comparison of both agents on one fixture.
///
/// Loading one re-derives the winner from the two results and rejects a
/// stored winner that disagrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ComparisonRecord")]
pub struct EvalComparison {
    pub fixture: String,
    /// SHA-256 of the fixture's diff and status, for baseline matching.
    pub fixture_fingerprint: String,
    pub agent_a: String,
    pub agent_b: String,
    pub agent_a_result: Option<EvalResult>,
    pub agent_b_result: Option<EvalResult>,
    /// `None` only when either result is missing.
    pub winner: Option<Winner>,
}

impl EvalComparison {
    /// Build a comparison; the winner is derived from the two results.
    pub fn new(
        fixture: impl Into<String>,
        fixture_fingerprint: impl Into<String>,
        agent_a: impl Into<String>,
        agent_b: impl Into<String>,
        agent_a_result: Option<EvalResult>,
        agent_b_result: Option<EvalResult>,
    ) -> Self {
        let winner = super::scoring::decide_winner(
            agent_a_result.as_ref().map(EvalResult::final_score),
            agent_b_result.as_ref().map(EvalResult::final_score),
        );
        Self {
            fixture: fixture.into(),
            fixture_fingerprint: fixture_fingerprint.into(),
            agent_a: agent_a.into(),
            agent_b: agent_b.into(),
            agent_a_result,
            agent_b_result,
            winner,
        }
    }

    /// Both agents produced a result.
    pub fn is_complete(&self) -> bool {
        self.agent_a_result.is_some() && self.agent_b_result.is_some()
    }

    /// Display name of the winner, `"tie"`, or `None`.
    pub fn winner_name(&self) -> Option<&str> {
        self.winner.map(|w| match w {
            Winner::AgentA => self.agent_a.as_str(),
            Winner::AgentB => self.agent_b.as_str(),
            Winner::Tie => "tie",
        })
    }
}

/// Stored form of [`EvalComparison`], checked before use.
#[derive(Deserialize)]
struct ComparisonRecord {
    fixture: String,
    fixture_fingerprint: String,
    agent_a: String,
    agent_b: String,
    agent_a_result: Option<EvalResult>,
    agent_b_result: Option<EvalResult>,
    #[serde(default)]
    winner: Option<Winner>,
}

impl TryFrom<ComparisonRecord> for EvalComparison {
    type Error = String;

    fn try_from(record: ComparisonRecord) -> Result<Self, Self::Error> {
        let stored = record.winner;
        let comparison = EvalComparison::new(
            record.fixture,
            record.fixture_fingerprint,
            record.agent_a,
            record.agent_b,
            record.agent_a_result,
            record.agent_b_result,
        );
        if stored != comparison.winner {
            return Err(format!(
                "stored winner {:?} for fixture '{}' does not match its results ({:?})",
                stored, comparison.fixture, comparison.winner
            ));
        }
        Ok(comparison)
    }
}
