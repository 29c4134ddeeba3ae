//! Deterministic scoring rules: fallback aggregation, best attempt, winner.

use serde::{Deserialize, Serialize};

use super::types::{AttemptSet, Winner, ATTEMPTS_PER_AGENT, MAX_SCORE, SCORE_EPSILON};

/// Final scores closer than this are a tie.
pub const TIE_THRESHOLD: f64 = 0.5;

/// Reasoning recorded on every fallback result.
pub const FALLBACK_REASONING: &str =
    "Judge unavailable; scores computed locally from attempt outcomes (fallback scoring).";

/// Parameters of the fallback path used when the judge cannot score a set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FallbackPolicy {
    /// Consistency reported when no judge assessed the attempts.
    pub consistency_score: f64,
    /// Penalty per failed attempt while at least one attempt succeeded.
    pub penalty_per_failure: f64,
    /// Impact reported when every attempt failed.
    pub total_failure_impact: f64,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            consistency_score: 5.0,
            penalty_per_failure: 1.0,
            total_failure_impact: -10.0,
        }
    }
}

impl FallbackPolicy {
    /// Error-rate impact for a number of failed attempts.
    ///
    /// Never positive and monotonically non-increasing in `failures`.
    pub fn error_rate_impact(&self, failures: usize) -> f64 {
        if failures == 0 {
            return 0.0;
        }
        let partial = -self.penalty_per_failure.abs() * failures.min(ATTEMPTS_PER_AGENT) as f64;
        if failures >= ATTEMPTS_PER_AGENT {
            return self.total_failure_impact.min(partial);
        }
        partial
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.consistency_score.is_finite()
            || !(0.0..=MAX_SCORE).contains(&self.consistency_score)
        {
            return Err(format!(
                "fallback consistency score {} is outside [0, 10]",
                self.consistency_score
            ));
        }
        if !self.penalty_per_failure.is_finite() || self.penalty_per_failure < 0.0 {
            return Err(format!(
                "penalty per failure {} must be a non-negative number",
                self.penalty_per_failure
            ));
        }
        if !self.total_failure_impact.is_finite() || self.total_failure_impact > 0.0 {
            return Err(format!(
                "total failure impact {} must be a non-positive number",
                self.total_failure_impact
            ));
        }
        Ok(())
    }
}

/// Mean overall score across successful attempts, 0 when none succeeded.
pub fn fallback_final_score(attempts: &AttemptSet) -> f64 {
    let scores: Vec<f64> = attempts.iter().filter_map(|o| o.overall_score()).collect();
    if scores.is_empty() {
        return 0.0;
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    mean.clamp(0.0, MAX_SCORE)
}

/// Attempt number of the highest-scoring success; ties go to the earlier attempt.
pub fn best_attempt(attempts: &AttemptSet) -> Option<u8> {
    let mut best: Option<(u8, f64)> = None;
    for outcome in attempts.iter() {
        if let Some(score) = outcome.overall_score() {
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((outcome.attempt_number(), score)),
            }
        }
    }
    best.map(|(number, _)| number)
}

/// Verdict for two final scores; `None` when either side is missing.
///
/// A gap of exactly [`TIE_THRESHOLD`] is decisive, whatever rounding the
/// subtraction picks up.
pub fn decide_winner(agent_a: Option<f64>, agent_b: Option<f64>) -> Option<Winner> {
    let (a, b) = (agent_a?, agent_b?);
    if (a - b).abs() < TIE_THRESHOLD - SCORE_EPSILON {
        Some(Winner::Tie)
    } else if a > b {
        Some(Winner::AgentA)
    } else {
        Some(Winner::AgentB)
    }
}
