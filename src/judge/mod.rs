//! External judge interface.
//!
//! The judge scores single commit messages and assesses a whole attempt set.
//! Its output is never trusted as-is: the attempt runner range-checks message
//! scores and the meta evaluator validates judgements against the result
//! invariants before using them.

pub mod llm;

pub use llm::LlmJudge;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::JudgeError;
use crate::eval::{AttemptMetrics, AttemptSet};

/// Ask the judge to score one cleaned commit message.
#[derive(Debug, Clone, Copy)]
pub struct ScoreRequest<'a> {
    pub message: &'a str,
    pub diff: &'a str,
    pub status: &'a str,
    /// Expected commit type; empty when the fixture names none.
    pub expected_type: &'a str,
}

/// Judge scores for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageScore {
    #[serde(flatten)]
    pub metrics: AttemptMetrics,
    #[serde(default)]
    pub feedback: String,
}

/// Ask the judge for a holistic assessment of one agent's attempts.
#[derive(Debug, Clone, Copy)]
pub struct MetaRequest<'a> {
    pub agent: &'a str,
    pub fixture: &'a str,
    pub attempts: &'a AttemptSet,
    pub diff: &'a str,
}

/// Holistic judge output, unvalidated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaJudgement {
    #[serde(alias = "consistencyScore")]
    pub consistency_score: f64,
    #[serde(alias = "errorRateImpact")]
    pub error_rate_impact: f64,
    #[serde(alias = "finalScore")]
    pub final_score: f64,
    pub reasoning: String,
    #[serde(default, alias = "bestAttempt")]
    pub best_attempt: Option<u8>,
    #[serde(alias = "successRate")]
    pub success_rate: String,
}

/// Scores commit messages and attempt sets.
#[async_trait]
pub trait Judge: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    async fn score_message(&self, request: &ScoreRequest<'_>) -> Result<MessageScore, JudgeError>;

    async fn evaluate_attempts(
        &self,
        request: &MetaRequest<'_>,
    ) -> Result<MetaJudgement, JudgeError>;
}

/// Judge used when no credentials are configured; every call fails.
///
/// Running with it exercises the inline scorer and the fallback path only.
#[derive(Debug, Clone)]
pub struct UnavailableJudge {
    reason: String,
}

impl UnavailableJudge {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for UnavailableJudge {
    fn default() -> Self {
        Self::new("no judge configured")
    }
}

#[async_trait]
impl Judge for UnavailableJudge {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn score_message(&self, _request: &ScoreRequest<'_>) -> Result<MessageScore, JudgeError> {
        Err(JudgeError::MissingCredentials(self.reason.clone()))
    }

    async fn evaluate_attempts(
        &self,
        _request: &MetaRequest<'_>,
    ) -> Result<MetaJudgement, JudgeError> {
        Err(JudgeError::MissingCredentials(self.reason.clone()))
    }
}
