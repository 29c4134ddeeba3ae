//! Holistic per-agent scoring with a deterministic fallback.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::scoring::{best_attempt, fallback_final_score, FallbackPolicy, FALLBACK_REASONING};
use super::types::{AttemptSet, EvalResult, EvalResultDraft, ScoringPath, SuccessRate};
use crate::error::{EvalError, JudgeError};
use crate::judge::{Judge, MetaJudgement, MetaRequest};
use crate::metrics::MetricsCollector;

/// Builds one [`EvalResult`] per agent and fixture.
pub struct MetaEvaluator {
    judge: Arc<dyn Judge>,
    policy: FallbackPolicy,
    metrics: MetricsCollector,
}

impl MetaEvaluator {
    pub fn new(judge: Arc<dyn Judge>, policy: FallbackPolicy) -> Self {
        Self {
            judge,
            policy,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn policy(&self) -> &FallbackPolicy {
        &self.policy
    }

    /// Score an attempt set through the judge, falling back to local scoring.
    ///
    /// Judge failures and rejected judgements never surface as errors. An
    /// error means the locally built result broke an invariant.
    pub async fn evaluate(
        &self,
        agent: &str,
        attempts: &AttemptSet,
        diff: &str,
        fixture: &str,
    ) -> Result<EvalResult, EvalError> {
        let request = MetaRequest {
            agent,
            fixture,
            attempts,
            diff,
        };

        let judged = self
            .judge
            .evaluate_attempts(&request)
            .await
            .and_then(|judgement| accept_judgement(agent, fixture, attempts, judgement));

        let result = match judged {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    agent = agent,
                    fixture = fixture,
                    judge = self.judge.name(),
                    error = %e,
                    "Judge assessment unusable, using fallback scoring"
                );
                self.fallback(agent, fixture, attempts)?
            }
        };

        info!(
            agent = agent,
            fixture = fixture,
            path = %result.scoring(),
            final_score = result.final_score(),
            success_rate = %result.success_rate(),
            "Evaluation complete"
        );
        self.metrics.record_evaluation(&result);
        Ok(result)
    }

    /// Deterministic result computed from the attempts alone.
    pub fn fallback(
        &self,
        agent: &str,
        fixture: &str,
        attempts: &AttemptSet,
    ) -> Result<EvalResult, EvalError> {
        EvalResult::try_from(EvalResultDraft {
            agent: agent.to_string(),
            fixture: fixture.to_string(),
            attempts: attempts.clone(),
            best_attempt: best_attempt(attempts),
            consistency_score: self.policy.consistency_score,
            error_rate_impact: self.policy.error_rate_impact(attempts.failure_count()),
            final_score: fallback_final_score(attempts),
            success_rate: attempts.success_rate(),
            reasoning: FALLBACK_REASONING.to_string(),
            scoring: ScoringPath::Fallback,
            evaluated_at: Utc::now(),
        })
    }
}

/// Validate a judge's answer against the attempts it assessed.
///
/// Any inconsistency rejects the whole judgement; nothing is corrected.
pub fn accept_judgement(
    agent: &str,
    fixture: &str,
    attempts: &AttemptSet,
    judgement: MetaJudgement,
) -> Result<EvalResult, JudgeError> {
    let success_rate: SuccessRate = judgement
        .success_rate
        .parse()
        .map_err(JudgeError::InvalidJudgement)?;

    EvalResult::try_from(EvalResultDraft {
        agent: agent.to_string(),
        fixture: fixture.to_string(),
        attempts: attempts.clone(),
        best_attempt: judgement.best_attempt,
        consistency_score: judgement.consistency_score,
        error_rate_impact: judgement.error_rate_impact,
        final_score: judgement.final_score,
        success_rate,
        reasoning: judgement.reasoning,
        scoring: ScoringPath::Judge,
        evaluated_at: Utc::now(),
    })
    .map_err(|e| JudgeError::InvalidJudgement(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::types::{AttemptMetrics, AttemptOutcome, FailureType};
    use crate::judge::{MessageScore, ScoreRequest, UnavailableJudge};
    use async_trait::async_trait;

    struct FixedMetaJudge(MetaJudgement);

    #[async_trait]
    impl Judge for FixedMetaJudge {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn score_message(
            &self,
            _request: &ScoreRequest<'_>,
        ) -> Result<MessageScore, JudgeError> {
            Err(JudgeError::Api("not used".to_string()))
        }

        async fn evaluate_attempts(
            &self,
            _request: &MetaRequest<'_>,
        ) -> Result<MetaJudgement, JudgeError> {
            Ok(self.0.clone())
        }
    }

    fn success(n: u8, score: f64) -> AttemptOutcome {
        AttemptOutcome::success(
            n,
            "feat(parser): add parse_expr",
            AttemptMetrics::new(score, score, score, score),
        )
        .expect("valid success")
    }

    fn failure(n: u8) -> AttemptOutcome {
        AttemptOutcome::failure(n, FailureType::Validation, "missing type prefix")
    }

    fn judgement() -> MetaJudgement {
        MetaJudgement {
            consistency_score: 8.0,
            error_rate_impact: 0.0,
            final_score: 8.6,
            reasoning: "Three consistent, well-scoped messages.".to_string(),
            best_attempt: Some(2),
            success_rate: "3/3".to_string(),
        }
    }

    fn all_success() -> AttemptSet {
        AttemptSet::new(vec![success(1, 8.5), success(2, 8.75), success(3, 8.5)])
            .expect("three attempts")
    }

    fn evaluator(judge: impl Judge + 'static) -> MetaEvaluator {
        MetaEvaluator::new(Arc::new(judge), FallbackPolicy::default())
    }

    #[tokio::test]
    async fn test_judge_path() {
        let result = evaluator(FixedMetaJudge(judgement()))
            .evaluate("claude", &all_success(), "+x", "simple")
            .await
            .expect("result");
        assert_eq!(result.scoring(), ScoringPath::Judge);
        assert_eq!(result.best_attempt(), Some(2));
        assert!((result.final_score() - 8.6).abs() < 1e-9);
        assert_eq!(result.success_rate().to_string(), "3/3");
    }

    #[tokio::test]
    async fn test_fallback_when_judge_unavailable() {
        let result = evaluator(UnavailableJudge::default())
            .evaluate("claude", &all_success(), "+x", "simple")
            .await
            .expect("result");
        assert_eq!(result.scoring(), ScoringPath::Fallback);
        assert!((result.final_score() - 8.583).abs() < 0.01);
        assert_eq!(result.best_attempt(), Some(2));
        assert!((result.consistency_score() - 5.0).abs() < 1e-9);
        assert_eq!(result.error_rate_impact(), 0.0);
        assert_eq!(result.reasoning(), FALLBACK_REASONING);
    }

    #[tokio::test]
    async fn test_fallback_all_failures() {
        let attempts = AttemptSet::new(vec![failure(1), failure(2), failure(3)]).expect("set");
        let result = evaluator(UnavailableJudge::default())
            .evaluate("codex", &attempts, "+x", "simple")
            .await
            .expect("zero successes is a valid result");
        assert_eq!(result.final_score(), 0.0);
        assert_eq!(result.best_attempt(), None);
        assert_eq!(result.success_rate().to_string(), "0/3");
        assert_eq!(result.error_rate_impact(), -10.0);
    }

    #[tokio::test]
    async fn test_fallback_partial_failures() {
        let attempts =
            AttemptSet::new(vec![failure(1), success(2, 6.0), success(3, 7.0)]).expect("set");
        let result = evaluator(UnavailableJudge::default())
            .evaluate("codex", &attempts, "+x", "simple")
            .await
            .expect("result");
        assert_eq!(result.best_attempt(), Some(3));
        assert!((result.final_score() - 6.5).abs() < 1e-9);
        assert_eq!(result.error_rate_impact(), -1.0);
    }

    #[tokio::test]
    async fn test_best_attempt_on_failure_is_rejected() {
        let attempts =
            AttemptSet::new(vec![failure(1), success(2, 8.0), success(3, 8.0)]).expect("set");
        let bad = MetaJudgement {
            best_attempt: Some(1),
            success_rate: "2/3".to_string(),
            ..judgement()
        };
        assert!(matches!(
            accept_judgement("claude", "simple", &attempts, bad.clone()),
            Err(JudgeError::InvalidJudgement(_))
        ));

        let result = evaluator(FixedMetaJudge(bad))
            .evaluate("claude", &attempts, "+x", "simple")
            .await
            .expect("fallback result");
        assert_eq!(result.scoring(), ScoringPath::Fallback);
        assert_eq!(result.best_attempt(), Some(2));
    }

    #[tokio::test]
    async fn test_inconsistent_success_rate_is_rejected() {
        let bad = MetaJudgement {
            success_rate: "2/3".to_string(),
            ..judgement()
        };
        let err = accept_judgement("claude", "simple", &all_success(), bad).unwrap_err();
        assert!(matches!(err, JudgeError::InvalidJudgement(msg) if msg.contains("success rate")));

        let unparsable = MetaJudgement {
            success_rate: "three of three".to_string(),
            ..judgement()
        };
        assert!(accept_judgement("claude", "simple", &all_success(), unparsable).is_err());
    }

    #[tokio::test]
    async fn test_nonzero_final_score_without_successes_is_rejected() {
        let attempts = AttemptSet::new(vec![failure(1), failure(2), failure(3)]).expect("set");
        let bad = MetaJudgement {
            best_attempt: None,
            success_rate: "0/3".to_string(),
            final_score: 2.0,
            ..judgement()
        };
        let result = evaluator(FixedMetaJudge(bad))
            .evaluate("claude", &attempts, "+x", "simple")
            .await
            .expect("fallback result");
        assert_eq!(result.scoring(), ScoringPath::Fallback);
        assert_eq!(result.final_score(), 0.0);
    }

    #[tokio::test]
    async fn test_out_of_range_scores_are_rejected() {
        let too_high = MetaJudgement {
            final_score: 11.0,
            ..judgement()
        };
        assert!(accept_judgement("claude", "simple", &all_success(), too_high).is_err());

        let positive_impact = MetaJudgement {
            error_rate_impact: 1.0,
            ..judgement()
        };
        assert!(accept_judgement("claude", "simple", &all_success(), positive_impact).is_err());
    }

    #[tokio::test]
    async fn test_fallback_is_idempotent() {
        let evaluator = evaluator(UnavailableJudge::default());
        let attempts =
            AttemptSet::new(vec![success(1, 7.0), failure(2), success(3, 9.0)]).expect("set");
        let first = evaluator.fallback("claude", "simple", &attempts).expect("first");
        let second = evaluator.fallback("claude", "simple", &attempts).expect("second");
        assert_eq!(first.final_score(), second.final_score());
        assert_eq!(first.best_attempt(), second.best_attempt());
        assert_eq!(first.error_rate_impact(), second.error_rate_impact());
        assert_eq!(first.consistency_score(), second.consistency_score());
    }

    #[tokio::test]
    async fn test_empty_agent_name_is_invariant_violation() {
        let err = evaluator(UnavailableJudge::default())
            .evaluate("", &all_success(), "+x", "simple")
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::InvariantViolation(_)));
    }
}
