//! Attempt runner: three independent generations per agent and fixture.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::types::{AttemptMetrics, AttemptOutcome, AttemptSet, FailureType, ATTEMPTS_PER_AGENT};
use crate::commit::{clean_message, find_artifact, score_heuristically, ConventionalCommit};
use crate::error::EvalError;
use crate::fixtures::Fixture;
use crate::generator::{Agent, GenerationTask};
use crate::judge::{Judge, ScoreRequest};
use crate::metrics::MetricsCollector;

/// Cleaned and structurally valid generator output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedOutput {
    pub message: String,
    pub commit: ConventionalCommit,
}

/// Clean raw generator output and check its structure.
///
/// Returns the failure type and reason when the output is unusable.
pub fn classify_output(raw: &str) -> Result<ClassifiedOutput, (FailureType, String)> {
    let message = clean_message(raw);
    if message.is_empty() {
        return Err((
            FailureType::Generation,
            "output is empty after cleaning".to_string(),
        ));
    }

    if let Some(artifact) = find_artifact(&message) {
        return Err((
            FailureType::Cleaning,
            format!("artifact left after cleaning: {}", artifact),
        ));
    }

    let commit = ConventionalCommit::parse(&message)
        .map_err(|issue| (FailureType::Validation, issue.to_string()))?;

    Ok(ClassifiedOutput { message, commit })
}

/// Runs and classifies generation attempts.
pub struct AttemptRunner {
    judge: Arc<dyn Judge>,
    metrics: MetricsCollector,
}

impl AttemptRunner {
    pub fn new(judge: Arc<dyn Judge>) -> Self {
        Self {
            judge,
            metrics: MetricsCollector::new(),
        }
    }

    /// Run attempts 1, 2 and 3 in order.
    ///
    /// Generator and judge failures are recorded in the outcomes; only a
    /// malformed fixture is an error.
    pub async fn run_attempts(
        &self,
        agent: &Agent,
        fixture: &Fixture,
    ) -> Result<AttemptSet, EvalError> {
        fixture
            .validate()
            .map_err(|e| EvalError::InvariantViolation(e.to_string()))?;

        let mut outcomes = Vec::with_capacity(ATTEMPTS_PER_AGENT);
        for attempt_number in 1..=ATTEMPTS_PER_AGENT as u8 {
            let start = Instant::now();
            let outcome = self.run_attempt(agent, fixture, attempt_number).await?;
            let duration = start.elapsed().as_secs_f64();

            self.metrics.record_attempt(agent.name(), &outcome, duration);
            match &outcome {
                AttemptOutcome::Success { overall_score, .. } => info!(
                    agent = agent.name(),
                    fixture = %fixture.name,
                    attempt = attempt_number,
                    overall_score = overall_score,
                    "Attempt succeeded"
                ),
                AttemptOutcome::Failure {
                    failure_type,
                    failure_reason,
                    ..
                } => warn!(
                    agent = agent.name(),
                    fixture = %fixture.name,
                    attempt = attempt_number,
                    failure_type = %failure_type,
                    reason = %failure_reason,
                    "Attempt failed"
                ),
            }
            outcomes.push(outcome);
        }

        AttemptSet::new(outcomes)
    }

    async fn run_attempt(
        &self,
        agent: &Agent,
        fixture: &Fixture,
        attempt_number: u8,
    ) -> Result<AttemptOutcome, EvalError> {
        let task = GenerationTask::from_fixture(fixture, attempt_number);

        let raw = match agent.generator().generate(&task).await {
            Ok(raw) => raw,
            Err(e) => {
                return Ok(AttemptOutcome::failure(
                    attempt_number,
                    e.failure_type(),
                    e.to_string(),
                ));
            }
        };

        let classified = match classify_output(&raw) {
            Ok(classified) => classified,
            Err((failure_type, reason)) => {
                return Ok(AttemptOutcome::failure(attempt_number, failure_type, reason));
            }
        };

        let metrics = self.score(&classified, fixture).await;
        AttemptOutcome::success(attempt_number, classified.message, metrics)
    }

    /// Judge scores when usable, inline heuristic scores otherwise.
    async fn score(&self, classified: &ClassifiedOutput, fixture: &Fixture) -> AttemptMetrics {
        let request = ScoreRequest {
            message: &classified.message,
            diff: &fixture.diff,
            status: &fixture.status,
            expected_type: &fixture.expected_type,
        };

        match self.judge.score_message(&request).await {
            Ok(score) => match score.metrics.validate() {
                Ok(()) => {
                    debug!(judge = self.judge.name(), feedback = %score.feedback, "Judge scored message");
                    return score.metrics;
                }
                Err(reason) => warn!(
                    judge = self.judge.name(),
                    reason = %reason,
                    "Judge metrics out of range, using inline scorer"
                ),
            },
            Err(e) => warn!(
                judge = self.judge.name(),
                error = %e,
                "Judge could not score message, using inline scorer"
            ),
        }

        score_heuristically(&classified.commit, &fixture.diff, &fixture.expected_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GeneratorError, JudgeError};
    use crate::generator::Generator;
    use crate::judge::{MessageScore, MetaJudgement, MetaRequest, UnavailableJudge};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays scripted generator results in order.
    struct ScriptedGenerator {
        replies: Mutex<Vec<Result<String, GeneratorError>>>,
        calls: Mutex<Vec<u8>>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<Result<String, GeneratorError>>) -> Self {
            let mut replies = replies;
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, task: &GenerationTask) -> Result<String, GeneratorError> {
            self.calls.lock().expect("lock poisoned").push(task.attempt_number);
            self.replies
                .lock()
                .expect("lock poisoned")
                .pop()
                .unwrap_or(Err(GeneratorError::EmptyOutput))
        }
    }

    struct FixedJudge(AttemptMetrics);

    #[async_trait]
    impl Judge for FixedJudge {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn score_message(
            &self,
            _request: &ScoreRequest<'_>,
        ) -> Result<MessageScore, JudgeError> {
            Ok(MessageScore {
                metrics: self.0,
                feedback: String::new(),
            })
        }

        async fn evaluate_attempts(
            &self,
            _request: &MetaRequest<'_>,
        ) -> Result<MetaJudgement, JudgeError> {
            Err(JudgeError::Api("not used".to_string()))
        }
    }

    fn fixture() -> Fixture {
        Fixture::new(
            "simple",
            "diff --git a/src/parser.rs b/src/parser.rs\n+pub fn parse_expr() {}\n",
        )
        .with_expected_type("feat")
    }

    fn agent(replies: Vec<Result<String, GeneratorError>>) -> (Agent, Arc<ScriptedGenerator>) {
        let generator = Arc::new(ScriptedGenerator::new(replies));
        (Agent::new("scripted", generator.clone()), generator)
    }

    #[test]
    fn test_classify_output() {
        let ok = classify_output("```\nfeat(parser): add parse_expr\n```").expect("valid");
        assert_eq!(ok.message, "feat(parser): add parse_expr");
        assert_eq!(ok.commit.scope.as_deref(), Some("parser"));

        let (kind, _) = classify_output("  \n ").unwrap_err();
        assert_eq!(kind, FailureType::Generation);

        let (kind, reason) = classify_output("Added a parser.").unwrap_err();
        assert_eq!(kind, FailureType::Validation);
        assert!(reason.contains("does not match"));

        let (kind, _) = classify_output("feat: add parser\n\nLet me know if you want changes")
            .unwrap_err();
        assert_eq!(kind, FailureType::Cleaning);
    }

    #[tokio::test]
    async fn test_runs_three_attempts_in_order() {
        let (agent, generator) = agent(vec![
            Ok("feat(parser): add parse_expr".to_string()),
            Err(GeneratorError::Timeout { seconds: 30 }),
            Ok("not a conventional commit".to_string()),
        ]);
        let runner = AttemptRunner::new(Arc::new(FixedJudge(AttemptMetrics::new(
            8.0, 9.0, 8.0, 7.0,
        ))));

        let set = runner.run_attempts(&agent, &fixture()).await.expect("attempts");
        assert_eq!(*generator.calls.lock().expect("lock poisoned"), vec![1, 2, 3]);

        let numbers: Vec<u8> = set.iter().map(|o| o.attempt_number()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(set.success_count(), 1);
        assert_eq!(set.get(1).and_then(|o| o.overall_score()), Some(8.0));
        assert_eq!(set.get(2).and_then(|o| o.failure_type()), Some(FailureType::Generation));
        assert_eq!(set.get(3).and_then(|o| o.failure_type()), Some(FailureType::Validation));
    }

    #[tokio::test]
    async fn test_unreachable_generator_is_api_error() {
        let (agent, _) = agent(vec![
            Err(GeneratorError::Unavailable("claude: not found".into())),
            Err(GeneratorError::Unavailable("claude: not found".into())),
            Err(GeneratorError::Unavailable("claude: not found".into())),
        ]);
        let runner = AttemptRunner::new(Arc::new(UnavailableJudge::default()));
        let set = runner.run_attempts(&agent, &fixture()).await.expect("attempts");
        assert_eq!(set.success_count(), 0);
        assert!(set
            .iter()
            .all(|o| o.failure_type() == Some(FailureType::ApiError)));
    }

    #[tokio::test]
    async fn test_judge_failure_uses_inline_scorer() {
        let (agent, _) = agent(vec![
            Ok("feat(parser): add parse_expr helper".to_string()),
            Ok("feat(parser): add parse_expr helper".to_string()),
            Ok("feat(parser): add parse_expr helper".to_string()),
        ]);
        let runner = AttemptRunner::new(Arc::new(UnavailableJudge::default()));
        let set = runner.run_attempts(&agent, &fixture()).await.expect("attempts");
        assert_eq!(set.success_count(), 3);

        let commit = ConventionalCommit::parse("feat(parser): add parse_expr helper").expect("valid");
        let expected = score_heuristically(&commit, &fixture().diff, "feat").overall();
        for outcome in set.iter() {
            assert_eq!(outcome.overall_score(), Some(expected));
        }
    }

    #[tokio::test]
    async fn test_out_of_range_judge_metrics_use_inline_scorer() {
        let (agent, _) = agent(vec![
            Ok("fix(parser): handle empty input".to_string()),
            Ok("fix(parser): handle empty input".to_string()),
            Ok("fix(parser): handle empty input".to_string()),
        ]);
        let runner = AttemptRunner::new(Arc::new(FixedJudge(AttemptMetrics::new(
            11.0, 9.0, 8.0, 7.0,
        ))));
        let set = runner.run_attempts(&agent, &fixture()).await.expect("attempts");
        for outcome in set.iter() {
            let score = outcome.overall_score().expect("success");
            assert!((0.0..=10.0).contains(&score));
        }
    }

    #[tokio::test]
    async fn test_malformed_fixture_is_invariant_violation() {
        let (agent, generator) = agent(vec![]);
        let runner = AttemptRunner::new(Arc::new(UnavailableJudge::default()));
        let err = runner
            .run_attempts(&agent, &Fixture::new("empty", "  "))
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::InvariantViolation(msg) if msg.contains("diff is empty")));
        assert!(generator.calls.lock().expect("lock poisoned").is_empty());
    }
}
