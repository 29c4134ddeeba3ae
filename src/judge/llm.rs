//! LLM-as-judge over any [`LlmProvider`].

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::{Judge, MessageScore, MetaJudgement, MetaRequest, ScoreRequest};
use crate::error::JudgeError;
use crate::eval::AttemptOutcome;
use crate::llm::{GenerationRequest, GenerationResponse, LlmProvider, Message};
use crate::metrics::{MetricsCollector, TokenUsage};
use crate::utils::json_extraction::try_extract_json_object;

const DEFAULT_TEMPERATURE: f64 = 0.0;
const DEFAULT_MAX_TOKENS: u32 = 1500;

/// Diff characters included in judge prompts.
const MAX_DIFF_CHARS: usize = 12_000;

const SCORE_SYSTEM_PROMPT: &str = r#"You are a strict reviewer of git commit messages written in the Conventional Commits format.

Score the message against the diff on four dimensions, each from 0 to 10:
- clarity: is the subject easy to understand on its own?
- conventional_format: does the header follow type(scope): subject exactly?
- scope: are the type and scope the right ones for this change?
- specificity: does the message name what actually changed?

Reply with a single JSON object and nothing else:
{"clarity": <number>, "conventional_format": <number>, "scope": <number>, "specificity": <number>, "feedback": "<one sentence>"}"#;

const META_SYSTEM_PROMPT: &str = r#"You assess a commit message agent that was run three times on the same change.

Given the three attempts (successes with their scores, failures with their reasons), produce a holistic assessment:
- consistency_score (0-10): how consistent the successful messages are with each other
- error_rate_impact (<= 0): penalty for failed attempts, 0 when none failed
- final_score (0-10): overall quality, exactly 0 when no attempt succeeded
- best_attempt: the number (1-3) of the best successful attempt, or null when none succeeded
- success_rate: "K/3" where K is the number of successful attempts
- reasoning: two or three sentences

Reply with a single JSON object and nothing else:
{"consistency_score": <number>, "error_rate_impact": <number>, "final_score": <number>, "best_attempt": <number or null>, "success_rate": "K/3", "reasoning": "<text>"}"#;

/// Judge backed by a chat-completion model.
pub struct LlmJudge {
    llm: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
    max_tokens: u32,
    metrics: MetricsCollector,
}

impl LlmJudge {
    pub fn new(llm: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: String) -> Result<String, JudgeError> {
        let request = GenerationRequest::new(
            self.model.clone(),
            vec![Message::system(system), Message::user(user)],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens);

        let start = Instant::now();
        let result = self.llm.generate(request).await;
        let latency = start.elapsed().as_secs_f64();

        let response: GenerationResponse = match result {
            Ok(response) => response,
            Err(e) => {
                self.metrics
                    .record_llm_request(&self.model, false, latency, TokenUsage::default());
                return Err(e.into());
            }
        };
        self.metrics.record_llm_request(
            &self.model,
            true,
            latency,
            TokenUsage::new(
                response.usage.prompt_tokens as u64,
                response.usage.completion_tokens as u64,
            ),
        );

        response
            .first_content()
            .map(str::to_string)
            .ok_or_else(|| JudgeError::ParseError("response contained no choices".to_string()))
    }
}

fn truncate_diff(diff: &str) -> String {
    if diff.chars().count() <= MAX_DIFF_CHARS {
        return diff.to_string();
    }
    let mut truncated: String = diff.chars().take(MAX_DIFF_CHARS).collect();
    truncated.push_str("\n[diff truncated]");
    truncated
}

fn build_score_prompt(request: &ScoreRequest<'_>) -> String {
    let mut prompt = format!("Commit message:\n{}\n\n", request.message);
    if !request.expected_type.is_empty() {
        prompt.push_str(&format!("Expected commit type: {}\n\n", request.expected_type));
    }
    if !request.status.trim().is_empty() {
        prompt.push_str(&format!("git status:\n{}\n\n", request.status.trim_end()));
    }
    prompt.push_str(&format!("Diff:\n{}\n", truncate_diff(request.diff)));
    prompt
}

fn build_meta_prompt(request: &MetaRequest<'_>) -> String {
    let mut prompt = format!(
        "Agent: {}\nFixture: {}\n\nAttempts:\n",
        request.agent, request.fixture
    );
    for outcome in request.attempts.iter() {
        match outcome {
            AttemptOutcome::Success {
                attempt_number,
                commit_message,
                metrics,
                overall_score,
            } => prompt.push_str(&format!(
                "--- Attempt {} (success, overall {:.2}; clarity {:.1}, format {:.1}, scope {:.1}, specificity {:.1})\n{}\n",
                attempt_number,
                overall_score,
                metrics.clarity,
                metrics.conventional_format,
                metrics.scope,
                metrics.specificity,
                commit_message
            )),
            AttemptOutcome::Failure {
                attempt_number,
                failure_type,
                failure_reason,
            } => prompt.push_str(&format!(
                "--- Attempt {} (failure: {})\n{}\n",
                attempt_number, failure_type, failure_reason
            )),
        }
    }
    prompt.push_str(&format!("\nDiff:\n{}\n", truncate_diff(request.diff)));
    prompt
}

fn parse_reply<T: serde::de::DeserializeOwned>(reply: &str) -> Result<T, JudgeError> {
    let json = try_extract_json_object(reply)
        .into_result_with_context(reply)
        .map_err(|e| JudgeError::ParseError(e.to_string()))?;
    serde_json::from_str(&json).map_err(|e| JudgeError::ParseError(e.to_string()))
}

#[async_trait]
impl Judge for LlmJudge {
    fn name(&self) -> &str {
        &self.model
    }

    async fn score_message(&self, request: &ScoreRequest<'_>) -> Result<MessageScore, JudgeError> {
        let reply = self
            .complete(SCORE_SYSTEM_PROMPT, build_score_prompt(request))
            .await?;
        let score: MessageScore = parse_reply(&reply)?;
        score
            .metrics
            .validate()
            .map_err(JudgeError::InvalidJudgement)?;
        Ok(score)
    }

    async fn evaluate_attempts(
        &self,
        request: &MetaRequest<'_>,
    ) -> Result<MetaJudgement, JudgeError> {
        let reply = self
            .complete(META_SYSTEM_PROMPT, build_meta_prompt(request))
            .await?;
        let judgement: MetaJudgement = parse_reply(&reply)?;
        tracing::debug!(
            agent = request.agent,
            fixture = request.fixture,
            final_score = judgement.final_score,
            "Judge returned meta judgement"
        );
        Ok(judgement)
    }
}
