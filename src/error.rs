//! Error types for commit-eval operations.
//!
//! Defines error types for every collaborator boundary:
//! - LLM API interactions
//! - Commit message generation (absorbed into attempt failures)
//! - Judge calls (absorbed by the inline scorer or the fallback path)
//! - Fixture loading
//! - Report persistence
//! - The evaluation pipeline itself

use thiserror::Error;

use crate::eval::FailureType;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: OPENROUTER_API_KEY or LITELLM_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("Missing API base URL: LITELLM_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors a commit message generator can report for a single attempt.
///
/// The variant decides which [`FailureType`] the attempt is recorded as.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The agent CLI or API cannot be reached at all.
    #[error("Generator unavailable: {0}")]
    Unavailable(String),

    /// The backing API answered with an error status.
    #[error("Generator API error: {0}")]
    Api(String),

    /// The agent process ran but did not finish cleanly.
    #[error("Generator execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Generator timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Generator returned empty output")]
    EmptyOutput,

    #[error("Generator returned malformed output: {0}")]
    MalformedOutput(String),
}

impl GeneratorError {
    /// Classify this error as an attempt failure type.
    pub fn failure_type(&self) -> FailureType {
        match self {
            GeneratorError::Unavailable(_) | GeneratorError::Api(_) => FailureType::ApiError,
            GeneratorError::ExecutionFailed(_)
            | GeneratorError::Timeout { .. }
            | GeneratorError::EmptyOutput
            | GeneratorError::MalformedOutput(_) => FailureType::Generation,
        }
    }
}

impl From<LlmError> for GeneratorError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::MissingApiKey | LlmError::MissingApiBase | LlmError::RequestFailed(_) => {
                GeneratorError::Unavailable(err.to_string())
            }
            LlmError::RateLimited(_) | LlmError::ApiError { .. } => {
                GeneratorError::Api(err.to_string())
            }
            LlmError::ParseError(msg) => GeneratorError::MalformedOutput(msg),
            LlmError::Io(e) => GeneratorError::ExecutionFailed(e.to_string()),
        }
    }
}

/// Errors that can occur while asking the judge for a score.
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("Judge credentials missing: {0}")]
    MissingCredentials(String),

    #[error("Judge rate limited: {0}")]
    RateLimited(String),

    #[error("Judge API error: {0}")]
    Api(String),

    #[error("Judge timed out: {0}")]
    Timeout(String),

    #[error("Failed to parse judge response: {0}")]
    ParseError(String),

    /// The judge answered, but its answer breaks the result invariants.
    #[error("Judge returned an invalid judgement: {0}")]
    InvalidJudgement(String),
}

impl From<LlmError> for JudgeError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::MissingApiKey | LlmError::MissingApiBase => {
                JudgeError::MissingCredentials(err.to_string())
            }
            LlmError::RateLimited(msg) => JudgeError::RateLimited(msg),
            LlmError::RequestFailed(msg) if msg.contains("timed out") || msg.contains("timeout") => {
                JudgeError::Timeout(msg)
            }
            LlmError::RequestFailed(msg) => JudgeError::Api(msg),
            LlmError::ApiError { .. } => JudgeError::Api(err.to_string()),
            LlmError::ParseError(msg) => JudgeError::ParseError(msg),
            LlmError::Io(e) => JudgeError::Api(e.to_string()),
        }
    }
}

/// Errors that can occur while loading fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Fixture '{0}' not found")]
    Missing(String),

    #[error("Fixture '{name}' is invalid: {reason}")]
    Invalid { name: String, reason: String },

    #[error("Failed to inspect repository: {0}")]
    Repository(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors that can occur while persisting results or rendering reports.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Report template error: {0}")]
    Template(#[from] tera::Error),
}

/// Errors raised by the evaluation pipeline.
///
/// Generation and judge failures never show up here; they are folded into
/// attempt outcomes or fallback results before reaching this layer.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Missing fixture, missing credentials or an unusable configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A caller or collaborator broke a data-model contract.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

impl From<FixtureError> for EvalError {
    fn from(err: FixtureError) -> Self {
        EvalError::Configuration(err.to_string())
    }
}

impl From<crate::config::ConfigError> for EvalError {
    fn from(err: crate::config::ConfigError) -> Self {
        EvalError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_error_failure_types() {
        assert_eq!(
            GeneratorError::Unavailable("claude not found".into()).failure_type(),
            FailureType::ApiError
        );
        assert_eq!(
            GeneratorError::Api("503".into()).failure_type(),
            FailureType::ApiError
        );
        assert_eq!(
            GeneratorError::Timeout { seconds: 30 }.failure_type(),
            FailureType::Generation
        );
        assert_eq!(
            GeneratorError::EmptyOutput.failure_type(),
            FailureType::Generation
        );
        assert_eq!(
            GeneratorError::ExecutionFailed("exit 1".into()).failure_type(),
            FailureType::Generation
        );
    }

    #[test]
    fn test_llm_error_into_generator_error() {
        let err: GeneratorError = LlmError::RequestFailed("connection refused".into()).into();
        assert!(matches!(err, GeneratorError::Unavailable(_)));

        let err: GeneratorError = LlmError::RateLimited("slow down".into()).into();
        assert!(matches!(err, GeneratorError::Api(_)));

        let err: GeneratorError = LlmError::ParseError("bad json".into()).into();
        assert!(matches!(err, GeneratorError::MalformedOutput(_)));
    }

    #[test]
    fn test_llm_error_into_judge_error() {
        let err: JudgeError = LlmError::MissingApiKey.into();
        assert!(matches!(err, JudgeError::MissingCredentials(_)));

        let err: JudgeError = LlmError::RequestFailed("operation timed out".into()).into();
        assert!(matches!(err, JudgeError::Timeout(_)));

        let err: JudgeError = LlmError::ApiError {
            code: 500,
            message: "boom".into(),
        }
        .into();
        assert!(matches!(err, JudgeError::Api(msg) if msg.contains("500")));
    }

    #[test]
    fn test_fixture_error_is_configuration_error() {
        let err: EvalError = FixtureError::Missing("simple".into()).into();
        assert!(matches!(err, EvalError::Configuration(msg) if msg.contains("simple")));
    }
}
