//! Evaluation run configuration.
//!
//! Defaults, `EVAL_*` environment overrides, validation and builder methods
//! for everything the pipeline needs besides the agents themselves.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::eval::FallbackPolicy;
use crate::llm::DEFAULT_MODEL;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the runner does when evaluating one agent on one fixture fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log, record the agent's result as missing, keep going.
    #[default]
    ContinueRecordGap,
    /// Log, skip the fixture's remaining agent, emit the comparison with the gap.
    SkipFixture,
    /// Return the error and stop the run.
    AbortRun,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::ContinueRecordGap => write!(f, "continue"),
            FailurePolicy::SkipFixture => write!(f, "skip-fixture"),
            FailurePolicy::AbortRun => write!(f, "abort"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "continue" | "continue-record-gap" => Ok(FailurePolicy::ContinueRecordGap),
            "skip" | "skip-fixture" => Ok(FailurePolicy::SkipFixture),
            "abort" | "abort-run" => Ok(FailurePolicy::AbortRun),
            other => Err(format!(
                "unknown failure policy '{}' (expected continue, skip-fixture or abort)",
                other
            )),
        }
    }
}

/// Configuration for an evaluation run.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    // Pipeline behaviour
    pub failure_policy: FailurePolicy,
    /// Scores used when the judge cannot assess an attempt set.
    pub fallback: FallbackPolicy,
    /// Whether each comparison is checked against a stored baseline.
    pub compare_baseline: bool,

    // Generator settings
    /// Wall-clock limit for one generation attempt.
    pub generator_timeout: Duration,

    // Judge settings
    pub judge_model: String,
    pub judge_temperature: f64,
    pub judge_max_tokens: u32,

    // Storage settings
    /// Root for results, reports and baselines.
    pub output_dir: PathBuf,
    /// Root of the on-disk fixture directories.
    pub fixtures_dir: PathBuf,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            fallback: FallbackPolicy::default(),
            compare_baseline: true,

            generator_timeout: Duration::from_secs(120),

            judge_model: DEFAULT_MODEL.to_string(),
            judge_temperature: 0.0,
            judge_max_tokens: 1500,

            output_dir: PathBuf::from("./eval-output"),
            fixtures_dir: PathBuf::from("./fixtures"),
        }
    }
}

impl EvalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `EVAL_FAILURE_POLICY`: continue | skip-fixture | abort (default: continue)
    /// - `EVAL_COMPARE_BASELINE`: compare against stored baselines (default: true)
    /// - `EVAL_FALLBACK_CONSISTENCY`: fallback consistency score (default: 5.0)
    /// - `EVAL_FALLBACK_PENALTY`: fallback penalty per failed attempt (default: 1.0)
    /// - `EVAL_FALLBACK_TOTAL_FAILURE`: fallback impact when every attempt fails (default: -10.0)
    /// - `EVAL_GENERATOR_TIMEOUT_SECS`: per-attempt timeout (default: 120)
    /// - `EVAL_JUDGE_MODEL`: judge model identifier
    /// - `EVAL_JUDGE_TEMPERATURE`: judge temperature (default: 0.0)
    /// - `EVAL_JUDGE_MAX_TOKENS`: judge response limit (default: 1500)
    /// - `EVAL_OUTPUT_DIR`: results root (default: ./eval-output)
    /// - `EVAL_FIXTURES_DIR`: fixtures root (default: ./fixtures)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value or the result
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EvalConfig::from_env`] with a custom variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("EVAL_FAILURE_POLICY") {
            config.failure_policy = val.parse().map_err(|message| ConfigError::InvalidValue {
                key: "EVAL_FAILURE_POLICY".to_string(),
                message,
            })?;
        }

        if let Some(val) = lookup("EVAL_COMPARE_BASELINE") {
            config.compare_baseline = parse_env_bool(&val, "EVAL_COMPARE_BASELINE")?;
        }

        if let Some(val) = lookup("EVAL_FALLBACK_CONSISTENCY") {
            config.fallback.consistency_score = parse_env_value(&val, "EVAL_FALLBACK_CONSISTENCY")?;
        }

        if let Some(val) = lookup("EVAL_FALLBACK_PENALTY") {
            config.fallback.penalty_per_failure = parse_env_value(&val, "EVAL_FALLBACK_PENALTY")?;
        }

        if let Some(val) = lookup("EVAL_FALLBACK_TOTAL_FAILURE") {
            config.fallback.total_failure_impact =
                parse_env_value(&val, "EVAL_FALLBACK_TOTAL_FAILURE")?;
        }

        if let Some(val) = lookup("EVAL_GENERATOR_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "EVAL_GENERATOR_TIMEOUT_SECS")?;
            config.generator_timeout = Duration::from_secs(secs);
        }

        if let Some(val) = lookup("EVAL_JUDGE_MODEL") {
            config.judge_model = val;
        }

        if let Some(val) = lookup("EVAL_JUDGE_TEMPERATURE") {
            config.judge_temperature = parse_env_value(&val, "EVAL_JUDGE_TEMPERATURE")?;
        }

        if let Some(val) = lookup("EVAL_JUDGE_MAX_TOKENS") {
            config.judge_max_tokens = parse_env_value(&val, "EVAL_JUDGE_MAX_TOKENS")?;
        }

        if let Some(val) = lookup("EVAL_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(val);
        }

        if let Some(val) = lookup("EVAL_FIXTURES_DIR") {
            config.fixtures_dir = PathBuf::from(val);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fallback
            .validate()
            .map_err(ConfigError::ValidationFailed)?;

        if self.generator_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "generator_timeout must be greater than 0".to_string(),
            ));
        }

        if self.judge_model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "judge_model cannot be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.judge_temperature) {
            return Err(ConfigError::ValidationFailed(
                "judge_temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.judge_max_tokens == 0 {
            return Err(ConfigError::ValidationFailed(
                "judge_max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "output_dir cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_compare_baseline(mut self, enabled: bool) -> Self {
        self.compare_baseline = enabled;
        self
    }

    pub fn with_generator_timeout(mut self, timeout: Duration) -> Self {
        self.generator_timeout = timeout;
        self
    }

    pub fn with_judge_model(mut self, model: impl Into<String>) -> Self {
        self.judge_model = model.into();
        self
    }

    pub fn with_judge_temperature(mut self, temperature: f64) -> Self {
        self.judge_temperature = temperature;
        self
    }

    pub fn with_judge_max_tokens(mut self, max_tokens: u32) -> Self {
        self.judge_max_tokens = max_tokens;
        self
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn with_fixtures_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.fixtures_dir = path.into();
        self
    }
}

fn parse_env_value<T: FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = EvalConfig::default();
        assert_eq!(config.failure_policy, FailurePolicy::ContinueRecordGap);
        assert_eq!(config.generator_timeout, Duration::from_secs(120));
        assert!((config.fallback.consistency_score - 5.0).abs() < f64::EPSILON);
        assert!(config.compare_baseline);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = EvalConfig::from_lookup(lookup(&[
            ("EVAL_FAILURE_POLICY", "skip_fixture"),
            ("EVAL_COMPARE_BASELINE", "off"),
            ("EVAL_FALLBACK_CONSISTENCY", "4.5"),
            ("EVAL_GENERATOR_TIMEOUT_SECS", "30"),
            ("EVAL_JUDGE_MODEL", "openai/gpt-4o"),
            ("EVAL_OUTPUT_DIR", "/tmp/eval"),
        ]))
        .expect("valid config");

        assert_eq!(config.failure_policy, FailurePolicy::SkipFixture);
        assert!(!config.compare_baseline);
        assert!((config.fallback.consistency_score - 4.5).abs() < f64::EPSILON);
        assert_eq!(config.generator_timeout, Duration::from_secs(30));
        assert_eq!(config.judge_model, "openai/gpt-4o");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/eval"));
    }

    #[test]
    fn test_from_lookup_invalid_values() {
        let err = EvalConfig::from_lookup(lookup(&[("EVAL_GENERATOR_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("EVAL_GENERATOR_TIMEOUT_SECS"));

        let err = EvalConfig::from_lookup(lookup(&[("EVAL_FAILURE_POLICY", "retry")]))
            .unwrap_err();
        assert!(err.to_string().contains("unknown failure policy"));

        let err = EvalConfig::from_lookup(lookup(&[("EVAL_COMPARE_BASELINE", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_from_lookup_validates() {
        let err = EvalConfig::from_lookup(lookup(&[("EVAL_FALLBACK_TOTAL_FAILURE", "3")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationFailed(_)));
    }

    #[test]
    fn test_validation_failures() {
        let config = EvalConfig::default().with_generator_timeout(Duration::ZERO);
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("generator_timeout"));

        let config = EvalConfig::default().with_judge_model(" ");
        assert!(config.validate().unwrap_err().to_string().contains("judge_model"));

        let config = EvalConfig::default().with_judge_temperature(3.0);
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("judge_temperature"));

        let config = EvalConfig::default().with_judge_max_tokens(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_failure_policy_parse_and_display() {
        for policy in [
            FailurePolicy::ContinueRecordGap,
            FailurePolicy::SkipFixture,
            FailurePolicy::AbortRun,
        ] {
            assert_eq!(policy.to_string().parse::<FailurePolicy>(), Ok(policy));
        }
        assert_eq!("ABORT".parse::<FailurePolicy>(), Ok(FailurePolicy::AbortRun));
    }

    #[test]
    fn test_builder() {
        let config = EvalConfig::new()
            .with_failure_policy(FailurePolicy::AbortRun)
            .with_compare_baseline(false)
            .with_judge_max_tokens(800)
            .with_fixtures_dir("fx");
        assert_eq!(config.failure_policy, FailurePolicy::AbortRun);
        assert!(!config.compare_baseline);
        assert_eq!(config.judge_max_tokens, 800);
        assert_eq!(config.fixtures_dir, PathBuf::from("fx"));
    }
}
