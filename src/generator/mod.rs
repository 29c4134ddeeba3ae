//! Commit message generators.
//!
//! A [`Generator`] turns a [`GenerationTask`] into raw text. The attempt
//! runner treats that text as untrusted: cleaning and validation happen there,
//! not here. Implementations:
//!
//! - [`CliGenerator`]: a command-line agent such as `claude` or `codex`
//! - [`LlmGenerator`]: a direct chat completion against an [`LlmProvider`]
//!
//! [`LlmProvider`]: crate::llm::LlmProvider

pub mod cli;
pub mod llm;

pub use cli::CliGenerator;
pub use llm::LlmGenerator;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GeneratorError;
use crate::fixtures::Fixture;

/// Instructions shared by every generator.
pub const SYSTEM_PROMPT: &str = "You write git commit messages in the Conventional Commits \
format. Reply with the commit message only: no explanation, no code fences, no quotes.";

/// Input for one generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTask {
    pub fixture: String,
    /// 1-based attempt number, useful for logs only.
    pub attempt_number: u8,
    pub diff: String,
    pub status: String,
    pub description: String,
    /// Fully rendered user prompt.
    pub prompt: String,
}

impl GenerationTask {
    pub fn from_fixture(fixture: &Fixture, attempt_number: u8) -> Self {
        Self {
            fixture: fixture.name.clone(),
            attempt_number,
            diff: fixture.diff.clone(),
            status: fixture.status.clone(),
            description: fixture.description.clone(),
            prompt: render_prompt(fixture),
        }
    }
}

/// Render the single prompt template used for every fixture.
pub fn render_prompt(fixture: &Fixture) -> String {
    let mut prompt = String::from(
        "Write a commit message for the staged changes below.\n\n\
         Rules:\n\
         - Header format: type(scope): subject\n\
         - Allowed types: feat, fix, docs, style, refactor, perf, test, build, ci, chore, revert\n\
         - Subject in imperative mood, no trailing period, header at most 72 characters\n\
         - Optional body separated from the header by a blank line\n\n",
    );

    if !fixture.description.trim().is_empty() {
        prompt.push_str("Context: ");
        prompt.push_str(fixture.description.trim());
        prompt.push_str("\n\n");
    }

    if !fixture.status.trim().is_empty() {
        prompt.push_str("git status --porcelain:\n");
        prompt.push_str(fixture.status.trim_end());
        prompt.push_str("\n\n");
    }

    prompt.push_str("git diff --cached:\n");
    prompt.push_str(fixture.diff.trim_end());
    prompt.push('\n');
    prompt
}

/// Something that produces a commit message for a task.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Produce raw output for one attempt.
    async fn generate(&self, task: &GenerationTask) -> Result<String, GeneratorError>;
}

/// A named competitor in a comparison.
#[derive(Clone)]
pub struct Agent {
    name: String,
    generator: Arc<dyn Generator>,
}

impl Agent {
    pub fn new(name: impl Into<String>, generator: Arc<dyn Generator>) -> Self {
        Self {
            name: name.into(),
            generator,
        }
    }

    /// Use the generator's own name as the agent name.
    pub fn from_generator(generator: Arc<dyn Generator>) -> Self {
        Self {
            name: generator.name().to_string(),
            generator,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("generator", &self.generator.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Generator for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, task: &GenerationTask) -> Result<String, GeneratorError> {
            Ok(format!("chore: attempt {}", task.attempt_number))
        }
    }

    #[test]
    fn test_prompt_contains_context() {
        let fixture = Fixture::new("simple", "+fn parse() {}")
            .with_status("M  src/lib.rs")
            .with_description("Adds a parser");
        let prompt = render_prompt(&fixture);
        assert!(prompt.contains("Context: Adds a parser"));
        assert!(prompt.contains("M  src/lib.rs"));
        assert!(prompt.ends_with("+fn parse() {}\n"));
    }

    #[test]
    fn test_prompt_skips_empty_sections() {
        let prompt = render_prompt(&Fixture::new("bare", "+x"));
        assert!(!prompt.contains("Context:"));
        assert!(!prompt.contains("git status"));
    }

    #[test]
    fn test_task_from_fixture() {
        let fixture = Fixture::new("simple", "+x").with_description("d");
        let task = GenerationTask::from_fixture(&fixture, 2);
        assert_eq!(task.fixture, "simple");
        assert_eq!(task.attempt_number, 2);
        assert_eq!(task.prompt, render_prompt(&fixture));
    }

    #[tokio::test]
    async fn test_agent_names() {
        let agent = Agent::from_generator(Arc::new(Echo));
        assert_eq!(agent.name(), "echo");
        let renamed = Agent::new("baseline", Arc::new(Echo));
        assert_eq!(renamed.name(), "baseline");

        let task = GenerationTask::from_fixture(&Fixture::new("f", "+x"), 3);
        let out = renamed.generator().generate(&task).await.expect("echo output");
        assert_eq!(out, "chore: attempt 3");
    }
}
