//! Generator that asks a chat-completion model directly.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::{GenerationTask, Generator, SYSTEM_PROMPT};
use crate::error::GeneratorError;
use crate::llm::{GenerationRequest, LlmProvider, Message};
use crate::metrics::{MetricsCollector, TokenUsage};

const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 400;

/// Commit message generator over any [`LlmProvider`].
pub struct LlmGenerator {
    name: String,
    llm: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
    max_tokens: u32,
    metrics: MetricsCollector,
}

impl LlmGenerator {
    /// Create a generator for `model`; the agent is named `llm:<model>`.
    pub fn new(llm: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            name: format!("llm:{}", model),
            llm,
            model,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
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
}

#[async_trait]
impl Generator for LlmGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, task: &GenerationTask) -> Result<String, GeneratorError> {
        let request = GenerationRequest::new(
            self.model.clone(),
            vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(task.prompt.clone()),
            ],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens);

        let start = Instant::now();
        let result = self.llm.generate(request).await;
        let latency = start.elapsed().as_secs_f64();

        let response = match result {
            Ok(response) => {
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
            }
            Err(e) => {
                self.metrics
                    .record_llm_request(&self.model, false, latency, TokenUsage::default());
                tracing::warn!(agent = %self.name, error = %e, "LLM generation failed");
                return Err(e.into());
            }
        };

        match response.first_content() {
            Some(content) if !content.trim().is_empty() => Ok(content.to_string()),
            Some(_) => Err(GeneratorError::EmptyOutput),
            None => Err(GeneratorError::MalformedOutput(
                "response contained no choices".to_string(),
            )),
        }
    }
}
