//! OpenRouter provider with retry on transient failures.
//!
//! Wraps the OpenAI-compatible [`LiteLlmClient`] and retries rate limits,
//! 5xx responses and connection problems with exponential backoff.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::LlmError;
use crate::llm::{GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider};

/// Default OpenRouter API endpoint.
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Maximum number of attempts for one request, including the first.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff in milliseconds.
const BASE_RETRY_DELAY_MS: u64 = 1000;

/// OpenRouter provider for LLM requests.
pub struct OpenRouterProvider {
    inner: LiteLlmClient,
    api_key: String,
    base_retry_delay: Duration,
}

impl OpenRouterProvider {
    /// Create a provider that uses `model` when a request names none.
    pub fn with_model(api_key: String, model: String) -> Result<Self, LlmError> {
        Self::with_custom_url(api_key, OPENROUTER_BASE_URL.to_string(), model)
    }

    /// Create a provider against an OpenRouter-compatible endpoint.
    pub fn with_custom_url(
        api_key: String,
        base_url: String,
        model: String,
    ) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        Ok(Self {
            inner: LiteLlmClient::new(base_url, Some(api_key.clone()), model)?,
            api_key,
            base_retry_delay: Duration::from_millis(BASE_RETRY_DELAY_MS),
        })
    }

    /// Override the first backoff delay; later delays double it.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.base_retry_delay = delay;
        self
    }

    /// Get the API key (for debugging, returns masked value).
    pub fn api_key_masked(&self) -> String {
        if self.api_key.len() <= 8 {
            "*".repeat(self.api_key.len())
        } else {
            format!(
                "{}...{}",
                &self.api_key[..4],
                &self.api_key[self.api_key.len() - 4..]
            )
        }
    }

    pub fn base_url(&self) -> &str {
        self.inner.api_base()
    }

    pub fn default_model(&self) -> &str {
        self.inner.default_model()
    }
}

/// Check if an error is transient and should be retried.
fn is_transient_error(error: &LlmError) -> bool {
    match error {
        LlmError::RequestFailed(msg) => {
            let msg = msg.to_lowercase();
            msg.contains("timeout")
                || msg.contains("timed out")
                || msg.contains("connection")
                || msg.contains("temporarily")
        }
        LlmError::RateLimited(_) => true,
        LlmError::ApiError { code, .. } => *code >= 500 || *code == 429,
        _ => false,
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = self.base_retry_delay * (1 << (attempt - 1));
                tracing::debug!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying OpenRouter request after transient failure"
                );
                tokio::time::sleep(delay).await;
            }

            match self.inner.generate(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) if is_transient_error(&err) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = MAX_RETRIES,
                        error = %err,
                        "Transient error, will retry"
                    );
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            LlmError::RequestFailed("Max retries exceeded with no error captured".to_string())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;

    #[test]
    fn test_provider_configuration() {
        let provider =
            OpenRouterProvider::with_model("test-api-key".to_string(), "judge".to_string())
                .expect("provider");
        assert_eq!(provider.base_url(), OPENROUTER_BASE_URL);
        assert_eq!(provider.default_model(), "judge");
        assert_eq!(provider.api_key_masked(), "test...-key");
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(
            OpenRouterProvider::with_model(" ".to_string(), "judge".to_string()),
            Err(LlmError::MissingApiKey)
        ));
    }

    #[test]
    fn test_api_key_masked_short() {
        let provider = OpenRouterProvider::with_model("abc".to_string(), "m".to_string())
            .expect("provider");
        assert_eq!(provider.api_key_masked(), "***");
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient_error(&LlmError::RateLimited("slow".into())));
        assert!(is_transient_error(&LlmError::ApiError {
            code: 503,
            message: "unavailable".into()
        }));
        assert!(!is_transient_error(&LlmError::ApiError {
            code: 401,
            message: "unauthorized".into()
        }));
        assert!(is_transient_error(&LlmError::RequestFailed(
            "error sending request: Connection refused".into()
        )));
        assert!(is_transient_error(&LlmError::RequestFailed(
            "operation timed out".into()
        )));
        assert!(!is_transient_error(&LlmError::ParseError("bad json".into())));
    }

    #[tokio::test]
    async fn test_generate_connection_error_after_retries() {
        let provider = OpenRouterProvider::with_custom_url(
            "test-key".to_string(),
            "http://localhost:65535".to_string(),
            "test-model".to_string(),
        )
        .expect("provider")
        .with_retry_delay(Duration::from_millis(1));

        let request = GenerationRequest::new("test-model", vec![Message::user("test")]);
        let result = provider.generate(request).await;
        assert!(matches!(result, Err(LlmError::RequestFailed(_))));
    }
}
