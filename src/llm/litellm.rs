//! OpenAI-compatible chat client (LiteLLM proxies, OpenRouter).
//!
//! The judge and the API-backed generator talk to models through the
//! [`LlmProvider`] trait defined here.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::LlmError;

/// Default timeout for a single chat completion request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Default model when neither the request nor the environment names one.
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

/// A message in a conversation with an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (e.g., "system", "user", "assistant").
    pub role: String,
    /// Content of the message.
    pub content: String,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Request for text generation from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model identifier; empty means the provider's default.
    pub model: String,
    /// Conversation messages, in order.
    pub messages: Vec<Message>,
    /// Sampling temperature (0.0 - 2.0). Higher values = more random.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Nucleus sampling parameter (0.0 - 1.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

impl GenerationRequest {
    /// Create a new generation request with provider-default sampling parameters.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            top_p: None,
        }
    }

    /// Set the temperature for this request.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the max tokens for this request.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the top_p for this request.
    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }
}

/// Response from an LLM generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Unique identifier for this response.
    pub id: String,
    /// Model that generated this response.
    pub model: String,
    /// Generated choices/completions.
    pub choices: Vec<Choice>,
    /// Token usage statistics.
    pub usage: Usage,
}

impl GenerationResponse {
    /// Get the content of the first choice, if available.
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// A single generated choice from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Index of this choice in the response.
    pub index: u32,
    /// Generated message; absent content is read as an empty string.
    pub message: Message,
    /// Reason the generation stopped (e.g., "stop", "length").
    pub finish_reason: String,
}

/// Token usage statistics for a generation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the prompt.
    pub prompt_tokens: u32,
    /// Number of tokens generated.
    pub completion_tokens: u32,
    /// Total tokens used.
    pub total_tokens: u32,
}

/// Trait for LLM providers that can generate text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a response for the given request.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError>;
}

/// Build the shared `reqwest` client with a per-request timeout.
pub(crate) fn build_http_client(timeout: Duration) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::RequestFailed(format!("Failed to build HTTP client: {}", e)))
}

/// Client for LiteLLM-compatible APIs.
pub struct LiteLlmClient {
    /// Base URL for the API, without a trailing slash.
    api_base: String,
    /// Optional API key, sent as a bearer token.
    api_key: Option<String>,
    /// Model used when a request leaves `model` empty.
    default_model: String,
    /// HTTP client for making API requests.
    http_client: Client,
}

impl LiteLlmClient {
    /// Create a client with explicit configuration.
    ///
    /// # Arguments
    ///
    /// * `api_base` - Base URL for the LiteLLM API (e.g., "http://localhost:4000")
    /// * `api_key` - Optional API key for authentication
    /// * `default_model` - Default model to use when none is specified
    pub fn new(
        api_base: String,
        api_key: Option<String>,
        default_model: String,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            default_model,
            http_client: build_http_client(DEFAULT_REQUEST_TIMEOUT)?,
        })
    }

    /// Create a client pre-configured for OpenRouter.
    ///
    /// # Arguments
    ///
    /// * `api_key` - API key for OpenRouter authentication
    ///
    /// # Returns
    ///
    /// A client configured with:
    /// - api_base: "https://openrouter.ai/api/v1"
    /// - default_model: [`DEFAULT_MODEL`]
    pub fn new_with_defaults(api_key: String) -> Result<Self, LlmError> {
        Self::new(
            "https://openrouter.ai/api/v1".to_string(),
            Some(api_key),
            DEFAULT_MODEL.to_string(),
        )
    }

    /// Create a client from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `LITELLM_API_BASE`: Base URL for the API (required)
    /// - `LITELLM_API_KEY`: API key for authentication (optional)
    /// - `LITELLM_DEFAULT_MODEL`: Default model (defaults to [`DEFAULT_MODEL`])
    ///
    /// # Errors
    ///
    /// Returns `LlmError::MissingApiBase` if `LITELLM_API_BASE` is not set.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_base = env::var("LITELLM_API_BASE").map_err(|_| LlmError::MissingApiBase)?;
        let api_key = env::var("LITELLM_API_KEY").ok();
        let default_model =
            env::var("LITELLM_DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Self::new(api_base, api_key, default_model)
    }

    /// Replace the HTTP client with one using a different request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.http_client = build_http_client(timeout)?;
        Ok(self)
    }

    /// Get the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Get the default model.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Check if an API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Internal request structure for the OpenAI-compatible API.
#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
}

/// Internal response structure from the OpenAI-compatible API.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Usage,
}

/// Internal choice structure from the API response.
#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    index: u32,
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Internal message structure; `content` may be null.
#[derive(Debug, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

/// Error response from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

/// Error detail from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Map a non-success HTTP status and body to an [`LlmError`].
pub(crate) fn error_from_status(status_code: u16, body: String) -> LlmError {
    let message = serde_json::from_str::<ApiErrorResponse>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);

    if status_code == 429 {
        return LlmError::RateLimited(message);
    }
    LlmError::ApiError {
        code: status_code,
        message,
    }
}

#[async_trait]
impl LlmProvider for LiteLlmClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };

        let api_request = ApiRequest {
            model,
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
        };

        let url = format!("{}/chat/completions", self.api_base);

        let mut http_request = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", "https://github.com/CortexLM/commit-eval")
            .header("X-Title", "commit-eval");

        if let Some(ref api_key) = self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {}", api_key));
        }

        let http_response = http_request
            .json(&api_request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();
        if !status.is_success() {
            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(error_from_status(status.as_u16(), error_text));
        }

        let api_response: ApiResponse = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))?;

        let choices = api_response
            .choices
            .into_iter()
            .map(|choice| Choice {
                index: choice.index,
                message: Message {
                    role: choice.message.role,
                    content: choice.message.content.unwrap_or_default(),
                },
                finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            })
            .collect();

        Ok(GenerationResponse {
            id: api_response.id,
            model: api_response.model,
            choices,
            usage: api_response.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::system("s").role, "system");
        assert_eq!(Message::user("u").role, "user");
        let assistant = Message::assistant("Hi there!");
        assert_eq!(assistant.role, "assistant");
        assert_eq!(assistant.content, "Hi there!");
    }

    #[test]
    fn test_generation_request_builder() {
        let request = GenerationRequest::new("judge", vec![Message::user("score this")])
            .with_temperature(0.0)
            .with_max_tokens(800)
            .with_top_p(0.9);

        assert_eq!(request.model, "judge");
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.max_tokens, Some(800));
        assert_eq!(request.top_p, Some(0.9));
    }

    #[test]
    fn test_generation_response_first_content() {
        let response = GenerationResponse {
            id: "id".to_string(),
            model: "m".to_string(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant("feat: add x"),
                finish_reason: "stop".to_string(),
            }],
            usage: Usage::default(),
        };
        assert_eq!(response.first_content(), Some("feat: add x"));

        let empty = GenerationResponse {
            choices: vec![],
            ..response
        };
        assert_eq!(empty.first_content(), None);
    }

    #[test]
    fn test_client_configuration() {
        let client = LiteLlmClient::new(
            "http://localhost:4000/".to_string(),
            Some("test-key".to_string()),
            "judge-model".to_string(),
        )
        .expect("client");
        assert_eq!(client.api_base(), "http://localhost:4000");
        assert_eq!(client.default_model(), "judge-model");
        assert!(client.has_api_key());

        let openrouter = LiteLlmClient::new_with_defaults("key".to_string()).expect("client");
        assert_eq!(openrouter.api_base(), "https://openrouter.ai/api/v1");
        assert_eq!(openrouter.default_model(), DEFAULT_MODEL);
    }

    #[test]
    fn test_error_from_status() {
        let err = error_from_status(429, r#"{"error":{"message":"slow down"}}"#.to_string());
        assert!(matches!(err, LlmError::RateLimited(msg) if msg == "slow down"));

        let err = error_from_status(500, "gateway exploded".to_string());
        assert!(matches!(
            err,
            LlmError::ApiError { code: 500, message } if message == "gateway exploded"
        ));
    }

    #[tokio::test]
    async fn test_generate_connection_error() {
        let client = LiteLlmClient::new(
            "http://localhost:65535".to_string(),
            None,
            "judge".to_string(),
        )
        .expect("client");

        let result = client
            .generate(GenerationRequest::new("judge", vec![Message::user("test")]))
            .await;
        assert!(matches!(result, Err(LlmError::RequestFailed(_))));
    }

    #[test]
    fn test_api_request_serialization() {
        let request = ApiRequest {
            model: "judge".to_string(),
            messages: vec![Message::user("test")],
            temperature: Some(0.2),
            max_tokens: Some(1000),
            top_p: None,
        };

        let json = serde_json::to_string(&request).expect("serialization should succeed");
        assert!(json.contains("\"model\":\"judge\""));
        assert!(json.contains("\"temperature\":0.2"));
        assert!(!json.contains("top_p"));
    }

    #[test]
    fn test_api_response_tolerates_sparse_payload() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let response: ApiResponse = serde_json::from_str(body).expect("sparse payload parses");

        assert!(response.id.is_empty());
        assert_eq!(response.usage.total_tokens, 0);
        assert_eq!(response.choices[0].index, 0);
        assert!(response.choices[0].message.content.is_none());
        assert!(response.choices[0].finish_reason.is_none());
    }
}
