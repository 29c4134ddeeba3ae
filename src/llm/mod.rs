//! LLM integration used by the judge and the API-backed generator.
//!
//! ```ignore
//! use commit_eval::llm::{GenerationRequest, LlmProvider, Message, OpenRouterProvider};
//!
//! let provider = OpenRouterProvider::with_model(api_key, "anthropic/claude-sonnet-4".into())?;
//! let request = GenerationRequest::new("", vec![Message::user("Hello")]).with_temperature(0.0);
//! let response = provider.generate(request).await?;
//! ```

pub mod litellm;
pub mod providers;

pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message, Usage,
    DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT,
};
pub use providers::OpenRouterProvider;
