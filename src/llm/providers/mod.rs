//! Hosted LLM providers.

pub mod openrouter;

pub use openrouter::{OpenRouterProvider, OPENROUTER_BASE_URL};

pub use super::litellm::LlmProvider;
