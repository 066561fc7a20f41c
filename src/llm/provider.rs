use crate::types::{AppError, AppResult, LLMRequest, LLMResponse};
use async_trait::async_trait;

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Configuration for an LLM provider connection
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
    /// Optional endpoint override for OpenAI-compatible gateways.
    pub base_url: Option<String>,
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
}

impl std::fmt::Debug for LLM {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LLM").finish_non_exhaustive()
    }
}

impl LLM {
    pub fn new(provider: LLMProviderConfig) -> AppResult<Self> {
        let adapter: Box<dyn LLMAdapter> = match provider.name.as_str() {
            "openai" => match provider.base_url.as_deref() {
                Some(base) => Box::new(crate::llm::openai::OpenAIAdapter::with_api_base(
                    &provider.api_key,
                    base,
                )),
                None => Box::new(crate::llm::openai::OpenAIAdapter::new(&provider.api_key)),
            },
            "groq" => match provider.base_url.as_deref() {
                Some(base) => Box::new(crate::llm::groq::GroqAdapter::with_api_base(
                    &provider.api_key,
                    base,
                )),
                None => Box::new(crate::llm::groq::GroqAdapter::new(&provider.api_key)),
            },
            other => {
                return Err(AppError::Config(format!(
                    "Unsupported LLM provider: {}",
                    other
                )))
            }
        };

        Ok(Self { adapter })
    }

    /// Wrap an existing adapter (used for injection in tests).
    pub fn from_adapter(adapter: Box<dyn LLMAdapter>) -> Self {
        Self { adapter }
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }
}
