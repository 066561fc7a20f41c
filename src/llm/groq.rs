use crate::llm::provider::LLMAdapter;
use crate::types::{AppResult, LLMRequest, LLMResponse};
use async_trait::async_trait;

const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

pub struct GroqAdapter {
    inner: crate::llm::openai::OpenAIAdapter,
}

impl GroqAdapter {
    pub fn new(api_key: &str) -> Self {
        Self::with_api_base(api_key, GROQ_API_BASE)
    }

    /// Point the adapter at an OpenAI-compatible gateway instead of the Groq
    /// endpoint.
    pub fn with_api_base(api_key: &str, api_base: &str) -> Self {
        Self {
            inner: crate::llm::openai::OpenAIAdapter::with_api_base(api_key, api_base),
        }
    }
}

#[async_trait]
impl LLMAdapter for GroqAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.inner.create_chat_completion(request).await
    }
}
