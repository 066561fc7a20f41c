// OpenAI-compatible chat completions adapter.
// Also serves any gateway speaking the same wire format (Groq, LiteLLM,
// self-hosted proxies) via `with_api_base`.

use crate::llm::provider::LLMAdapter;
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAIAdapter {
    client: Client,
    api_key: String,
    api_base: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

impl OpenAIAdapter {
    pub fn new(api_key: &str) -> Self {
        Self::with_api_base(api_key, OPENAI_API_BASE)
    }

    pub fn with_api_base(api_key: &str, api_base: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LLMAdapter for OpenAIAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let url = format!("{}/chat/completions", self.api_base);

        let mut messages: Vec<ChatMessage> = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_instruction {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| ChatMessage {
            role: m.role.clone(),
            content: m.content.clone(),
        }));

        let body = ChatRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LLMApi(format!("Chat completion request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                return Err(AppError::LLMApi(format!(
                    "API error ({}): {} (type: {:?})",
                    status, error_response.error.message, error_response.error.error_type
                )));
            }

            return Err(AppError::LLMApi(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::LLMApi(format!("Failed to parse chat response: {}", e)))?;

        let choice = chat_response
            .choices
            .first()
            .ok_or_else(|| AppError::LLMApi("Provider returned no choices".to_string()))?;

        let usage = chat_response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(LLMResponse {
            content: choice.message.content.clone().unwrap_or_default(),
            finish_reason: choice
                .finish_reason
                .clone()
                .unwrap_or_else(|| "stop".to_string()),
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LLMMessage;

    fn request(model: &str) -> LLMRequest {
        LLMRequest {
            provider: "openai".to_string(),
            model: model.to_string(),
            messages: vec![LLMMessage::user("list all tables")],
            max_tokens: Some(256),
            temperature: Some(0.7),
            system_instruction: None,
        }
    }

    #[test]
    fn test_api_base_normalization() {
        let adapter = OpenAIAdapter::with_api_base("key", "https://gateway.local/v1/");
        assert_eq!(adapter.api_base, "https://gateway.local/v1");

        let default_adapter = OpenAIAdapter::new("key");
        assert_eq!(default_adapter.api_base, OPENAI_API_BASE);
    }

    #[tokio::test]
    async fn test_chat_completion_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "choices": [
                        {"message": {"content": "SELECT 1"}, "finish_reason": "stop"}
                    ],
                    "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13}
                }"#,
            )
            .create_async()
            .await;

        let adapter = OpenAIAdapter::with_api_base("test-key", &server.url());
        let response = adapter
            .create_chat_completion(&request("gpt-4o-mini"))
            .await
            .unwrap();

        assert_eq!(response.content, "SELECT 1");
        assert_eq!(response.finish_reason, "stop");
        assert_eq!(response.usage.total_tokens, 13);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_completion_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error": {"message": "invalid api key", "type": "auth_error"}}"#)
            .create_async()
            .await;

        let adapter = OpenAIAdapter::with_api_base("bad-key", &server.url());
        let err = adapter
            .create_chat_completion(&request("gpt-4o-mini"))
            .await
            .unwrap_err();

        match err {
            AppError::LLMApi(message) => assert!(message.contains("invalid api key")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_chat_completion_no_choices() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let adapter = OpenAIAdapter::with_api_base("test-key", &server.url());
        let err = adapter
            .create_chat_completion(&request("gpt-4o-mini"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::LLMApi(_)));
    }
}
