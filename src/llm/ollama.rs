// Ollama adapter for locally hosted models

use crate::llm::provider::{http_client, send_json, LLMAdapter, LLMResult};
use crate::types::{LLMMessage, LLMRequest, LLMResponse, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const OLLAMA_DEFAULT_BASE: &str = "http://localhost:11434";

pub struct OllamaAdapter {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [LLMMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: LLMMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

impl OllamaAdapter {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LLMAdapter for OllamaAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> LLMResult<LLMResponse> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            options: request.temperature.map(|temperature| ChatOptions { temperature }),
        };

        let response: ChatResponse = send_json(self.client.post(&url).json(&body)).await?;

        Ok(LLMResponse {
            content: response.message.content,
            finish_reason: response.done_reason.unwrap_or_else(|| "stop".to_string()),
            usage: TokenUsage {
                prompt_tokens: response.prompt_eval_count,
                completion_tokens: response.eval_count,
                total_tokens: response.prompt_eval_count + response.eval_count,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FailureKind;

    #[tokio::test]
    async fn test_chat_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/chat")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"model":"llama3.1","stream":false}"#.to_string(),
            ))
            .with_status(200)
            .with_body(
                r#"{"message":{"role":"assistant","content":"oi"},"done":true,"done_reason":"stop","prompt_eval_count":5,"eval_count":1}"#,
            )
            .create_async()
            .await;

        let adapter = OllamaAdapter::new(&server.url());
        let request = LLMRequest {
            provider: "ollama".into(),
            model: "llama3.1".into(),
            messages: vec![LLMMessage::user("olá")],
            max_tokens: None,
            temperature: None,
        };
        let response = adapter.create_chat_completion(&request).await.unwrap();

        assert_eq!(response.content, "oi");
        assert_eq!(response.usage.total_tokens, 6);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/chat")
            .with_status(503)
            .create_async()
            .await;

        let adapter = OllamaAdapter::new(&server.url());
        let request = LLMRequest {
            provider: "ollama".into(),
            model: "llama3.1".into(),
            messages: vec![LLMMessage::user("olá")],
            max_tokens: None,
            temperature: None,
        };
        let err = adapter.create_chat_completion(&request).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Transient);
    }
}
