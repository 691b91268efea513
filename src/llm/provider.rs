use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AppError, AppResult, LLMMessage, LLMRequest, LLMResponse};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Why a single provider attempt failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LLMError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("service unavailable: {0}")]
    Transient(String),

    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    Transient,
    Rejected,
    MalformedResponse,
}

impl LLMError {
    pub fn kind(&self) -> FailureKind {
        match self {
            LLMError::RateLimited(_) => FailureKind::RateLimited,
            LLMError::Transient(_) => FailureKind::Transient,
            LLMError::Rejected { .. } => FailureKind::Rejected,
            LLMError::MalformedResponse(_) => FailureKind::MalformedResponse,
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS {
            LLMError::RateLimited(body)
        } else if status.is_server_error() {
            LLMError::Transient(format!("{}: {}", status, body))
        } else {
            LLMError::Rejected {
                status: status.as_u16(),
                message: body,
            }
        }
    }

    /// Classify a transport-level failure.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LLMError::MalformedResponse(err.to_string())
        } else {
            LLMError::Transient(err.to_string())
        }
    }
}

pub type LLMResult<T> = Result<T, LLMError>;

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> LLMResult<LLMResponse>;
}

pub(crate) fn http_client() -> Client {
    http_client_with_timeout(DEFAULT_REQUEST_TIMEOUT)
}

pub(crate) fn http_client_with_timeout(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Send a JSON request and decode a JSON body, classifying every failure.
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> LLMResult<T> {
    let response = request.send().await.map_err(LLMError::from_transport)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LLMError::from_status(status, body));
    }

    let body = response.text().await.map_err(LLMError::from_transport)?;
    serde_json::from_str(&body).map_err(|e| LLMError::MalformedResponse(e.to_string()))
}

/// Configuration for one text-generation provider.
#[derive(Debug, Clone, PartialEq)]
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
    pub model: String,
    /// Overrides the provider's default endpoint.
    pub api_base: Option<String>,
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider_name: String,
    model: String,
}

impl LLM {
    pub fn new(provider: LLMProviderConfig) -> AppResult<Self> {
        let api_base = provider.api_base.as_deref();
        let adapter: Box<dyn LLMAdapter> = match provider.name.as_str() {
            "google" | "gemini" => Box::new(match api_base {
                Some(base) => crate::llm::google::GoogleAdapter::with_api_base(&provider.api_key, base),
                None => crate::llm::google::GoogleAdapter::new(&provider.api_key),
            }),
            "groq" => Box::new(match api_base {
                Some(base) => crate::llm::groq::GroqAdapter::with_api_base(&provider.api_key, base),
                None => crate::llm::groq::GroqAdapter::new(&provider.api_key),
            }),
            "openai" => Box::new(match api_base {
                Some(base) => crate::llm::openai::OpenAIAdapter::new_with_api_base(&provider.api_key, base),
                None => crate::llm::openai::OpenAIAdapter::new(&provider.api_key),
            }),
            "ollama" => Box::new(crate::llm::ollama::OllamaAdapter::new(
                api_base.unwrap_or(crate::llm::ollama::OLLAMA_DEFAULT_BASE),
            )),
            other => {
                return Err(AppError::Config(format!("Unsupported LLM provider: {}", other)));
            }
        };

        Ok(Self {
            adapter,
            provider_name: provider.name,
            model: provider.model,
        })
    }

    /// Wrap an already-built adapter.
    pub fn from_adapter(
        provider_name: impl Into<String>,
        model: impl Into<String>,
        adapter: Box<dyn LLMAdapter>,
    ) -> Self {
        Self {
            adapter,
            provider_name: provider_name.into(),
            model: model.into(),
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> LLMResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }

    /// Run `messages` against this provider's configured model.
    pub async fn complete(
        &self,
        messages: Vec<LLMMessage>,
        temperature: Option<f32>,
    ) -> LLMResult<LLMResponse> {
        let request = LLMRequest {
            provider: self.provider_name.clone(),
            model: self.model.clone(),
            messages,
            max_tokens: None,
            temperature,
        };
        self.create_chat_completion(&request).await
    }
}
