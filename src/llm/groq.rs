use crate::llm::openai::OpenAIAdapter;
use crate::llm::provider::{LLMAdapter, LLMResult};
use crate::types::{LLMRequest, LLMResponse};
use async_trait::async_trait;

const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

pub struct GroqAdapter {
    inner: OpenAIAdapter,
}

impl GroqAdapter {
    pub fn new(api_key: &str) -> Self {
        Self::with_api_base(api_key, GROQ_API_BASE)
    }

    pub fn with_api_base(api_key: &str, api_base: &str) -> Self {
        Self {
            inner: OpenAIAdapter::new_with_api_base(api_key, api_base),
        }
    }
}

#[async_trait]
impl LLMAdapter for GroqAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> LLMResult<LLMResponse> {
        self.inner.create_chat_completion(request).await
    }
}
