//! Ordered-provider fallback.
//!
//! Providers are tried once each, in priority order. Any failure advances to
//! the next provider; the first success wins. When every provider fails the
//! caller receives [`FallbackOutcome::AllProvidersExhausted`] with one
//! [`ProviderFailure`] per attempt.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::LLMConfig;
use crate::llm::provider::{FailureKind, LLMError, LLM};
use crate::prompts::{PromptTemplate, PromptVars};
use crate::types::{AppError, AppResult, LLMMessage};

pub const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub kind: FailureKind,
    pub reason: String,
}

impl ProviderFailure {
    fn new(provider: &str, err: &LLMError) -> Self {
        Self {
            provider: provider.to_string(),
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FallbackOutcome {
    Success { provider: String, text: String },
    AllProvidersExhausted(Vec<ProviderFailure>),
}

impl FallbackOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            FallbackOutcome::Success { text, .. } => Some(text),
            FallbackOutcome::AllProvidersExhausted(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FallbackOutcome::Success { .. })
    }
}

pub struct FallbackChain {
    providers: Vec<LLM>,
    temperature: f32,
}

impl FallbackChain {
    pub fn new(providers: Vec<LLM>, temperature: f32) -> Self {
        Self {
            providers,
            temperature,
        }
    }

    /// Build the chain from configuration, in `LLM_PROVIDERS` order.
    pub fn from_config(config: &LLMConfig) -> AppResult<Self> {
        let providers = config
            .provider_configs()
            .map_err(|e| AppError::Config(e.to_string()))?
            .into_iter()
            .map(LLM::new)
            .collect::<AppResult<Vec<_>>>()?;
        info!(
            providers = ?providers.iter().map(LLM::provider_name).collect::<Vec<_>>(),
            "LLM fallback chain ready"
        );
        Ok(Self::new(providers, config.temperature))
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(LLM::provider_name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Render `template` with `vars` and run it through the chain.
    ///
    /// Only a template error is returned as `Err`; provider failures are part
    /// of the outcome.
    pub async fn invoke(
        &self,
        template: &PromptTemplate,
        vars: &PromptVars,
    ) -> AppResult<FallbackOutcome> {
        let messages = template.render(vars)?;
        Ok(self.complete(template.name, messages).await)
    }

    pub async fn complete(&self, step: &str, messages: Vec<LLMMessage>) -> FallbackOutcome {
        let mut failures = Vec::with_capacity(self.providers.len());

        for llm in &self.providers {
            info!(step = %step, provider = %llm.provider_name(), model = %llm.model(), "Invoking LLM");
            match llm.complete(messages.clone(), Some(self.temperature)).await {
                Ok(response) => {
                    info!(step = %step, provider = %llm.provider_name(), "LLM call succeeded");
                    return FallbackOutcome::Success {
                        provider: llm.provider_name().to_string(),
                        text: response.content,
                    };
                }
                Err(err) => {
                    warn!(
                        step = %step,
                        provider = %llm.provider_name(),
                        kind = ?err.kind(),
                        error = %err,
                        "LLM provider failed, falling back"
                    );
                    failures.push(ProviderFailure::new(llm.provider_name(), &err));
                }
            }
        }

        error!(step = %step, attempts = failures.len(), "All LLM providers exhausted");
        FallbackOutcome::AllProvidersExhausted(failures)
    }
}
