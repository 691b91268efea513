use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use tracing::warn;

use crate::llm::LLMProviderConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub data: DataConfig,
    pub llm: LLMConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    pub dataset_path: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    /// Provider names in priority order.
    pub providers: Vec<String>,
    pub temperature: f32,
    pub google_api_key: Option<String>,
    pub google_model: String,
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub ollama_base_url: Option<String>,
    pub ollama_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub provider: String,
    pub tavily_api_key: Option<String>,
    pub serpapi_key: Option<String>,
    pub max_results: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            server: ServerConfig {
                port: get_or("PORT", "8080")
                    .parse()
                    .context("PORT must be a valid port number")?,
                host: get_or("HOST", "0.0.0.0"),
                cors_allowed_origins: get_or("ALLOWED_ORIGINS", "http://localhost:8501")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            data: DataConfig {
                dataset_path: PathBuf::from(get_or("DATASET_PATH", "data/processed/OpenSUS_limpo.csv")),
                output_dir: PathBuf::from(get_or("OUTPUT_DIR", "output")),
            },
            llm: LLMConfig {
                providers: get_or("LLM_PROVIDERS", "google,groq")
                    .split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect(),
                temperature: get_or("LLM_TEMPERATURE", "0.7")
                    .parse()
                    .context("LLM_TEMPERATURE must be a number")?,
                google_api_key: get("GOOGLE_API_KEY"),
                google_model: get_or("GOOGLE_MODEL", "gemini-1.5-flash"),
                groq_api_key: get("GROQ_API_KEY"),
                groq_model: get_or("GROQ_MODEL", "llama-3.1-8b-instant"),
                openai_api_key: get("OPENAI_API_KEY"),
                openai_model: get_or("OPENAI_MODEL", "gpt-4o-mini"),
                ollama_base_url: get("OLLAMA_BASE_URL"),
                ollama_model: get_or("OLLAMA_MODEL", "llama3.1"),
            },
            search: SearchConfig {
                provider: get_or("SEARCH_PROVIDER", "tavily").to_lowercase(),
                tavily_api_key: get("TAVILY_API_KEY"),
                serpapi_key: get("SERPAPI_KEY"),
                max_results: get_or("SEARCH_MAX_RESULTS", "3")
                    .parse()
                    .context("SEARCH_MAX_RESULTS must be a positive integer")?,
            },
        })
    }
}

impl LLMConfig {
    /// Provider configs in priority order. Providers without credentials are skipped.
    pub fn provider_configs(&self) -> Result<Vec<LLMProviderConfig>> {
        let mut configs = Vec::with_capacity(self.providers.len());

        for name in &self.providers {
            let (api_key, model, api_base) = match name.as_str() {
                "google" | "gemini" => (self.google_api_key.clone(), &self.google_model, None),
                "groq" => (self.groq_api_key.clone(), &self.groq_model, None),
                "openai" => (self.openai_api_key.clone(), &self.openai_model, None),
                // Local server, no key needed.
                "ollama" => (Some(String::new()), &self.ollama_model, self.ollama_base_url.clone()),
                other => bail!("Unsupported LLM provider in LLM_PROVIDERS: {}", other),
            };

            let Some(api_key) = api_key else {
                warn!(provider = %name, "No API key configured, skipping provider");
                continue;
            };

            configs.push(LLMProviderConfig {
                name: name.clone(),
                api_key,
                model: model.clone(),
                api_base,
            });
        }

        if configs.is_empty() {
            warn!("No LLM providers available; narrative text will be unavailable");
        }
        Ok(configs)
    }
}
