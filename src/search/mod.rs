//! Search Module
//!
//! Web search used for narrative sources (recent news) and clinical-protocol
//! lookups. Two interchangeable backends sit behind [`SearchTool`]:
//! - Tavily (default) - search API returning extracted page content
//! - SerpAPI - Google results with snippets

pub mod serpapi;
pub mod tavily;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::SearchConfig;
use crate::models::NarrativeItem;
use crate::types::{AppError, AppResult};

pub use serpapi::SerpApiClient;
pub use tavily::TavilyClient;

/// Errors that can occur during search operations
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{0} API key not configured")]
    NoApiKey(&'static str),

    #[error("Search request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse search results: {0}")]
    ParseError(String),
}

#[async_trait]
pub trait SearchTool: Send + Sync {
    fn name(&self) -> &str;

    /// Run `query`, returning at most `max_results` items. No hits is an empty list.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<NarrativeItem>, SearchError>;
}

/// Build the configured backend. A missing key is an error here, not at query time.
pub fn from_config(config: &SearchConfig) -> AppResult<Arc<dyn SearchTool>> {
    match config.provider.as_str() {
        "tavily" => {
            let key = config
                .tavily_api_key
                .clone()
                .ok_or(SearchError::NoApiKey("Tavily"))?;
            Ok(Arc::new(TavilyClient::new(key)))
        }
        "serpapi" => {
            let key = config
                .serpapi_key
                .clone()
                .ok_or(SearchError::NoApiKey("SerpAPI"))?;
            Ok(Arc::new(SerpApiClient::new(key)))
        }
        other => Err(AppError::Config(format!("Unsupported search provider: {}", other))),
    }
}

/// Flatten search results into one text block for prompting.
pub fn format_results(items: &[NarrativeItem]) -> String {
    items
        .iter()
        .map(|item| match &item.url {
            Some(url) => format!("Fonte: {}\nTítulo: {}\n{}", url, item.title, item.content),
            None => format!("Título: {}\n{}", item.title, item.content),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
