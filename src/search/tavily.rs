//! Tavily search client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{SearchError, SearchTool};
use crate::llm::provider::{http_client, http_client_with_timeout};
use crate::models::NarrativeItem;

const TAVILY_API_BASE: &str = "https://api.tavily.com";

pub struct TavilyClient {
    client: Client,
    api_key: String,
    api_base: String,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: String,
}

impl TavilyClient {
    pub fn new(api_key: String) -> Self {
        Self::with_api_base(api_key, TAVILY_API_BASE)
    }

    pub fn with_api_base(api_key: String, api_base: &str) -> Self {
        Self {
            client: http_client(),
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Replace the default request timeout shared with the LLM adapters.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client_with_timeout(timeout);
        self
    }
}

#[async_trait]
impl SearchTool for TavilyClient {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<NarrativeItem>, SearchError> {
        info!(query = %query, "Searching via Tavily");

        let body = TavilyRequest {
            api_key: &self.api_key,
            query,
            max_results,
            search_depth: "basic",
        };

        let response = self
            .client
            .post(format!("{}/search", self.api_base))
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SearchError::RequestFailed(format!("Tavily returned {}: {}", status, text)));
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;
        debug!("Raw Tavily response received");

        let items: Vec<NarrativeItem> = parsed
            .results
            .into_iter()
            .take(max_results)
            .map(|r| NarrativeItem {
                title: if r.title.is_empty() { "Sem título".to_string() } else { r.title },
                url: r.url,
                content: r.content,
            })
            .collect();

        info!(count = items.len(), "Tavily search completed");
        Ok(items)
    }
}
