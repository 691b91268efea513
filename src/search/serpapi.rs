//! SerpAPI Client
//!
//! Google web search through SerpAPI, localized to Brazilian Portuguese.
//! Organic results become [`NarrativeItem`]s with the snippet as content.

use async_trait::async_trait;
use serpapi_search_rust::serp_api_search::SerpApiSearch;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use super::{SearchError, SearchTool};
use crate::models::NarrativeItem;

/// SerpAPI client for news and protocol lookups
pub struct SerpApiClient {
    api_key: String,
}

impl SerpApiClient {
    /// Create a new SerpAPI client
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }

    fn params(query: &str, max_results: usize) -> HashMap<String, String> {
        let mut params = HashMap::<String, String>::new();
        params.insert("engine".to_string(), "google".to_string());
        params.insert("q".to_string(), query.to_string());
        params.insert("hl".to_string(), "pt-br".to_string());
        params.insert("gl".to_string(), "br".to_string());
        params.insert("num".to_string(), max_results.to_string());
        params
    }
}

#[async_trait]
impl SearchTool for SerpApiClient {
    fn name(&self) -> &str {
        "serpapi"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<NarrativeItem>, SearchError> {
        info!(query = %query, "Searching Google via SerpAPI");

        let search = SerpApiSearch::google(Self::params(query, max_results), self.api_key.clone());

        let results = search
            .json()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        debug!("Raw SerpAPI response received");

        let items = parse_organic_results(&results, max_results)?;
        info!(count = items.len(), "SerpAPI search completed");
        Ok(items)
    }
}

/// Map `organic_results` to items. An absent list means no hits.
fn parse_organic_results(results: &Value, max_results: usize) -> Result<Vec<NarrativeItem>, SearchError> {
    if let Some(message) = results.get("error").and_then(|v| v.as_str()) {
        // SerpAPI reports "no results" through the error field as well.
        if message.contains("hasn't returned any results") {
            return Ok(Vec::new());
        }
        return Err(SearchError::RequestFailed(message.to_string()));
    }

    let Some(organic_results) = results.get("organic_results") else {
        return Ok(Vec::new());
    };

    let results_array = organic_results
        .as_array()
        .ok_or_else(|| SearchError::ParseError("Expected array of results".to_string()))?;

    let items = results_array
        .iter()
        .take(max_results)
        .map(|result| {
            let title = result
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or("Sem título")
                .to_string();

            let content = result
                .get("snippet")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();

            let url = result
                .get("link")
                .and_then(|v| v.as_str())
                .map(String::from);

            NarrativeItem { title, url, content }
        })
        .collect();

    Ok(items)
}
