//! News Agent
//!
//! Gathers recent SRAG news for the requested location. The results are the
//! narrative sources for both disease extraction and the final report.

use std::sync::Arc;

use tracing::info;

use crate::models::NarrativeItem;
use crate::search::SearchTool;
use crate::types::AppResult;

pub const DEFAULT_NEWS_LOCATION: &str = "São Paulo";
pub const NATIONAL_NEWS_LOCATION: &str = "Brasil";

/// Location phrase used in the news query.
pub fn news_location(location: &str) -> String {
    let location = location.trim();
    if location.is_empty() {
        DEFAULT_NEWS_LOCATION.to_string()
    } else if location.eq_ignore_ascii_case("BR") {
        NATIONAL_NEWS_LOCATION.to_string()
    } else {
        location.to_string()
    }
}

pub fn news_query(location: &str) -> String {
    format!(
        "notícias recentes sobre Síndrome Respiratória Aguda Grave (SRAG) em {}",
        news_location(location)
    )
}

/// News block for prompts, one title/summary pair per item.
pub fn format_news_context(items: &[NarrativeItem]) -> String {
    items
        .iter()
        .map(|item| format!("- Título: {}\n  Resumo: {}", item.title, item.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct NewsAgent {
    search: Arc<dyn SearchTool>,
    max_results: usize,
}

impl NewsAgent {
    pub fn new(search: Arc<dyn SearchTool>, max_results: usize) -> Self {
        Self {
            search,
            max_results,
        }
    }

    /// Search failures propagate to the caller.
    pub async fn fetch(&self, location: &str) -> AppResult<Vec<NarrativeItem>> {
        let query = news_query(location);
        info!(backend = %self.search.name(), query = %query, "Fetching SRAG news");

        let items = self.search.search(&query, self.max_results).await?;

        info!(count = items.len(), "News fetched");
        Ok(items)
    }
}
