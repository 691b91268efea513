//! Clinical Protocol Agent
//!
//! Extracts the respiratory diseases mentioned in the narrative sources, then
//! runs one protocol lookup and one summary per disease, sequentially and in
//! extraction order.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::agents::news::format_news_context;
use crate::llm::{FallbackChain, FallbackOutcome, ProviderFailure};
use crate::models::{DiseaseSummary, NarrativeItem};
use crate::prompts::{PromptVars, CLINICAL_DISCLAIMER, CLINICAL_SUMMARY, DISEASE_EXTRACTION};
use crate::search::{format_results, SearchTool};
use crate::types::AppResult;
use crate::utils::fold_diacritics;

pub const TRUSTED_SOURCES: [&str; 3] = ["gov.br/saude", "msdmanuals.com/pt-br", "scielo.br"];

/// Lookup query restricted to trusted medical sources.
pub fn protocol_query(disease: &str) -> String {
    let sites = TRUSTED_SOURCES
        .iter()
        .map(|s| format!("site:{}", s))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("protocolo de tratamento ou manejo clínico para '{}' {}", disease, sites)
}

/// Split a comma-separated model answer into disease names.
///
/// Names are trimmed; duplicates differing only in case or accents keep the
/// first spelling.
pub fn parse_disease_list(response: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    response
        .split([',', '\n'])
        .map(|name| name.trim().trim_end_matches('.').trim())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(fold_diacritics(name)))
        .map(str::to_string)
        .collect()
}

/// Ensure the summary ends with the disclaimer sentence.
pub fn with_disclaimer(summary: &str) -> String {
    let trimmed = summary.trim_end();
    if trimmed.trim_end_matches(['\'', '"']).ends_with(CLINICAL_DISCLAIMER) {
        return trimmed.to_string();
    }
    if trimmed.is_empty() {
        return CLINICAL_DISCLAIMER.to_string();
    }
    format!("{}\n\n{}", trimmed, CLINICAL_DISCLAIMER)
}

/// Protocol summaries plus the generation steps that produced no text.
#[derive(Debug, Default)]
pub struct ProtocolResolution {
    pub summaries: Vec<DiseaseSummary>,
    pub failures: Vec<(String, Vec<ProviderFailure>)>,
}

pub struct ClinicalProtocolAgent {
    search: Arc<dyn SearchTool>,
    llm: Arc<FallbackChain>,
    max_results: usize,
}

impl ClinicalProtocolAgent {
    pub fn new(search: Arc<dyn SearchTool>, llm: Arc<FallbackChain>, max_results: usize) -> Self {
        Self {
            search,
            llm,
            max_results,
        }
    }

    /// Diseases named in `narrative`, or the failures if no provider answered.
    pub async fn extract_diseases(
        &self,
        narrative: &[NarrativeItem],
    ) -> AppResult<Result<Vec<String>, Vec<ProviderFailure>>> {
        let vars = PromptVars::new().with("news", format_news_context(narrative));
        match self.llm.invoke(&DISEASE_EXTRACTION, &vars).await? {
            FallbackOutcome::Success { text, .. } => {
                let diseases = parse_disease_list(&text);
                info!(diseases = ?diseases, "Diseases identified in news");
                Ok(Ok(diseases))
            }
            FallbackOutcome::AllProvidersExhausted(failures) => {
                warn!("Disease extraction unavailable, skipping protocol lookups");
                Ok(Err(failures))
            }
        }
    }

    /// Look up and summarize treatment protocols for one disease.
    pub async fn summarize(&self, disease: &str) -> AppResult<FallbackOutcome> {
        info!(disease = %disease, "Searching clinical protocols");
        let results = self
            .search
            .search(&protocol_query(disease), self.max_results)
            .await?;

        let vars = PromptVars::new()
            .with("disease", disease)
            .with("context", format_results(&results));

        let outcome = match self.llm.invoke(&CLINICAL_SUMMARY, &vars).await? {
            FallbackOutcome::Success { provider, text } => FallbackOutcome::Success {
                provider,
                text: with_disclaimer(&text),
            },
            exhausted => exhausted,
        };
        Ok(outcome)
    }

    /// Full delegation over the narrative sources. Empty narrative means no work.
    pub async fn resolve(&self, narrative: &[NarrativeItem]) -> AppResult<ProtocolResolution> {
        let mut resolution = ProtocolResolution::default();
        if narrative.is_empty() {
            info!("No narrative sources, skipping disease extraction");
            return Ok(resolution);
        }

        let diseases = match self.extract_diseases(narrative).await? {
            Ok(diseases) => diseases,
            Err(failures) => {
                resolution
                    .failures
                    .push((DISEASE_EXTRACTION.name.to_string(), failures));
                return Ok(resolution);
            }
        };

        for disease in diseases {
            match self.summarize(&disease).await? {
                FallbackOutcome::Success { text, .. } => {
                    resolution.summaries.push(DiseaseSummary {
                        disease,
                        summary: text,
                    });
                }
                FallbackOutcome::AllProvidersExhausted(failures) => {
                    warn!(disease = %disease, "Protocol summary unavailable, omitting disease");
                    resolution
                        .failures
                        .push((format!("{}:{}", CLINICAL_SUMMARY.name, disease), failures));
                }
            }
        }

        info!(
            summaries = resolution.summaries.len(),
            failures = resolution.failures.len(),
            "Clinical protocol delegation complete"
        );
        Ok(resolution)
    }
}
