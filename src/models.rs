use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::llm::ProviderFailure;
use crate::pipeline::ReportPipeline;

pub use crate::metrics::{AgeGroup, CaseSeries, CaseTimeSeries, Metrics};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<ReportPipeline>,
}

/// Entry point of one report generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    /// State name, state code, or the national token.
    pub topic: String,
    #[serde(default)]
    pub city: Option<String>,
}

impl ReportRequest {
    pub fn new(topic: impl Into<String>, city: Option<String>) -> Self {
        Self {
            topic: topic.into(),
            city: city.filter(|c| !c.trim().is_empty()),
        }
    }
}

/// A news item used as report context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeItem {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseSummary {
    pub disease: String,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlotKind {
    #[serde(rename = "daily_cases_plot")]
    DailyCases,
    #[serde(rename = "monthly_cases_plot")]
    MonthlyCases,
}

impl PlotKind {
    pub const ALL: [PlotKind; 2] = [PlotKind::DailyCases, PlotKind::MonthlyCases];

    pub fn file_prefix(&self) -> &'static str {
        match self {
            PlotKind::DailyCases => "daily_cases",
            PlotKind::MonthlyCases => "monthly_cases",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            PlotKind::DailyCases => "Casos Diários de SRAG (Últimos 30 dias)",
            PlotKind::MonthlyCases => "Casos Mensais de SRAG (Últimos 12 meses)",
        }
    }

    pub fn x_label(&self) -> &'static str {
        match self {
            PlotKind::DailyCases => "Data",
            PlotKind::MonthlyCases => "Mês",
        }
    }
}

/// State threaded through the six pipeline stages.
///
/// Created with only `topic`/`city`; every other field is written by exactly
/// one stage through [`StateUpdate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportState {
    pub topic: String,
    pub city: Option<String>,
    pub metrics: Option<Metrics>,
    pub time_series: CaseTimeSeries,
    pub narrative: Vec<NarrativeItem>,
    /// Protocol summaries in extraction order.
    pub clinical_protocols: Vec<DiseaseSummary>,
    pub plot_paths: BTreeMap<PlotKind, PathBuf>,
    pub report_text: Option<String>,
    pub pdf_report_path: Option<PathBuf>,
    /// Generation step -> providers that failed for it.
    pub generation_failures: BTreeMap<String, Vec<ProviderFailure>>,
}

impl ReportState {
    pub fn new(request: &ReportRequest) -> Self {
        Self {
            topic: request.topic.clone(),
            city: request.city.clone(),
            ..Default::default()
        }
    }

    /// "city, topic" when a distinct city was requested, otherwise the topic.
    pub fn full_topic(&self) -> String {
        match self.city.as_deref().map(str::trim) {
            Some(city) if !city.is_empty() && !city.eq_ignore_ascii_case(self.topic.trim()) => {
                format!("{}, {}", city, self.topic.trim())
            }
            _ => self.topic.trim().to_string(),
        }
    }

    /// Merge a stage's output. Fields absent from the update are untouched.
    pub fn apply(&mut self, update: StateUpdate) {
        let StateUpdate {
            metrics,
            time_series,
            plot_paths,
            narrative,
            clinical_protocols,
            report_text,
            pdf_report_path,
            generation_failures,
        } = update;

        if let Some(metrics) = metrics {
            self.metrics = Some(metrics);
        }
        if let Some(series) = time_series {
            self.time_series = series;
        }
        if let Some(paths) = plot_paths {
            self.plot_paths = paths;
        }
        if let Some(items) = narrative {
            self.narrative = items;
        }
        if let Some(protocols) = clinical_protocols {
            self.clinical_protocols = protocols;
        }
        if let Some(text) = report_text {
            self.report_text = Some(text);
        }
        if let Some(path) = pdf_report_path {
            self.pdf_report_path = Some(path);
        }
        for (step, failures) in generation_failures {
            self.generation_failures.entry(step).or_default().extend(failures);
        }
    }
}

/// Partial output of one pipeline stage.
#[derive(Debug, Default)]
pub struct StateUpdate {
    pub metrics: Option<Metrics>,
    pub time_series: Option<CaseTimeSeries>,
    pub plot_paths: Option<BTreeMap<PlotKind, PathBuf>>,
    pub narrative: Option<Vec<NarrativeItem>>,
    pub clinical_protocols: Option<Vec<DiseaseSummary>>,
    pub report_text: Option<String>,
    pub pdf_report_path: Option<PathBuf>,
    pub generation_failures: Vec<(String, Vec<ProviderFailure>)>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub topic: String,
    pub city: Option<String>,
    pub metrics: Metrics,
    pub time_series: CaseTimeSeries,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
