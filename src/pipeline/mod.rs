//! Report Pipeline
//!
//! Six strictly sequential stages threading one [`ReportState`]:
//!
//! ```text
//! compute_metrics → render_plots → fetch_narrative
//!     → resolve_clinical_protocols → compose_report → render_pdf
//! ```
//!
//! Each stage reads the fields it needs and returns a [`StateUpdate`] that is
//! merged before the next stage starts. A stage error aborts the run; no
//! partial state is returned.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use tracing::{debug, error, info, warn};

use crate::agents::news::format_news_context;
use crate::agents::{ClinicalProtocolAgent, NewsAgent};
use crate::config::Config;
use crate::llm::{FallbackChain, FallbackOutcome};
use crate::metrics::{Metrics, MetricsEngine};
use crate::models::{PlotKind, ReportRequest, ReportState, StateUpdate};
use crate::prompts::{PromptVars, FINAL_REPORT};
use crate::render::{
    pdf_file_name, plot_identifier, plot_path, LopdfRenderer, PdfRenderer, PlotRenderer,
    PlottersRenderer,
};
use crate::search::{self, SearchTool};
use crate::types::{AppError, AppResult};

pub const NO_NEWS_CONTEXT: &str = "Nenhuma notícia recente encontrada.";
pub const NO_PROTOCOLS_CONTEXT: &str = "Nenhum protocolo clínico específico foi pesquisado.";
pub const UNAVAILABLE: &str = "Indisponível";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ComputeMetrics,
    RenderPlots,
    FetchNarrative,
    ResolveClinicalProtocols,
    ComposeReport,
    RenderPdf,
}

impl Stage {
    pub const ORDER: [Stage; 6] = [
        Stage::ComputeMetrics,
        Stage::RenderPlots,
        Stage::FetchNarrative,
        Stage::ResolveClinicalProtocols,
        Stage::ComposeReport,
        Stage::RenderPdf,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::ComputeMetrics => "compute_metrics",
            Stage::RenderPlots => "render_plots",
            Stage::FetchNarrative => "fetch_narrative",
            Stage::ResolveClinicalProtocols => "resolve_clinical_protocols",
            Stage::ComposeReport => "compose_report",
            Stage::RenderPdf => "render_pdf",
        }
    }
}

pub struct ReportPipeline {
    dataset_path: PathBuf,
    output_dir: PathBuf,
    llm: Arc<FallbackChain>,
    news: NewsAgent,
    clinical: ClinicalProtocolAgent,
    plots: Arc<dyn PlotRenderer>,
    pdf: Arc<dyn PdfRenderer>,
}

impl ReportPipeline {
    pub fn new(
        dataset_path: PathBuf,
        output_dir: PathBuf,
        llm: Arc<FallbackChain>,
        search: Arc<dyn SearchTool>,
        max_results: usize,
    ) -> Self {
        Self {
            dataset_path,
            output_dir,
            news: NewsAgent::new(search.clone(), max_results),
            clinical: ClinicalProtocolAgent::new(search, llm.clone(), max_results),
            llm,
            plots: Arc::new(PlottersRenderer::default()),
            pdf: Arc::new(LopdfRenderer),
        }
    }

    /// Wire every collaborator from configuration.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let llm = Arc::new(FallbackChain::from_config(&config.llm)?);
        let search = search::from_config(&config.search)?;
        Ok(Self::new(
            config.data.dataset_path.clone(),
            config.data.output_dir.clone(),
            llm,
            search,
            config.search.max_results,
        ))
    }

    pub fn with_renderers(mut self, plots: Arc<dyn PlotRenderer>, pdf: Arc<dyn PdfRenderer>) -> Self {
        self.plots = plots;
        self.pdf = pdf;
        self
    }

    pub fn dataset_path(&self) -> &PathBuf {
        &self.dataset_path
    }

    pub async fn run(&self, request: &ReportRequest) -> AppResult<ReportState> {
        self.run_with_observer(request, |_, _| {}).await
    }

    /// Run every stage, calling `observe` with the state each stage receives.
    pub async fn run_with_observer<F>(&self, request: &ReportRequest, mut observe: F) -> AppResult<ReportState>
    where
        F: FnMut(Stage, &ReportState) + Send,
    {
        let mut state = ReportState::new(request);
        info!(topic = %state.topic, city = ?state.city, "Starting report pipeline");

        for stage in Stage::ORDER {
            observe(stage, &state);
            info!(stage = stage.name(), "Stage started");

            let update = match self.execute(stage, &state).await {
                Ok(update) => update,
                Err(e) => {
                    error!(stage = stage.name(), error = %e, "Stage failed");
                    return Err(e);
                }
            };
            state.apply(update);

            info!(stage = stage.name(), "Stage complete");
        }

        info!(
            topic = %state.topic,
            report = state.report_text.is_some(),
            pdf = ?state.pdf_report_path,
            "Report pipeline finished"
        );
        Ok(state)
    }

    async fn execute(&self, stage: Stage, state: &ReportState) -> AppResult<StateUpdate> {
        match stage {
            Stage::ComputeMetrics => self.compute_metrics(state).await,
            Stage::RenderPlots => self.render_plots(state).await,
            Stage::FetchNarrative => self.fetch_narrative(state).await,
            Stage::ResolveClinicalProtocols => self.resolve_clinical_protocols(state).await,
            Stage::ComposeReport => self.compose_report(state).await,
            Stage::RenderPdf => self.render_pdf(state).await,
        }
    }

    async fn compute_metrics(&self, state: &ReportState) -> AppResult<StateUpdate> {
        let path = self.dataset_path.clone();
        let topic = state.topic.clone();
        let city = state.city.clone();

        let (metrics, series) = tokio::task::spawn_blocking(move || {
            let engine = MetricsEngine::load(&path, &topic, city.as_deref())?;
            Ok::<_, AppError>((engine.compute_all(), engine.time_series()))
        })
        .await
        .map_err(|e| AppError::Internal(format!("metrics task failed: {}", e)))??;

        info!(
            records = metrics.record_count,
            mortality = metrics.mortality_rate,
            daily_points = series.daily.len(),
            monthly_points = series.monthly.len(),
            "Metrics computed"
        );

        Ok(StateUpdate {
            metrics: Some(metrics),
            time_series: Some(series),
            ..Default::default()
        })
    }

    async fn render_plots(&self, state: &ReportState) -> AppResult<StateUpdate> {
        let identifier = plot_identifier(&state.topic, state.city.as_deref());
        let mut paths = BTreeMap::new();

        for kind in PlotKind::ALL {
            let series = match kind {
                PlotKind::DailyCases => &state.time_series.daily,
                PlotKind::MonthlyCases => &state.time_series.monthly,
            };
            if series.is_empty() {
                debug!(kind = ?kind, "Empty series, no plot");
                continue;
            }

            let renderer = self.plots.clone();
            let series = series.clone();
            let output = plot_path(&self.output_dir, kind, &identifier);
            let path = tokio::task::spawn_blocking(move || renderer.render(kind, &series, &output))
                .await
                .map_err(|e| AppError::Internal(format!("plot task failed: {}", e)))??;

            info!(kind = ?kind, path = %path.display(), "Plot ready");
            paths.insert(kind, path);
        }

        Ok(StateUpdate {
            plot_paths: Some(paths),
            ..Default::default()
        })
    }

    async fn fetch_narrative(&self, state: &ReportState) -> AppResult<StateUpdate> {
        let items = self.news.fetch(&state.full_topic()).await?;
        Ok(StateUpdate {
            narrative: Some(items),
            ..Default::default()
        })
    }

    async fn resolve_clinical_protocols(&self, state: &ReportState) -> AppResult<StateUpdate> {
        let resolution = self.clinical.resolve(&state.narrative).await?;
        Ok(StateUpdate {
            clinical_protocols: Some(resolution.summaries),
            generation_failures: resolution.failures,
            ..Default::default()
        })
    }

    async fn compose_report(&self, state: &ReportState) -> AppResult<StateUpdate> {
        let vars = report_vars(state)?;

        match self.llm.invoke(&FINAL_REPORT, &vars).await? {
            FallbackOutcome::Success { provider, text } => {
                info!(provider = %provider, chars = text.len(), "Final report generated");
                Ok(StateUpdate {
                    report_text: Some(text),
                    ..Default::default()
                })
            }
            FallbackOutcome::AllProvidersExhausted(failures) => {
                error!("Final report unavailable, no provider answered");
                Ok(StateUpdate {
                    generation_failures: vec![(FINAL_REPORT.name.to_string(), failures)],
                    ..Default::default()
                })
            }
        }
    }

    async fn render_pdf(&self, state: &ReportState) -> AppResult<StateUpdate> {
        let Some(text) = state.report_text.clone() else {
            warn!("No report text, skipping PDF");
            return Ok(StateUpdate::default());
        };

        let file_name = pdf_file_name(&state.topic, state.city.as_deref(), Local::now().naive_local());
        let output = self.output_dir.join(file_name);
        let plots = state.plot_paths.clone();
        let renderer = self.pdf.clone();

        let path = tokio::task::spawn_blocking(move || renderer.render(&text, &plots, &output))
            .await
            .map_err(|e| AppError::Internal(format!("PDF task failed: {}", e)))??;

        Ok(StateUpdate {
            pdf_report_path: Some(path),
            ..Default::default()
        })
    }
}

fn format_percent(value: f64) -> String {
    format!("{:.2}", value)
}

fn format_case_increase(value: f64) -> String {
    if value.is_infinite() {
        "sem casos na semana anterior (aumento não mensurável)".to_string()
    } else {
        format!("{:.2}%", value)
    }
}

fn format_breakdown<K: std::fmt::Display>(values: &BTreeMap<K, f64>) -> String {
    if values.is_empty() {
        return UNAVAILABLE.to_string();
    }
    values
        .iter()
        .map(|(key, value)| format!("{}: {:.2}%", key, value))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_protocols(state: &ReportState) -> String {
    if state.clinical_protocols.is_empty() {
        return NO_PROTOCOLS_CONTEXT.to_string();
    }
    state
        .clinical_protocols
        .iter()
        .map(|p| format!("**{}**\n{}", p.disease.to_uppercase(), p.summary))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Template values for the final report prompt.
pub fn report_vars(state: &ReportState) -> AppResult<PromptVars> {
    let metrics: &Metrics = state
        .metrics
        .as_ref()
        .ok_or_else(|| AppError::Internal("metrics not computed before report composition".to_string()))?;

    let news_context = if state.narrative.is_empty() {
        NO_NEWS_CONTEXT.to_string()
    } else {
        format_news_context(&state.narrative)
    };

    Ok(PromptVars::new()
        .with("topic", state.full_topic())
        .with("mortality_rate", format_percent(metrics.mortality_rate))
        .with("icu_rate", format_percent(metrics.icu_rate))
        .with("vaccination_rate", format_percent(metrics.vaccination_rate))
        .with("flu_vaccination_rate", format_percent(metrics.flu_vaccination_rate))
        .with("case_increase_rate", format_case_increase(metrics.case_increase_rate))
        .with(
            "avg_notification_days",
            metrics
                .avg_notification_days
                .map(|d| format!("{:.1} dias", d))
                .unwrap_or_else(|| UNAVAILABLE.to_string()),
        )
        .with("case_proportions", format_breakdown(&metrics.case_proportions))
        .with("lethality_by_age", format_breakdown(&metrics.lethality_by_age))
        .with("invasive_ventilation_rate", format_percent(metrics.invasive_ventilation_rate))
        .with("news_context", news_context)
        .with("protocols_context", format_protocols(state)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::AgeGroup;
    use crate::models::DiseaseSummary;

    fn metrics() -> Metrics {
        let mut lethality = BTreeMap::new();
        lethality.insert(AgeGroup::From0To9, 10.0);
        lethality.insert(AgeGroup::From80, 42.5);
        Metrics {
            record_count: 10,
            mortality_rate: 25.0,
            icu_rate: 12.5,
            vaccination_rate: 50.0,
            flu_vaccination_rate: 20.0,
            case_increase_rate: f64::INFINITY,
            avg_notification_days: None,
            case_proportions: BTreeMap::new(),
            lethality_by_age: lethality,
            invasive_ventilation_rate: 0.0,
        }
    }

    #[test]
    fn test_stage_order() {
        let names: Vec<&str> = Stage::ORDER.iter().map(Stage::name).collect();
        assert_eq!(
            names,
            vec![
                "compute_metrics",
                "render_plots",
                "fetch_narrative",
                "resolve_clinical_protocols",
                "compose_report",
                "render_pdf"
            ]
        );
    }

    #[test]
    fn test_report_vars_require_metrics() {
        let state = ReportState::new(&ReportRequest::new("SP", None));
        assert!(matches!(report_vars(&state), Err(AppError::Internal(_))));
    }

    #[test]
    fn test_report_vars_formatting() {
        let mut state = ReportState::new(&ReportRequest::new("SC", Some("Joinville".into())));
        state.metrics = Some(metrics());
        state.clinical_protocols = vec![DiseaseSummary {
            disease: "Influenza A".into(),
            summary: "Oseltamivir.".into(),
        }];

        let vars = report_vars(&state).unwrap();
        assert_eq!(vars.get("topic"), Some("Joinville, SC"));
        assert_eq!(vars.get("icu_rate"), Some("12.50"));
        assert_eq!(
            vars.get("case_increase_rate"),
            Some("sem casos na semana anterior (aumento não mensurável)")
        );
        assert_eq!(vars.get("avg_notification_days"), Some(UNAVAILABLE));
        assert_eq!(vars.get("case_proportions"), Some(UNAVAILABLE));
        assert_eq!(
            vars.get("lethality_by_age"),
            Some("0-9 anos: 10.00%, 80+ anos: 42.50%")
        );
        assert_eq!(vars.get("news_context"), Some(NO_NEWS_CONTEXT));
        assert_eq!(vars.get("protocols_context"), Some("**INFLUENZA A**\nOseltamivir."));
    }
}
