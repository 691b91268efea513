//! End-to-end report pipeline runs with in-memory collaborators.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use srag_report::llm::{FallbackChain, LLMAdapter, LLMError, LLMResult, LLM};
use srag_report::models::{CaseSeries, NarrativeItem, PlotKind, ReportRequest};
use srag_report::pipeline::{ReportPipeline, Stage, NO_NEWS_CONTEXT, NO_PROTOCOLS_CONTEXT};
use srag_report::prompts::CLINICAL_DISCLAIMER;
use srag_report::render::{PdfRenderer, PlotRenderer, RenderError};
use srag_report::search::{SearchError, SearchTool};
use srag_report::types::{AppError, LLMRequest, LLMResponse, TokenUsage};

const DATASET: &str = "data_notificacao;uf_notificacao;municipio_notificacao;evolucao_caso;internado_uti\n\
    2024-01-15;SC;Joinville;Cura;Não\n\
    2024-02-20;SC;Joinville;Óbito;Sim\n\
    2024-03-01;SC;Joinville;Cura;Não\n\
    2024-03-02;SC;Joinville;Cura;Sim\n\
    2024-03-02;SC;Florianópolis;Óbito;Sim\n\
    2024-03-03;SP;São Paulo;Cura;Não\n";

// ---------- fakes ----------

struct FakeSearch {
    news: Vec<NarrativeItem>,
    fail: bool,
    queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    fn with_news(news: Vec<NarrativeItem>) -> Arc<Self> {
        Arc::new(Self {
            news,
            fail: false,
            queries: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            news: Vec::new(),
            fail: true,
            queries: Mutex::new(Vec::new()),
        })
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchTool for FakeSearch {
    fn name(&self) -> &str {
        "fake"
    }

    async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<NarrativeItem>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            return Err(SearchError::RequestFailed("connection reset".into()));
        }
        if query.starts_with("protocolo") {
            return Ok(vec![NarrativeItem {
                title: "Protocolo".into(),
                url: Some("https://www.gov.br/saude/protocolo".into()),
                content: "Manejo clínico.".into(),
            }]);
        }
        Ok(self.news.clone())
    }
}

/// Answers each prompt by recognizing which step produced it.
struct PromptRouter {
    fail_all: bool,
    fail_final_report: bool,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl PromptRouter {
    fn llm(name: &str, fail_all: bool, fail_final_report: bool) -> (LLM, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let adapter = PromptRouter {
            fail_all,
            fail_final_report,
            prompts: prompts.clone(),
        };
        (LLM::from_adapter(name, "fake-model", Box::new(adapter)), prompts)
    }
}

#[async_trait]
impl LLMAdapter for PromptRouter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> LLMResult<LLMResponse> {
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt.clone());

        if self.fail_all {
            return Err(LLMError::RateLimited("quota exceeded".into()));
        }

        let content = if prompt.contains("liste as principais doenças") {
            "Influenza A, Covid-19, influenza a".to_string()
        } else if prompt.contains("resuma as principais abordagens") {
            "Tratamento de suporte e antivirais.".to_string()
        } else if self.fail_final_report {
            return Err(LLMError::Transient("503 Service Unavailable".into()));
        } else {
            "# Relatório\n\nCenário estável.".to_string()
        };

        Ok(LLMResponse {
            content,
            finish_reason: "stop".into(),
            usage: TokenUsage::default(),
        })
    }
}

#[derive(Default)]
struct RecordingPlots {
    kinds: Mutex<Vec<PlotKind>>,
}

impl PlotRenderer for RecordingPlots {
    fn render(&self, kind: PlotKind, series: &CaseSeries, output: &Path) -> Result<PathBuf, RenderError> {
        assert!(!series.is_empty());
        self.kinds.lock().unwrap().push(kind);
        Ok(output.to_path_buf())
    }
}

#[derive(Default)]
struct RecordingPdf {
    texts: Mutex<Vec<String>>,
}

impl PdfRenderer for RecordingPdf {
    fn render(
        &self,
        report_text: &str,
        _plots: &BTreeMap<PlotKind, PathBuf>,
        output: &Path,
    ) -> Result<PathBuf, RenderError> {
        self.texts.lock().unwrap().push(report_text.to_string());
        Ok(output.to_path_buf())
    }
}

// ---------- harness ----------

struct Harness {
    _dir: tempfile::TempDir,
    output: PathBuf,
    pipeline: ReportPipeline,
    plots: Arc<RecordingPlots>,
    pdf: Arc<RecordingPdf>,
}

fn harness(providers: Vec<LLM>, search: Arc<FakeSearch>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("OpenSUS_limpo.csv");
    std::fs::write(&dataset, DATASET).unwrap();
    let output = dir.path().join("output");

    let plots = Arc::new(RecordingPlots::default());
    let pdf = Arc::new(RecordingPdf::default());
    let pipeline = ReportPipeline::new(
        dataset,
        output.clone(),
        Arc::new(FallbackChain::new(providers, 0.7)),
        search,
        3,
    )
    .with_renderers(plots.clone(), pdf.clone());

    Harness {
        _dir: dir,
        output,
        pipeline,
        plots,
        pdf,
    }
}

fn news() -> Vec<NarrativeItem> {
    vec![NarrativeItem {
        title: "Casos de gripe sobem em Joinville".into(),
        url: Some("https://exemplo.com.br/noticia".into()),
        content: "Influenza A e Covid-19 lideram internações.".into(),
    }]
}

// ---------- tests ----------

#[tokio::test]
async fn test_full_run_threads_state_through_every_stage() {
    let (llm, prompts) = PromptRouter::llm("google", false, false);
    let search = FakeSearch::with_news(news());
    let h = harness(vec![llm], search.clone());

    let mut seen = Vec::new();
    let state = h
        .pipeline
        .run_with_observer(&ReportRequest::new("SC", Some("Joinville".into())), |stage, state| {
            match stage {
                Stage::ComputeMetrics => assert!(state.metrics.is_none()),
                Stage::RenderPlots => {
                    assert!(state.metrics.is_some());
                    assert!(state.narrative.is_empty());
                }
                Stage::FetchNarrative => assert_eq!(state.plot_paths.len(), 2),
                Stage::ResolveClinicalProtocols => assert_eq!(state.narrative.len(), 1),
                Stage::ComposeReport => assert_eq!(state.clinical_protocols.len(), 2),
                Stage::RenderPdf => assert!(state.report_text.is_some()),
            }
            seen.push(stage);
        })
        .await
        .unwrap();

    assert_eq!(seen, Stage::ORDER.to_vec());

    let metrics = state.metrics.as_ref().unwrap();
    assert_eq!(metrics.record_count, 4);
    assert_eq!(metrics.mortality_rate, 25.0);

    assert_eq!(
        state.plot_paths[&PlotKind::DailyCases],
        h.output.join("daily_cases_SC_JOINVILLE.png")
    );
    assert_eq!(
        *h.plots.kinds.lock().unwrap(),
        vec![PlotKind::DailyCases, PlotKind::MonthlyCases]
    );

    // Duplicate spelling dropped, extraction order kept.
    let diseases: Vec<&str> = state.clinical_protocols.iter().map(|p| p.disease.as_str()).collect();
    assert_eq!(diseases, vec!["Influenza A", "Covid-19"]);
    for protocol in &state.clinical_protocols {
        assert!(protocol.summary.ends_with(CLINICAL_DISCLAIMER));
    }

    let queries = search.queries();
    assert_eq!(queries.len(), 3);
    assert!(queries[0].ends_with("em Joinville, SC"));
    assert!(queries[1].contains("'Influenza A'"));
    assert!(queries[2].contains("'Covid-19'"));

    let prompts = prompts.lock().unwrap();
    let final_prompt = prompts.last().unwrap();
    assert!(final_prompt.contains("**Tópico da Análise:** Joinville, SC"));
    assert!(final_prompt.contains("**INFLUENZA A**"));
    assert!(final_prompt.contains("Casos de gripe sobem em Joinville"));

    assert_eq!(state.report_text.as_deref(), Some("# Relatório\n\nCenário estável."));
    let pdf_path = state.pdf_report_path.as_ref().unwrap();
    let file_name = pdf_path.file_name().unwrap().to_string_lossy().to_string();
    assert!(file_name.starts_with("relatorio_srag_SC_Joinville_"));
    assert!(file_name.ends_with(".pdf"));
    assert_eq!(h.pdf.texts.lock().unwrap().len(), 1);
    assert!(state.generation_failures.is_empty());
}

#[tokio::test]
async fn test_rate_limited_provider_falls_back_to_next() {
    let (quota, quota_prompts) = PromptRouter::llm("google", true, false);
    let (backup, _) = PromptRouter::llm("groq", false, false);
    let h = harness(vec![quota, backup], FakeSearch::with_news(news()));

    let state = h
        .pipeline
        .run(&ReportRequest::new("SC", Some("Joinville".into())))
        .await
        .unwrap();

    assert!(state.report_text.is_some());
    assert_eq!(state.clinical_protocols.len(), 2);
    // extraction + two summaries + final report, each tried on the first provider once
    assert_eq!(quota_prompts.lock().unwrap().len(), 4);
    assert!(state.generation_failures.is_empty());
}

#[tokio::test]
async fn test_exhausted_final_report_skips_pdf() {
    let (first, _) = PromptRouter::llm("google", false, true);
    let (second, _) = PromptRouter::llm("groq", false, true);
    let h = harness(vec![first, second], FakeSearch::with_news(news()));

    let state = h.pipeline.run(&ReportRequest::new("SC", None)).await.unwrap();

    assert!(state.report_text.is_none());
    assert!(state.pdf_report_path.is_none());
    assert!(h.pdf.texts.lock().unwrap().is_empty());

    let failures = &state.generation_failures["final_report"];
    let providers: Vec<&str> = failures.iter().map(|f| f.provider.as_str()).collect();
    assert_eq!(providers, vec!["google", "groq"]);

    // Earlier stages kept their output.
    assert_eq!(state.metrics.as_ref().unwrap().record_count, 5);
    assert_eq!(state.clinical_protocols.len(), 2);
}

#[tokio::test]
async fn test_empty_narrative_skips_extraction() {
    let (llm, prompts) = PromptRouter::llm("google", false, false);
    let search = FakeSearch::with_news(Vec::new());
    let h = harness(vec![llm], search.clone());

    let state = h.pipeline.run(&ReportRequest::new("SC", None)).await.unwrap();

    assert!(state.narrative.is_empty());
    assert!(state.clinical_protocols.is_empty());
    assert_eq!(search.queries().len(), 1);

    let prompts = prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(NO_NEWS_CONTEXT));
    assert!(prompts[0].contains(NO_PROTOCOLS_CONTEXT));
    assert!(state.report_text.is_some());
}

#[tokio::test]
async fn test_search_failure_aborts_run() {
    let (llm, prompts) = PromptRouter::llm("google", false, false);
    let h = harness(vec![llm], FakeSearch::failing());

    let mut seen = Vec::new();
    let err = h
        .pipeline
        .run_with_observer(&ReportRequest::new("SC", None), |stage, _| seen.push(stage))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Search(SearchError::RequestFailed(_))));
    assert_eq!(seen.last(), Some(&Stage::FetchNarrative));
    assert!(prompts.lock().unwrap().is_empty());
    assert!(h.pdf.texts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_dataset_fails_first_stage() {
    let (llm, _) = PromptRouter::llm("google", false, false);
    let pipeline = ReportPipeline::new(
        PathBuf::from("/nonexistent/srag.csv"),
        PathBuf::from("output"),
        Arc::new(FallbackChain::new(vec![llm], 0.7)),
        FakeSearch::with_news(news()),
        3,
    );

    let err = pipeline.run(&ReportRequest::new("SC", None)).await.unwrap_err();
    assert!(matches!(err, AppError::Dataset(_)));
}
