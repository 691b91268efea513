use axum::{
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::post,
    Json, Router,
};
use tracing::{error, info};

use crate::metrics::MetricsEngine;
use crate::models::{AppState, ErrorResponse, MetricsResponse, ReportRequest, ReportState};
use crate::types::AppError;

type ApiError = (StatusCode, ResponseJson<ErrorResponse>);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/metrics", post(post_metrics))
        .route("/api/report", post(post_report))
        .with_state(state)
}

fn api_error(status: StatusCode, err: &AppError) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

pub async fn post_metrics(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> Result<ResponseJson<MetricsResponse>, ApiError> {
    let request = ReportRequest::new(request.topic, request.city);
    info!(topic = %request.topic, city = ?request.city, "Received metrics request");

    let path = state.pipeline.dataset_path().clone();
    let topic = request.topic.clone();
    let city = request.city.clone();

    let computed = tokio::task::spawn_blocking(move || {
        let engine = MetricsEngine::load(&path, &topic, city.as_deref())?;
        Ok::<_, AppError>((engine.compute_all(), engine.time_series()))
    })
    .await
    .map_err(|e| AppError::Internal(format!("metrics task failed: {}", e)))
    .and_then(|result| result);

    match computed {
        Ok((metrics, time_series)) => Ok(Json(MetricsResponse {
            topic: request.topic,
            city: request.city,
            metrics,
            time_series,
        })),
        Err(e) => {
            error!(error = %e, "Metrics request failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, &e))
        }
    }
}

pub async fn post_report(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> Result<ResponseJson<ReportState>, ApiError> {
    let request = ReportRequest::new(request.topic, request.city);
    info!(topic = %request.topic, city = ?request.city, "Received report request");

    match state.pipeline.run(&request).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            error!(error = %e, "Report generation failed");
            Err(api_error(StatusCode::BAD_GATEWAY, &e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::llm::FallbackChain;
    use crate::models::{CaseSeries, NarrativeItem, PlotKind};
    use crate::pipeline::ReportPipeline;
    use crate::render::{PdfRenderer, PlotRenderer, RenderError};
    use crate::search::{SearchError, SearchTool};

    const DATASET: &str = "data_notificacao;uf_notificacao;municipio_notificacao;evolucao_caso;internado_uti\n\
        2024-03-01;SC;Florianópolis;Óbito;Sim\n\
        2024-03-02;SC;Joinville;Cura;Não\n\
        2024-03-03;SC;Joinville;Cura;Não\n\
        2024-03-04;SC;Blumenau;Cura;Não\n\
        2024-03-04;SP;São Paulo;Óbito;Sim\n";

    struct NoResults;

    #[async_trait]
    impl SearchTool for NoResults {
        fn name(&self) -> &str {
            "none"
        }

        async fn search(&self, _query: &str, _max: usize) -> Result<Vec<NarrativeItem>, SearchError> {
            Ok(Vec::new())
        }
    }

    struct NullPlots;

    impl PlotRenderer for NullPlots {
        fn render(&self, _kind: PlotKind, _series: &CaseSeries, output: &Path) -> Result<PathBuf, RenderError> {
            Ok(output.to_path_buf())
        }
    }

    struct NullPdf;

    impl PdfRenderer for NullPdf {
        fn render(
            &self,
            _text: &str,
            _plots: &BTreeMap<PlotKind, PathBuf>,
            output: &Path,
        ) -> Result<PathBuf, RenderError> {
            Ok(output.to_path_buf())
        }
    }

    fn app(dataset: PathBuf, output: PathBuf) -> Router {
        let config = Config::from_lookup(|_| None).unwrap();
        let pipeline = ReportPipeline::new(
            dataset,
            output,
            Arc::new(FallbackChain::new(Vec::new(), 0.7)),
            Arc::new(NoResults),
            3,
        )
        .with_renderers(Arc::new(NullPlots), Arc::new(NullPdf));

        router(AppState {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        })
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("srag.csv");
        std::fs::write(&dataset, DATASET).unwrap();

        let response = app(dataset, dir.path().join("out"))
            .oneshot(post_json("/api/metrics", serde_json::json!({"topic": "SC"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["topic"], "SC");
        assert_eq!(json["metrics"]["record_count"], 4);
        assert_eq!(json["metrics"]["mortality_rate"], 25.0);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_missing_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path().join("missing.csv"), dir.path().join("out"))
            .oneshot(post_json("/api/metrics", serde_json::json!({"topic": "SC"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_report_without_providers_has_no_text() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("srag.csv");
        std::fs::write(&dataset, DATASET).unwrap();

        let response = app(dataset, dir.path().join("out"))
            .oneshot(post_json(
                "/api/report",
                serde_json::json!({"topic": "SC", "city": "Joinville"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["metrics"]["record_count"], 2);
        assert!(json["report_text"].is_null());
        assert!(json["pdf_report_path"].is_null());
        assert!(json["generation_failures"]["final_report"].is_array());
    }

    #[tokio::test]
    async fn test_report_stage_failure_is_bad_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path().join("missing.csv"), dir.path().join("out"))
            .oneshot(post_json("/api/report", serde_json::json!({"topic": "SC"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
