use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use srag_report::metrics::MetricsEngine;
use srag_report::models::{MetricsResponse, ReportRequest};
use srag_report::{config::Config, create_router, utils, AppState, ReportPipeline};

#[derive(Parser)]
#[command(name = "srag-report", version, about = "SRAG epidemiological report generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute metrics and case series only, printed as JSON
    Metrics {
        /// State name, state code, or BR for the whole country
        #[arg(long)]
        topic: String,
        #[arg(long)]
        city: Option<String>,
        /// Override DATASET_PATH
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
    /// Run the full report pipeline
    Report {
        #[arg(long)]
        topic: String,
        #[arg(long)]
        city: Option<String>,
    },
    /// Start the HTTP API
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    utils::init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Metrics { topic, city, dataset } => {
            let request = ReportRequest::new(topic, city);
            let path = dataset.unwrap_or_else(|| config.data.dataset_path.clone());

            let engine = MetricsEngine::load(&path, &request.topic, request.city.as_deref())?;
            let response = MetricsResponse {
                topic: request.topic,
                city: request.city,
                metrics: engine.compute_all(),
                time_series: engine.time_series(),
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Report { topic, city } => {
            let pipeline = ReportPipeline::from_config(&config)?;
            let state = pipeline.run(&ReportRequest::new(topic, city)).await?;

            match &state.report_text {
                Some(text) => println!("{}", text),
                None => eprintln!("Report text unavailable: no LLM provider answered"),
            }
            for (kind, path) in &state.plot_paths {
                println!("{:?}: {}", kind, path.display());
            }
            if let Some(pdf) = &state.pdf_report_path {
                println!("PDF: {}", pdf.display());
            }
            for (step, failures) in &state.generation_failures {
                for failure in failures {
                    eprintln!("{} failed on {}: {}", step, failure.provider, failure.reason);
                }
            }
        }
        Command::Serve => serve(config).await?,
    }

    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!("Configuration loaded: {:?}", config.server);

    let pipeline = ReportPipeline::from_config(&config)?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState {
        config: Arc::new(config),
        pipeline: Arc::new(pipeline),
    };
    let app = create_router(state);

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
