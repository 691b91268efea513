// SRAG Report - epidemiological report generation for Brazilian SRAG surveillance data

pub mod agents;
pub mod config;
pub mod dataset;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod render;
pub mod routes;
pub mod search;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;
pub use pipeline::ReportPipeline;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
