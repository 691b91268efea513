//! Rendering collaborators: time-series plots and the final PDF document.

pub mod pdf;
pub mod plots;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::models::{CaseSeries, PlotKind};
use crate::utils::sanitize_file_component;

pub use pdf::LopdfRenderer;
pub use plots::PlottersRenderer;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("nothing to plot for {0:?}")]
    EmptySeries(PlotKind),

    #[error("plot rendering failed: {0}")]
    Plot(String),

    #[error("PDF rendering failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait PlotRenderer: Send + Sync {
    /// Draw `series` to `output`, returning the written path.
    fn render(&self, kind: PlotKind, series: &CaseSeries, output: &Path) -> Result<PathBuf, RenderError>;
}

pub trait PdfRenderer: Send + Sync {
    /// Write the report text followed by the available plots.
    fn render(
        &self,
        report_text: &str,
        plots: &BTreeMap<PlotKind, PathBuf>,
        output: &Path,
    ) -> Result<PathBuf, RenderError>;
}

/// "SANTA_CATARINA" or "SP_SAO_JOSE_DOS_CAMPOS"-style identifier for plot files.
pub fn plot_identifier(topic: &str, city: Option<&str>) -> String {
    let normalize = |s: &str| s.trim().to_uppercase().replace(' ', "_");
    let topic = match topic.trim() {
        "" => "BRASIL".to_string(),
        t => normalize(t),
    };
    let id = match city.map(normalize).filter(|c| !c.is_empty()) {
        Some(city) => format!("{}_{}", topic, city),
        None => topic,
    };
    sanitize_file_component(&id)
}

pub fn plot_path(output_dir: &Path, kind: PlotKind, identifier: &str) -> PathBuf {
    output_dir.join(format!("{}_{}.png", kind.file_prefix(), identifier))
}

/// `relatorio_srag_<topic>[_<city>]_<YYYYmmdd_HHMMSS>.pdf`
pub fn pdf_file_name(topic: &str, city: Option<&str>, timestamp: NaiveDateTime) -> String {
    let topic = match topic.trim() {
        "" => "relatorio",
        t => t,
    };
    let full_topic = match city.map(str::trim).filter(|c| !c.is_empty()) {
        Some(city) => format!("{}_{}", topic, city),
        None => topic.to_string(),
    };
    format!(
        "relatorio_srag_{}_{}.pdf",
        sanitize_file_component(&full_topic),
        timestamp.format("%Y%m%d_%H%M%S")
    )
}
