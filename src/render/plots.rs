use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use plotters::prelude::*;
use tracing::info;

use super::{PlotRenderer, RenderError};
use crate::models::{CaseSeries, PlotKind};

/// PNG line charts drawn with plotters.
pub struct PlottersRenderer {
    width: u32,
    height: u32,
}

impl Default for PlottersRenderer {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 500,
        }
    }
}

fn plot_err<E: std::fmt::Display>(err: E) -> RenderError {
    RenderError::Plot(err.to_string())
}

fn date_format(kind: PlotKind) -> &'static str {
    match kind {
        PlotKind::DailyCases => "%d/%m",
        PlotKind::MonthlyCases => "%m/%Y",
    }
}

impl PlotRenderer for PlottersRenderer {
    fn render(&self, kind: PlotKind, series: &CaseSeries, output: &Path) -> Result<PathBuf, RenderError> {
        if series.is_empty() {
            return Err(RenderError::EmptySeries(kind));
        }
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }

        let dates: Vec<NaiveDate> = series.keys().copied().collect();
        let values: Vec<f64> = series.values().map(|v| *v as f64).collect();
        let max_y = values.iter().cloned().fold(0.0, f64::max).max(1.0) * 1.1;
        let max_x = dates.len().saturating_sub(1).max(1) as f64;
        let format = date_format(kind);

        let root = BitMapBackend::new(output, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_err)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .caption(kind.title(), ("sans-serif", 24))
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0f64..max_x, 0f64..max_y)
            .map_err(plot_err)?;

        chart
            .configure_mesh()
            .x_labels(dates.len().min(10))
            .x_desc(kind.x_label())
            .y_desc("Número de Casos")
            .x_label_formatter(&|x| {
                let idx = x.round() as usize;
                dates
                    .get(idx)
                    .map(|d| d.format(format).to_string())
                    .unwrap_or_default()
            })
            .draw()
            .map_err(plot_err)?;

        chart
            .draw_series(LineSeries::new(
                values.iter().enumerate().map(|(i, v)| (i as f64, *v)),
                &BLUE,
            ))
            .map_err(plot_err)?;
        chart
            .draw_series(
                values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| Circle::new((i as f64, *v), 3, BLUE.filled())),
            )
            .map_err(plot_err)?;

        root.present().map_err(plot_err)?;

        info!(kind = ?kind, path = %output.display(), points = dates.len(), "Plot rendered");
        Ok(output.to_path_buf())
    }
}
