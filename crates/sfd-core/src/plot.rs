//! Plot requests for processed regions. Rendering lives behind [`Visualizer`];
//! a failed plot is logged and never affects the computed records.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::pipeline::RunReport;

/// Fitted curves of one region, ready to draw on log-log axes.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSeries {
    pub name: String,
    pub label: String,
    pub csfd_x: Vec<f64>,
    pub csfd_y: Vec<f64>,
    pub csfd_b: f64,
    pub fd_x: Vec<f64>,
    pub fd_y: Vec<f64>,
    pub fd_b: f64,
}

impl PlotSeries {
    /// Points of a curve usable on log axes (both coordinates positive and finite).
    pub fn log_points(xs: &[f64], ys: &[f64]) -> Vec<(f64, f64)> {
        xs.iter()
            .zip(ys.iter())
            .filter(|(x, y)| x.is_finite() && y.is_finite() && **x > 0.0 && **y > 0.0)
            .map(|(&x, &y)| (x, y))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct PlotRequest {
    pub path: PathBuf,
    pub series: PlotSeries,
}

impl PlotRequest {
    /// `<prefix><region name>.png`
    pub fn for_series(prefix: &str, series: PlotSeries) -> Self {
        Self { path: PathBuf::from(format!("{prefix}{}.png", series.name)), series }
    }
}

pub trait Visualizer {
    type Error: std::fmt::Display;

    fn plot(&mut self, request: &PlotRequest) -> Result<(), Self::Error>;
}

/// Render one plot per processed region. Returns how many plots failed.
pub fn render_report<V: Visualizer>(report: &RunReport, visualizer: &mut V, prefix: &str) -> usize {
    let mut failed = 0;
    for analysis in report.processed() {
        let request = PlotRequest::for_series(prefix, analysis.plot_series());
        match visualizer.plot(&request) {
            Ok(()) => debug!(path = %request.path.display(), "plot written"),
            Err(e) => {
                failed += 1;
                warn!(region = %analysis.region_id, path = %request.path.display(), error = %e, "plot failed");
            }
        }
    }
    failed
}
