//! Run configuration.
//!
//! Every field has a default calibrated to the camembert sector workflow
//! (1 km² exclusion, 100 log bins, densities per 10⁵ area units), so an empty
//! JSON object is a complete config.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SfdError};

// ── Fit settings ──────────────────────────────────────────────────────────────

/// Levenberg–Marquardt settings for the power-law fitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub max_iterations: usize,
    /// Relative parameter step below which the fit counts as converged.
    pub xtol: f64,
    /// Relative reduction of the residual sum below which the fit counts as converged.
    pub ftol: f64,
    pub initial_lambda: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            xtol: 1e-10,
            ftol: 1e-12,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
        }
    }
}

// ── Pipeline settings ─────────────────────────────────────────────────────────

pub const DEFAULT_PALETTE: [&str; 16] = [
    "red", "orange", "gold", "green", "teal", "blue", "navy", "purple", "magenta", "brown",
    "olive", "maroon", "coral", "cyan", "gray", "black",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Regions with area at or above this value are excluded.
    pub exclusion_area: f64,
    /// Number of log-spaced bin edges per region.
    pub num_bins: usize,
    /// Density multiplier: density = overlaps / area · density_scale.
    pub density_scale: f64,
    /// Ordered labels, assigned by ascending distinct truncated area.
    pub palette: Vec<String>,
    /// Explicit region names in processing order. `None` numbers valid regions from 1.
    pub region_names: Option<Vec<String>>,
    /// FD bins whose count equals this value are dropped before fitting.
    /// 0 drops empty bins; 10000 reproduces the legacy sentinel.
    pub fd_drop_count: u64,
    /// Apply the CSFD under-determined guard (< 2 points → (0, 0)) to FD as well.
    pub guard_fd: bool,
    pub fit: FitConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            exclusion_area: 1_000_000.0,
            num_bins: 100,
            density_scale: 100_000.0,
            palette: DEFAULT_PALETTE.iter().map(|s| s.to_string()).collect(),
            region_names: None,
            fd_drop_count: 0,
            guard_fd: true,
            fit: FitConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let cfg: PipelineConfig = serde_json::from_str(&text)?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.exclusion_area.is_finite() && self.exclusion_area > 0.0) {
            return Err(SfdError::Config {
                name: "exclusion_area",
                value: self.exclusion_area.to_string(),
                reason: "must be a positive finite area".into(),
            });
        }
        if self.num_bins < 2 {
            return Err(SfdError::Config {
                name: "num_bins",
                value: self.num_bins.to_string(),
                reason: "need at least two edges to form a bin".into(),
            });
        }
        if !(self.density_scale.is_finite() && self.density_scale > 0.0) {
            return Err(SfdError::Config {
                name: "density_scale",
                value: self.density_scale.to_string(),
                reason: "must be a positive finite multiplier".into(),
            });
        }
        if self.palette.is_empty() {
            return Err(SfdError::Config {
                name: "palette",
                value: "[]".into(),
                reason: "at least one label is required".into(),
            });
        }
        if self.fit.max_iterations == 0 {
            return Err(SfdError::Config {
                name: "fit.max_iterations",
                value: "0".into(),
                reason: "the solver needs at least one iteration".into(),
            });
        }
        Ok(())
    }
}
