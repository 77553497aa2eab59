//! Error types for the size-frequency pipeline.

use thiserror::Error;

/// Every failure the pipeline can report.
///
/// Variants split into two groups: region-local failures (`EmptyOverlap`,
/// `DegenerateRange`, `DegenerateRegion`, `FitConvergence`) skip one region and let the run
/// continue, everything else aborts the run. See [`SfdError::is_region_local`].
#[derive(Error, Debug)]
pub enum SfdError {
    #[error("invalid dataset {source_name}: {reason}")]
    InvalidDataset { source_name: String, reason: String },

    #[error("region has no overlapping features")]
    EmptyOverlap,

    #[error("degenerate diameter range [{min}, {max}]: log bins need 0 < min < max")]
    DegenerateRange { min: f64, max: f64 },

    #[error("region area {area} cannot normalise a density")]
    DegenerateRegion { area: f64 },

    #[error("power-law fit did not converge: {0}")]
    FitConvergence(String),

    #[error("classification: {distinct} distinct valid areas but only {available} {what}")]
    ClassificationConfig {
        distinct: usize,
        available: usize,
        what: &'static str,
    },

    #[error("invalid config: {name} = {value} ({reason})")]
    Config {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("schema conflict on field {field}: dataset has {existing}, pipeline writes {wanted}")]
    Schema {
        field: String,
        existing: String,
        wanted: String,
    },

    #[error("result sink: {0}")]
    Sink(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SfdError {
    /// True for failures that only invalidate the region being processed.
    pub fn is_region_local(&self) -> bool {
        matches!(
            self,
            SfdError::EmptyOverlap
                | SfdError::DegenerateRange { .. }
                | SfdError::DegenerateRegion { .. }
                | SfdError::FitConvergence(_)
        )
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, SfdError>;
