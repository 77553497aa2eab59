//! Boulder size-frequency distributions over camembert sector regions.
//!
//! For each sector polygon the pipeline collects the boulder polygons that
//! intersect it, converts their areas to equivalent circular diameters,
//! builds log-binned differential (FD) and cumulative (CSFD) distributions,
//! fits a power law y = a·xᵇ to each, and writes density plus fit
//! parameters back onto the sector.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod dataset;
pub mod diameter;
pub mod distribution;
pub mod error;
pub mod fit;
pub mod index;
pub mod overlap;
pub mod pipeline;
pub mod plot;
pub mod sink;

pub use aggregate::RegionRecord;
pub use config::{FitConfig, PipelineConfig};
pub use dataset::{Dataset, Feature};
pub use error::{Result, SfdError};
pub use fit::FitResult;
pub use pipeline::{Pipeline, RegionOutcome, RunReport, RunSummary};
pub use plot::{PlotRequest, PlotSeries, Visualizer};
pub use sink::{GeoJsonSink, MemorySink, ResultSink, Schema};
