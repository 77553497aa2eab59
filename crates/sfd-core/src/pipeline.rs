//! Per-region orchestration: classify, overlap, diameters, distributions,
//! fits, record, sink.
//!
//! Region computations share nothing mutable. Each returns its own
//! [`RegionAnalysis`]; the run collects them in dataset order and performs
//! the sink writes serially, one whole record per region. With the
//! `threading` feature the per-region computations run on rayon's pool; the
//! order of outcomes and writes is unchanged.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, RegionRecord};
use crate::classify::{Classification, ClassifiedRegion, RegionClassifier};
use crate::config::PipelineConfig;
use crate::dataset::{Dataset, Feature};
use crate::diameter::diameters_for;
use crate::distribution::{self, Distribution};
use crate::error::{Result, SfdError};
use crate::fit::{FitResult, PowerLawFitter};
use crate::overlap::OverlapEngine;
use crate::plot::PlotSeries;
use crate::sink::{ResultSink, Schema};

#[cfg(feature = "threading")]
use rayon::prelude::*;

// ── Per-region results ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RegionAnalysis {
    pub region: ClassifiedRegion,
    pub region_id: String,
    pub area: f64,
    pub overlap_count: usize,
    pub diameters: Vec<f64>,
    pub distribution: Distribution,
    pub csfd_fit: FitResult,
    pub fd_fit: FitResult,
    pub record: RegionRecord,
}

impl RegionAnalysis {
    /// Fitted curves for plotting: CSFD over its retained edges, FD over every edge.
    pub fn plot_series(&self) -> PlotSeries {
        let d = &self.distribution;
        PlotSeries {
            name: self.region.name.clone(),
            label: self.region.label.clone(),
            csfd_x: d.csfd_bins.clone(),
            csfd_y: self.csfd_fit.curve(&d.csfd_bins),
            csfd_b: self.csfd_fit.b,
            fd_x: d.log_bins.clone(),
            fd_y: self.fd_fit.curve(&d.log_bins),
            fd_b: self.fd_fit.b,
        }
    }
}

#[derive(Debug)]
pub enum RegionOutcome {
    Processed(Box<RegionAnalysis>),
    Excluded { index: usize, region_id: String, area: f64 },
    Failed { region: ClassifiedRegion, region_id: String, error: SfdError },
}

#[derive(Debug, Default)]
pub struct RunReport {
    /// One outcome per region, in dataset order.
    pub outcomes: Vec<RegionOutcome>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounts {
    pub processed: usize,
    pub excluded: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize)]
pub struct RegionSummary {
    pub id: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlap_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<RegionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub counts: RunCounts,
    pub regions: Vec<RegionSummary>,
}

impl RunReport {
    pub fn counts(&self) -> RunCounts {
        let mut c = RunCounts::default();
        for o in &self.outcomes {
            match o {
                RegionOutcome::Processed(_) => c.processed += 1,
                RegionOutcome::Excluded { .. } => c.excluded += 1,
                RegionOutcome::Failed { .. } => c.failed += 1,
            }
        }
        c
    }

    pub fn processed(&self) -> impl Iterator<Item = &RegionAnalysis> {
        self.outcomes.iter().filter_map(|o| match o {
            RegionOutcome::Processed(a) => Some(a.as_ref()),
            _ => None,
        })
    }

    pub fn summary(&self) -> RunSummary {
        let regions = self
            .outcomes
            .iter()
            .map(|o| match o {
                RegionOutcome::Processed(a) => RegionSummary {
                    id: a.region_id.clone(),
                    status: "processed",
                    name: Some(a.region.name.clone()),
                    label: Some(a.region.label.clone()),
                    overlap_count: Some(a.overlap_count),
                    record: Some(a.record),
                    error: None,
                },
                RegionOutcome::Excluded { region_id, .. } => RegionSummary {
                    id: region_id.clone(),
                    status: "excluded",
                    name: None,
                    label: None,
                    overlap_count: None,
                    record: None,
                    error: None,
                },
                RegionOutcome::Failed { region, region_id, error } => RegionSummary {
                    id: region_id.clone(),
                    status: "failed",
                    name: Some(region.name.clone()),
                    label: Some(region.label.clone()),
                    overlap_count: None,
                    record: None,
                    error: Some(error.to_string()),
                },
            })
            .collect();
        RunSummary { counts: self.counts(), regions }
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn classify(&self, regions: &[Feature]) -> Result<Classification> {
        RegionClassifier {
            exclusion_area: self.config.exclusion_area,
            palette: &self.config.palette,
            region_names: self.config.region_names.as_deref(),
        }
        .classify(regions)
    }

    /// Everything for one valid region short of writing it.
    pub fn analyze_region(
        &self,
        engine: &OverlapEngine<'_>,
        region: &Feature,
        classified: &ClassifiedRegion,
    ) -> Result<RegionAnalysis> {
        let area = region.area();
        if !(area.is_finite() && area > 0.0) {
            return Err(SfdError::DegenerateRegion { area });
        }
        let overlaps = engine.overlapping(region);
        let diameters = diameters_for(&overlaps)?;
        let dist = distribution::build(&diameters, self.config.num_bins, self.config.fd_drop_count)?;
        debug!(
            region = %region.id,
            diameters = diameters.len(),
            fd_points = dist.fd_bins.len(),
            csfd_points = dist.csfd_bins.len(),
            "distributions built"
        );

        let fitter = PowerLawFitter { config: &self.config.fit };
        let csfd_y: Vec<f64> = dist.csfd_counts.iter().map(|&c| c as f64).collect();
        let fd_y: Vec<f64> = dist.fd_counts.iter().map(|&c| c as f64).collect();

        let csfd_fit = fitter.fit_guarded(&dist.csfd_bins, &csfd_y)?;
        let fd_fit = if self.config.guard_fd {
            fitter.fit_guarded(&dist.fd_bins, &fd_y)?
        } else {
            fitter.fit(&dist.fd_bins, &fd_y)?
        };

        let record = aggregate(area, overlaps.len(), self.config.density_scale, csfd_fit, fd_fit);
        Ok(RegionAnalysis {
            region: classified.clone(),
            region_id: region.id.clone(),
            area,
            overlap_count: overlaps.len(),
            diameters,
            distribution: dist,
            csfd_fit,
            fd_fit,
            record,
        })
    }

    /// Process every region of `regions` against `features`, writing each
    /// processed region's record to `sink`.
    ///
    /// Region-local failures are logged and reported; configuration and sink
    /// failures abort the run.
    pub fn run(&self, regions: &Dataset, features: &Dataset, sink: &mut dyn ResultSink) -> Result<RunReport> {
        sink.ensure_fields(&Schema::region_record())?;
        let classification = self.classify(regions.features())?;
        let engine = OverlapEngine::new(features.features());

        let analyze = |c: &ClassifiedRegion| self.analyze_region(&engine, &regions.features[c.index], c);
        #[cfg(feature = "threading")]
        let results: Vec<Result<RegionAnalysis>> = classification.valid.par_iter().map(analyze).collect();
        #[cfg(not(feature = "threading"))]
        let results: Vec<Result<RegionAnalysis>> = classification.valid.iter().map(analyze).collect();

        let mut valid = classification.valid.into_iter().zip(results).peekable();
        let mut report = RunReport::default();
        for (index, region) in regions.features.iter().enumerate() {
            let is_next_valid = valid.peek().is_some_and(|(c, _)| c.index == index);
            if !is_next_valid {
                report.outcomes.push(RegionOutcome::Excluded {
                    index,
                    region_id: region.id.clone(),
                    area: region.area(),
                });
                continue;
            }
            let Some((classified, result)) = valid.next() else { break };
            match result {
                Ok(analysis) => {
                    sink.write_record(index, &analysis.region_id, &analysis.record)?;
                    report.outcomes.push(RegionOutcome::Processed(Box::new(analysis)));
                }
                Err(error) if error.is_region_local() => {
                    warn!(region = %region.id, name = %classified.name, %error, "region skipped");
                    report.outcomes.push(RegionOutcome::Failed {
                        region: classified,
                        region_id: region.id.clone(),
                        error,
                    });
                }
                Err(error) => return Err(error),
            }
        }

        let c = report.counts();
        info!(processed = c.processed, excluded = c.excluded, failed = c.failed, "run complete");
        Ok(report)
    }
}
