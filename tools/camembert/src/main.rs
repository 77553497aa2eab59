//! Boulder SFD per camembert sector.
//! Reads sector and boulder GeoJSON, fits CSFD and FD power laws per sector,
//! writes the annotated sectors, one log-log PNG per sector, and an optional
//! JSON run summary.

mod plotter;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use sfd_core::plot::render_report;
use sfd_core::{Dataset, GeoJsonSink, Pipeline, PipelineConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use plotter::PngPlotter;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "camembert", about = "Boulder size-frequency distributions per sector region")]
struct Args {
    /// Sector polygons (GeoJSON FeatureCollection).
    #[arg(short, long)]
    regions: PathBuf,

    /// Boulder polygons (GeoJSON FeatureCollection).
    #[arg(short, long)]
    boulders: PathBuf,

    /// Annotated sector output.
    #[arg(short, long, default_value = "regions_sfd.geojson")]
    output: PathBuf,

    /// Plot files are written as <prefix><region name>.png.
    #[arg(short = 'p', long, default_value = "sector_")]
    plot_prefix: String,

    /// Skip plot rendering.
    #[arg(long)]
    no_plots: bool,

    /// Pipeline configuration JSON; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    exclusion_area: Option<f64>,

    #[arg(long)]
    num_bins: Option<usize>,

    #[arg(long)]
    density_scale: Option<f64>,

    /// FD bins holding exactly this count are dropped (10000 = legacy behaviour).
    #[arg(long)]
    fd_drop_count: Option<u64>,

    /// Fit FD even with fewer than two points (fails the region).
    #[arg(long)]
    no_fd_guard: bool,

    /// Comma-separated region names, in dataset order over valid regions.
    #[arg(long, value_delimiter = ',')]
    region_names: Option<Vec<String>>,

    #[arg(long)]
    max_iterations: Option<usize>,

    /// Write the JSON run summary here.
    #[arg(short, long)]
    summary: Option<PathBuf>,

    /// Default log filter; RUST_LOG takes precedence.
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// File (or default) config with command-line overrides applied.
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut cfg = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("cannot load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(v) = self.exclusion_area {
            cfg.exclusion_area = v;
        }
        if let Some(v) = self.num_bins {
            cfg.num_bins = v;
        }
        if let Some(v) = self.density_scale {
            cfg.density_scale = v;
        }
        if let Some(v) = self.fd_drop_count {
            cfg.fd_drop_count = v;
        }
        if self.no_fd_guard {
            cfg.guard_fd = false;
        }
        if let Some(names) = &self.region_names {
            cfg.region_names = Some(names.clone());
        }
        if let Some(v) = self.max_iterations {
            cfg.fit.max_iterations = v;
        }
        Ok(cfg)
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    }
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let pipeline = Pipeline::new(args.pipeline_config()?).context("invalid configuration")?;

    let regions = Dataset::load(&args.regions)
        .with_context(|| format!("cannot load regions {}", args.regions.display()))?;
    let boulders = Dataset::load(&args.boulders)
        .with_context(|| format!("cannot load boulders {}", args.boulders.display()))?;
    info!(regions = regions.len(), boulders = boulders.len(), "datasets loaded");

    let mut sink = GeoJsonSink::new(regions.clone());
    let report = pipeline.run(&regions, &boulders, &mut sink).context("pipeline run failed")?;

    ensure_parent(&args.output)?;
    sink.finish(&args.output)
        .with_context(|| format!("cannot write {}", args.output.display()))?;
    info!(path = %args.output.display(), records = sink.written(), "annotated regions written");

    let mut plot_failures = 0;
    if !args.no_plots {
        ensure_parent(Path::new(&format!("{}x.png", args.plot_prefix)))?;
        plot_failures = render_report(&report, &mut PngPlotter::default(), &args.plot_prefix);
    }

    let summary = report.summary();
    if let Some(path) = &args.summary {
        ensure_parent(path)?;
        let text = serde_json::to_string_pretty(&summary)?;
        fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))?;
    }

    let c = summary.counts;
    println!(
        "{} processed, {} excluded, {} failed, {} plot failure(s)",
        c.processed, c.excluded, c.failed, plot_failures
    );
    Ok(())
}
