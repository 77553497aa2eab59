use serde::{Deserialize, Serialize};

use crate::fit::FitResult;

/// The five attributes written back for one processed region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    /// Overlaps per `density_scale` area units. Kept as float here; the sink
    /// decides the storage type.
    pub density: f64,
    /// CSFD power-law coefficient.
    #[serde(rename = "aval")]
    pub a: f64,
    /// CSFD power-law exponent.
    pub bval: f64,
    #[serde(rename = "aval_FD")]
    pub aval_fd: f64,
    #[serde(rename = "bval_FD")]
    pub bval_fd: f64,
}

/// Compose the record for one region. Pure.
pub fn aggregate(
    region_area: f64,
    overlap_count: usize,
    density_scale: f64,
    csfd: FitResult,
    fd: FitResult,
) -> RegionRecord {
    RegionRecord {
        density: overlap_count as f64 / region_area * density_scale,
        a: csfd.a,
        bval: csfd.b,
        aval_fd: fd.a,
        bval_fd: fd.b,
    }
}
