//! Region classification: exclusion by area, palette labels, region names.
//!
//! Labels are ranked by distinct truncated area: the smallest distinct
//! `trunc(area)` below the exclusion threshold gets `palette[0]`, the next
//! `palette[1]`, and so on. Regions of equal truncated area share a label.
//! Names follow dataset order over valid regions only; they are an explicit
//! ordered list so plot file names never depend on incidental iteration.

use std::collections::HashMap;

use crate::dataset::Feature;
use crate::error::{Result, SfdError};

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRegion {
    /// Position of the region in its dataset.
    pub index: usize,
    pub name: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    /// Valid regions in dataset order.
    pub valid: Vec<ClassifiedRegion>,
    /// Dataset positions of excluded regions.
    pub excluded: Vec<usize>,
}

pub struct RegionClassifier<'a> {
    pub exclusion_area: f64,
    pub palette: &'a [String],
    pub region_names: Option<&'a [String]>,
}

impl RegionClassifier<'_> {
    pub fn is_excluded(&self, area: f64) -> bool {
        area >= self.exclusion_area
    }

    pub fn classify(&self, regions: &[Feature]) -> Result<Classification> {
        let areas: Vec<f64> = regions.iter().map(Feature::area).collect();

        let mut distinct: Vec<i64> = areas
            .iter()
            .filter(|&&a| !self.is_excluded(a))
            .map(|&a| a.trunc() as i64)
            .collect();
        distinct.sort_unstable();
        distinct.dedup();

        let palette_short = || SfdError::ClassificationConfig {
            distinct: distinct.len(),
            available: self.palette.len(),
            what: "palette entries",
        };
        if distinct.len() > self.palette.len() {
            return Err(palette_short());
        }
        let rank: HashMap<i64, usize> = distinct.iter().enumerate().map(|(r, &a)| (a, r)).collect();

        let n_valid = areas.iter().filter(|&&a| !self.is_excluded(a)).count();
        if let Some(names) = self.region_names {
            if names.len() < n_valid {
                return Err(SfdError::ClassificationConfig {
                    distinct: n_valid,
                    available: names.len(),
                    what: "region names",
                });
            }
        }

        let mut out = Classification::default();
        for (index, &area) in areas.iter().enumerate() {
            if self.is_excluded(area) {
                out.excluded.push(index);
                continue;
            }
            let label = rank
                .get(&(area.trunc() as i64))
                .and_then(|&r| self.palette.get(r))
                .ok_or_else(palette_short)?;
            let ordinal = out.valid.len();
            let name = match self.region_names {
                Some(names) => names[ordinal].clone(),
                None => (ordinal + 1).to_string(),
            };
            out.valid.push(ClassifiedRegion { index, name, label: label.clone() });
        }
        Ok(out)
    }
}
