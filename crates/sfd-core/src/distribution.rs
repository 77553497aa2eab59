//! Log-binned differential (FD) and cumulative (CSFD) size-frequency distributions.
//!
//! Both paths share one set of log-spaced edges spanning [min, max] of the
//! region's diameters:
//!
//!   edge[i] = 10^(log10(min) + i · (log10(max) − log10(min)) / (n − 1))
//!
//! FD histograms the diameters into the n − 1 intervals (numpy convention:
//! half-open except the last, which includes `max`) and pairs each count with
//! the interval's left edge. CSFD counts diameters strictly greater than each
//! edge and drops edges where that count is zero, so the last edge never
//! survives.

use crate::error::{Result, SfdError};

#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub log_bins: Vec<f64>,
    /// Raw FD histogram, one count per interval (`log_bins.len() − 1`).
    pub histogram: Vec<u64>,
    /// Left edges of retained FD intervals.
    pub fd_bins: Vec<f64>,
    pub fd_counts: Vec<u64>,
    /// Edges with a non-zero exceedance count.
    pub csfd_bins: Vec<f64>,
    pub csfd_counts: Vec<u64>,
}

/// `num_bins` log-spaced edges from `min` to `max` inclusive.
///
/// The end edges are pinned to `min` and `max` exactly so the extremes are
/// always counted despite rounding in the power.
pub fn log_bins(min: f64, max: f64, num_bins: usize) -> Result<Vec<f64>> {
    let degenerate = || SfdError::DegenerateRange { min, max };
    if !(min.is_finite() && max.is_finite()) || min <= 0.0 || max <= 0.0 || min >= max || num_bins < 2 {
        return Err(degenerate());
    }
    let lo = min.log10();
    let step = (max.log10() - lo) / (num_bins - 1) as f64;
    let mut edges: Vec<f64> = (0..num_bins).map(|i| 10f64.powf(lo + i as f64 * step)).collect();
    edges[0] = min;
    edges[num_bins - 1] = max;
    if edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(degenerate());
    }
    Ok(edges)
}

/// Count `values` into the intervals defined by `edges`.
///
/// Intervals are `[e_i, e_{i+1})` except the last, `[e_{n-2}, e_{n-1}]`.
/// Values outside `[e_0, e_{n-1}]` are ignored.
pub fn histogram(values: &[f64], edges: &[f64]) -> Vec<u64> {
    let n = edges.len().saturating_sub(1);
    let mut counts = vec![0u64; n];
    if n == 0 {
        return counts;
    }
    let first = edges[0];
    let last = edges[n];
    for &v in values {
        if !(v >= first && v <= last) {
            continue;
        }
        let bin = if v == last { n - 1 } else { edges.partition_point(|&e| e <= v) - 1 };
        counts[bin] += 1;
    }
    counts
}

/// Number of `sorted` values strictly greater than each edge.
fn exceedance_counts(sorted: &[f64], edges: &[f64]) -> Vec<u64> {
    edges
        .iter()
        .map(|&e| (sorted.len() - sorted.partition_point(|&d| d <= e)) as u64)
        .collect()
}

/// Build both distributions for one region's diameters.
///
/// FD intervals whose count equals `fd_drop_count` are left out of the
/// regression input; every other interval, empty or not, is kept.
pub fn build(diameters: &[f64], num_bins: usize, fd_drop_count: u64) -> Result<Distribution> {
    let mut sorted = diameters.to_vec();
    sorted.sort_by(f64::total_cmp);
    let (min, max) = match (sorted.first(), sorted.last()) {
        (Some(&lo), Some(&hi)) => (lo, hi),
        _ => return Err(SfdError::EmptyOverlap),
    };

    let log_bins = log_bins(min, max, num_bins)?;
    let histogram = histogram(diameters, &log_bins);

    let (fd_bins, fd_counts): (Vec<f64>, Vec<u64>) = log_bins
        .iter()
        .zip(histogram.iter())
        .filter(|(_, &c)| c != fd_drop_count)
        .map(|(&e, &c)| (e, c))
        .unzip();

    let (csfd_bins, csfd_counts): (Vec<f64>, Vec<u64>) = log_bins
        .iter()
        .zip(exceedance_counts(&sorted, &log_bins))
        .filter(|&(_, c)| c > 0)
        .map(|(&e, c)| (e, c))
        .unzip();

    Ok(Distribution { log_bins, histogram, fd_bins, fd_counts, csfd_bins, csfd_counts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spread(n: usize) -> Vec<f64> {
        // Deterministic diameters between 1 and ~50 with repeats.
        (0..n).map(|i| 1.0 + ((i * 37) % 97) as f64 * 0.5).collect()
    }

    #[test]
    fn edges_are_log_spaced_and_pinned() {
        let e = log_bins(1.0, 100.0, 100).unwrap();
        assert_eq!(e.len(), 100);
        assert_eq!(e[0], 1.0);
        assert_eq!(e[99], 100.0);
        let ratio = e[1] / e[0];
        for w in e.windows(2) {
            assert_relative_eq!(w[1] / w[0], ratio, max_relative = 1e-9);
        }
        assert_relative_eq!(e[33], 10f64.powf(2.0 * 33.0 / 99.0), max_relative = 1e-12);
    }

    #[test]
    fn equal_extremes_are_degenerate() {
        assert!(matches!(build(&[2.0, 2.0], 100, 0), Err(SfdError::DegenerateRange { .. })));
    }

    #[test]
    fn zero_diameter_is_degenerate() {
        assert!(matches!(build(&[0.0, 2.0, 3.0], 100, 0), Err(SfdError::DegenerateRange { .. })));
    }

    #[test]
    fn empty_input_is_empty_overlap() {
        assert!(matches!(build(&[], 100, 0), Err(SfdError::EmptyOverlap)));
    }

    #[test]
    fn histogram_counts_every_sample_once() {
        let d = spread(300);
        let dist = build(&d, 100, u64::MAX).unwrap();
        assert_eq!(dist.histogram.len(), 99);
        assert_eq!(dist.histogram.iter().sum::<u64>(), 300);
        // Nothing equals u64::MAX, so every interval is retained.
        assert_eq!(dist.fd_bins.len(), 99);
        assert_eq!(dist.fd_bins[..], dist.log_bins[..99]);
    }

    #[test]
    fn histogram_last_interval_is_closed() {
        let edges = [1.0, 2.0, 4.0];
        assert_eq!(histogram(&[1.0, 2.0, 3.9, 4.0, 4.1, 0.5], &edges), vec![1, 3]);
    }

    #[test]
    fn fd_drops_only_the_configured_count() {
        let d = [1.0, 1.5, 10.0];
        let drop_empty = build(&d, 10, 0).unwrap();
        assert!(drop_empty.fd_counts.iter().all(|&c| c > 0));
        assert_eq!(drop_empty.fd_counts.iter().sum::<u64>(), 3);

        let legacy = build(&d, 10, 10_000).unwrap();
        assert_eq!(legacy.fd_counts.len(), 9);
        assert!(legacy.fd_counts.contains(&0));
    }

    #[test]
    fn csfd_is_non_increasing_without_zeros() {
        let d = spread(500);
        let dist = build(&d, 100, 0).unwrap();
        assert!(!dist.csfd_counts.is_empty());
        assert!(dist.csfd_counts.iter().all(|&c| c > 0));
        for w in dist.csfd_counts.windows(2) {
            assert!(w[0] >= w[1]);
        }
        for w in dist.csfd_bins.windows(2) {
            assert!(w[0] < w[1]);
        }
        // Nothing exceeds the maximum, so the last edge is always dropped.
        assert!(*dist.csfd_bins.last().unwrap() < *dist.log_bins.last().unwrap());
        assert_eq!(dist.csfd_bins.len(), dist.csfd_counts.len());
    }

    #[test]
    fn csfd_counts_strictly_greater() {
        let dist = build(&[1.0, 1.5, 2.5, 4.0], 3, 0).unwrap();
        // Edges 1, 2, 4: >1 → 3, >2 → 2, >4 → 0 (dropped).
        assert_eq!(dist.csfd_bins.len(), 2);
        assert_relative_eq!(dist.csfd_bins[1], 2.0, max_relative = 1e-12);
        assert_eq!(dist.csfd_counts, vec![3, 2]);
    }

    #[test]
    fn two_diameters_give_flat_csfd() {
        let dist = build(&[1.0, 3.0], 100, 0).unwrap();
        // Every edge below 3 is exceeded by the single diameter 3 only.
        assert_eq!(dist.csfd_counts.len(), 99);
        assert!(dist.csfd_counts.iter().all(|&c| c == 1));
    }
}
