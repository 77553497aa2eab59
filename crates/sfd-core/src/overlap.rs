//! Broad-phase / narrow-phase overlap search of features against one region.

use tracing::debug;

use crate::dataset::Feature;
use crate::index::SpatialIndex;

/// Features indexed once, queried per region.
pub struct OverlapEngine<'a> {
    features: &'a [Feature],
    index: SpatialIndex,
}

impl<'a> OverlapEngine<'a> {
    pub fn new(features: &'a [Feature]) -> Self {
        Self { features, index: SpatialIndex::build(features) }
    }

    /// Bounding-box candidates for `region`: a superset of the true overlaps.
    pub fn candidates(&self, region: &Feature) -> Vec<usize> {
        match region.bounding_box() {
            Some(bbox) => self.index.query(&bbox),
            None => Vec::new(),
        }
    }

    /// Features whose exact geometry intersects `region`, in dataset order.
    pub fn overlapping(&self, region: &Feature) -> Vec<&'a Feature> {
        let candidates = self.candidates(region);
        let hits: Vec<&'a Feature> = candidates
            .iter()
            .map(|&i| &self.features[i])
            .filter(|f| region.intersects(f))
            .collect();
        debug!(
            region = %region.id,
            candidates = candidates.len(),
            overlaps = hits.len(),
            "overlap search"
        );
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn triangle_region() -> Feature {
        // Right triangle with the hypotenuse from (10,0) to (0,10).
        Feature::from_polygon("sector", polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 0.0, y: 10.0)])
    }

    fn square(id: &str, x: f64, y: f64) -> Feature {
        Feature::from_polygon(
            id,
            polygon![(x: x, y: y), (x: x + 1.0, y: y), (x: x + 1.0, y: y + 1.0), (x: x, y: y + 1.0)],
        )
    }

    #[test]
    fn narrow_phase_drops_bbox_false_positives() {
        let boulders = vec![square("inside", 1.0, 1.0), square("corner", 8.5, 8.5), square("outside", 20.0, 20.0)];
        let engine = OverlapEngine::new(&boulders);
        let region = triangle_region();

        // The corner square sits inside the triangle's bbox but past its hypotenuse.
        assert_eq!(engine.candidates(&region), vec![0, 1]);
        let hits: Vec<&str> = engine.overlapping(&region).iter().map(|f| f.id.as_str()).collect();
        assert_eq!(hits, vec!["inside"]);
    }

    #[test]
    fn straddling_feature_counts() {
        let boulders = vec![square("straddle", -0.5, 2.0)];
        let engine = OverlapEngine::new(&boulders);
        assert_eq!(engine.overlapping(&triangle_region()).len(), 1);
    }
}
