//! R-tree over feature bounding boxes.

use geo::Rect;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use crate::dataset::Feature;

type Entry = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Bounding-box index over a feature slice, addressed by position in that slice.
/// Read-only after construction, so it can be shared across threads.
pub struct SpatialIndex {
    tree: RTree<Entry>,
}

impl SpatialIndex {
    /// Bulk-load the index. Features without a bounding box (empty geometry)
    /// are left out; they cannot overlap anything.
    pub fn build(features: &[Feature]) -> Self {
        let entries: Vec<Entry> = features
            .iter()
            .enumerate()
            .filter_map(|(i, f)| {
                f.bounding_box().map(|r| {
                    GeomWithData::new(
                        Rectangle::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y]),
                        i,
                    )
                })
            })
            .collect();
        Self { tree: RTree::bulk_load(entries) }
    }

    /// Indices of every feature whose bounding box intersects `bbox`, ascending.
    pub fn query(&self, bbox: &Rect<f64>) -> Vec<usize> {
        let envelope = AABB::from_corners([bbox.min().x, bbox.min().y], [bbox.max().x, bbox.max().y]);
        let mut ids: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|e| e.data)
            .collect();
        ids.sort_unstable();
        ids
    }
}
