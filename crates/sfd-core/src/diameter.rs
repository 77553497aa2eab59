use std::f64::consts::PI;

use crate::dataset::Feature;
use crate::error::{Result, SfdError};

/// Diameter of the circle with the given area: 2·√(area/π).
#[inline]
pub fn equivalent_diameter(area: f64) -> f64 {
    2.0 * (area / PI).sqrt()
}

/// Equivalent-circle diameters of an overlap set, in input order.
///
/// Zero-area features give diameter 0 and are kept; the distribution builder
/// decides what to do with them. An empty set is `EmptyOverlap`.
pub fn diameters_for(overlaps: &[&Feature]) -> Result<Vec<f64>> {
    if overlaps.is_empty() {
        return Err(SfdError::EmptyOverlap);
    }
    Ok(overlaps.iter().map(|f| equivalent_diameter(f.area())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::polygon;

    #[test]
    fn area_pi_gives_diameter_two() {
        assert_relative_eq!(equivalent_diameter(PI), 2.0);
        assert_relative_eq!(equivalent_diameter(0.0), 0.0);
        assert_relative_eq!(equivalent_diameter(4.0 * PI), 4.0);
    }

    #[test]
    fn zero_area_feature_is_retained() {
        let sliver = Feature::from_polygon("sliver", polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0)]);
        let square = Feature::from_polygon(
            "sq",
            polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)],
        );
        let d = diameters_for(&[&sliver, &square]).unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(d[0], 0.0);
        assert_relative_eq!(d[1], equivalent_diameter(4.0));
    }

    #[test]
    fn empty_overlap_is_an_error() {
        assert!(matches!(diameters_for(&[]), Err(SfdError::EmptyOverlap)));
    }
}
