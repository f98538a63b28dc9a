use crate::distance::haversine_m;
use crate::models::{GeoPoint, Route};

/// Prefix sums of great-circle segment lengths along a route.
///
/// `at(i)` is the path length from the first point to point `i`; the first
/// entry is always zero and entries never decrease.
#[derive(Debug, Clone, PartialEq)]
pub struct CumulativeDistances {
    values: Vec<f64>,
}

impl CumulativeDistances {
    pub fn build(route: &Route) -> Self {
        Self::from_points(route.points())
    }

    pub fn from_points(points: &[GeoPoint]) -> Self {
        let mut values = Vec::with_capacity(points.len());
        if points.is_empty() {
            return Self { values };
        }
        values.push(0.0);
        for pair in points.windows(2) {
            let previous = values[values.len() - 1];
            values.push(previous + haversine_m(pair[0], pair[1]));
        }
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn total(&self) -> f64 {
        self.values.last().copied().unwrap_or(0.0)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Index of the last route point reached after traveling `distance_m`.
    pub fn index_at(&self, distance_m: f64) -> usize {
        self.values
            .partition_point(|&d| d <= distance_m)
            .saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(45.0, 5.0),
            GeoPoint::new(45.001, 5.0),
            GeoPoint::new(45.001, 5.0),
            GeoPoint::new(45.002, 5.0),
        ]
    }

    #[test]
    fn test_starts_at_zero_and_matches_length() {
        let cumulative = CumulativeDistances::from_points(&line());
        assert_eq!(cumulative.len(), 4);
        assert_eq!(cumulative.at(0), Some(0.0));
        assert_eq!(cumulative.at(1), cumulative.at(2));
        assert!((cumulative.total() - 222.39).abs() < 0.1);
    }

    #[test]
    fn test_empty_points() {
        let cumulative = CumulativeDistances::from_points(&[]);
        assert!(cumulative.is_empty());
        assert_eq!(cumulative.total(), 0.0);
    }

    #[test]
    fn test_index_at() {
        let cumulative = CumulativeDistances::from_points(&line());
        assert_eq!(cumulative.index_at(0.0), 0);
        assert_eq!(cumulative.index_at(50.0), 0);
        // duplicated point: both share the same offset, the later one wins
        assert_eq!(cumulative.index_at(111.2), 2);
        assert_eq!(cumulative.index_at(10_000.0), 3);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn valid_point() -> impl Strategy<Value = GeoPoint> {
            (-90.0..=90.0, -180.0..=180.0).prop_map(|(lat, lon)| GeoPoint::new(lat, lon))
        }

        proptest! {
            #[test]
            fn prop_cumulative_is_monotonic(points in prop::collection::vec(valid_point(), 1..50)) {
                let route = Route::new(points.clone()).expect("non-empty");
                let cumulative = CumulativeDistances::build(&route);
                prop_assert_eq!(cumulative.len(), points.len());
                prop_assert_eq!(cumulative.at(0), Some(0.0));
                for pair in cumulative.as_slice().windows(2) {
                    prop_assert!(pair[1] >= pair[0]);
                }
            }

            #[test]
            fn prop_total_matches_path_length(points in prop::collection::vec(valid_point(), 1..20)) {
                let cumulative = CumulativeDistances::from_points(&points);
                let expected = crate::distance::path_length_m(&points);
                prop_assert!((cumulative.total() - expected).abs() < 1e-3);
            }
        }
    }
}
