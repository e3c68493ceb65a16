//! Range filtering for raw point clouds.
//!
//! Points very close to the sensor origin are almost always returns from the
//! vehicle body or the sensor housing, and non-finite points are driver
//! artifacts. Both are dropped before registration.
//!
//! [`filter_cloud`] is the sequential reference implementation and
//! [`filter_cloud_parallel`] the rayon path used on large clouds. The two are
//! interchangeable: each point is judged independently and the output keeps
//! input order.

use lidar_types::{Point3, PointCloud};
use rayon::prelude::*;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default minimum distance from the sensor origin, in meters.
pub const DEFAULT_MIN_DISTANCE: f64 = 0.1;

/// Parameters for range filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FilterParams {
    /// Points whose Euclidean norm is at or below this value are removed
    /// (default: 0.1).
    pub min_distance: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            min_distance: DEFAULT_MIN_DISTANCE,
        }
    }
}

impl FilterParams {
    /// Creates filter parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum distance from the origin. Negative values are clamped to 0.
    #[must_use]
    pub fn with_min_distance(mut self, min_distance: f64) -> Self {
        self.min_distance = min_distance.max(0.0);
        self
    }
}

#[inline]
fn keep(point: &Point3<f64>, min_distance: f64) -> bool {
    point.coords.iter().all(|v| v.is_finite()) && point.coords.norm() > min_distance
}

/// Removes near-origin and non-finite points, sequentially.
///
/// An empty input yields an empty output.
///
/// # Example
///
/// ```
/// use lidar_registration::{filter_cloud, FilterParams};
/// use lidar_types::PointCloud;
///
/// let cloud = PointCloud::from_tuples([(0.0, 0.0, 0.05), (3.0, 0.0, 0.0)]);
/// let kept = filter_cloud(&cloud, &FilterParams::default());
///
/// assert_eq!(kept.len(), 1);
/// ```
#[must_use]
pub fn filter_cloud(cloud: &PointCloud, params: &FilterParams) -> PointCloud {
    let kept: PointCloud = cloud
        .iter()
        .filter(|p| keep(p, params.min_distance))
        .copied()
        .collect();
    debug!(
        input = cloud.len(),
        kept = kept.len(),
        min_distance = params.min_distance,
        "Filtered point cloud"
    );
    kept
}

/// Removes near-origin and non-finite points using the rayon thread pool.
///
/// Produces exactly the same cloud as [`filter_cloud`], in the same order.
#[must_use]
pub fn filter_cloud_parallel(cloud: &PointCloud, params: &FilterParams) -> PointCloud {
    let points: Vec<Point3<f64>> = cloud
        .points
        .par_iter()
        .filter(|p| keep(p, params.min_distance))
        .copied()
        .collect();
    debug!(
        input = cloud.len(),
        kept = points.len(),
        min_distance = params.min_distance,
        "Filtered point cloud (parallel)"
    );
    PointCloud::from_points(points)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cloud() {
        let cloud = PointCloud::new();
        assert!(filter_cloud(&cloud, &FilterParams::default()).is_empty());
        assert!(filter_cloud_parallel(&cloud, &FilterParams::default()).is_empty());
    }

    #[test]
    fn test_removes_near_origin() {
        let cloud = PointCloud::from_tuples([
            (0.0, 0.0, 0.0),
            (0.05, 0.05, 0.0),
            (1.0, 0.0, 0.0),
            (0.0, -2.0, 0.0),
        ]);
        let kept = filter_cloud(&cloud, &FilterParams::default());
        assert_eq!(kept.len(), 2);
        assert_eq!(kept.points[0], Point3::new(1.0, 0.0, 0.0));
        assert_eq!(kept.points[1], Point3::new(0.0, -2.0, 0.0));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let cloud = PointCloud::from_tuples([(0.5, 0.0, 0.0)]);
        let params = FilterParams::new().with_min_distance(0.5);
        assert!(filter_cloud(&cloud, &params).is_empty());
    }

    #[test]
    fn test_removes_non_finite() {
        let cloud = PointCloud::from_tuples([
            (f64::NAN, 1.0, 1.0),
            (f64::INFINITY, 0.0, 0.0),
            (5.0, 5.0, 5.0),
        ]);
        let kept = filter_cloud(&cloud, &FilterParams::default());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.points[0], Point3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn test_negative_threshold_clamped() {
        let params = FilterParams::new().with_min_distance(-1.0);
        assert_eq!(params.min_distance, 0.0);
        let cloud = PointCloud::from_tuples([(0.0, 0.0, 0.0), (0.0, 0.0, 0.01)]);
        assert_eq!(filter_cloud(&cloud, &params).len(), 1);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let cloud: PointCloud = (0..2_000)
            .map(|i| {
                let t = f64::from(i) * 0.01;
                Point3::new(t.sin() * 0.2, t.cos() * 0.2, t - 10.0)
            })
            .collect();
        let params = FilterParams::new().with_min_distance(0.5);
        assert_eq!(
            filter_cloud(&cloud, &params),
            filter_cloud_parallel(&cloud, &params)
        );
    }
}
