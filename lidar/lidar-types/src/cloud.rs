//! Point cloud container.
//!
//! A [`PointCloud`] is an ordered sequence of 3D points. The registration
//! algorithms only depend on the multiset of points, but the order is kept
//! stable through every operation so that filtered or transformed clouds can
//! be compared index-by-index in reproducibility tests.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An ordered collection of 3D points in meters.
///
/// # Example
///
/// ```
/// use lidar_types::PointCloud;
///
/// let cloud = PointCloud::from_tuples([(1.0, 0.0, 0.0), (0.0, 2.0, 0.0)]);
///
/// assert_eq!(cloud.len(), 2);
/// let c = cloud.centroid().unwrap();
/// assert!((c.x - 0.5).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointCloud {
    /// Points in insertion order.
    pub points: Vec<Point3<f64>>,
}

impl PointCloud {
    /// Creates an empty cloud.
    #[must_use]
    pub const fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Creates an empty cloud with room for `capacity` points.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Wraps an existing vector of points.
    #[must_use]
    pub const fn from_points(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }

    /// Builds a cloud from raw `(x, y, z)` tuples, the form delivered by
    /// sensor drivers.
    #[must_use]
    pub fn from_tuples<I>(tuples: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64, f64)>,
    {
        tuples
            .into_iter()
            .map(|(x, y, z)| Point3::new(x, y, z))
            .collect()
    }

    /// Builds a cloud from `[x, y, z]` arrays.
    #[must_use]
    pub fn from_positions<I>(positions: I) -> Self
    where
        I: IntoIterator<Item = [f64; 3]>,
    {
        positions.into_iter().map(Point3::from).collect()
    }

    /// Returns the number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the cloud holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Appends a point.
    pub fn push(&mut self, point: Point3<f64>) {
        self.points.push(point);
    }

    /// Iterates over the points in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Point3<f64>> {
        self.points.iter()
    }

    /// Returns the points as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Returns the mean of all points, or `None` for an empty cloud.
    #[must_use]
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.points.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.points.len() as f64;
        let sum: Vector3<f64> = self.points.iter().map(|p| p.coords).sum();
        Some(Point3::from(sum / n))
    }

    /// Returns `true` if every coordinate is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.points
            .iter()
            .all(|p| p.coords.iter().all(|v| v.is_finite()))
    }
}

impl From<Vec<Point3<f64>>> for PointCloud {
    fn from(points: Vec<Point3<f64>>) -> Self {
        Self::from_points(points)
    }
}

impl FromIterator<Point3<f64>> for PointCloud {
    fn from_iter<T: IntoIterator<Item = Point3<f64>>>(iter: T) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PointCloud {
    type Item = &'a Point3<f64>;
    type IntoIter = std::slice::Iter<'a, Point3<f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl IntoIterator for PointCloud {
    type Item = Point3<f64>;
    type IntoIter = std::vec::IntoIter<Point3<f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_cloud() {
        let cloud = PointCloud::new();
        assert!(cloud.is_empty());
        assert_eq!(cloud.len(), 0);
        assert!(cloud.centroid().is_none());
        assert!(cloud.is_finite());
    }

    #[test]
    fn from_tuples_preserves_order() {
        let cloud = PointCloud::from_tuples([(1.0, 2.0, 3.0), (4.0, 5.0, 6.0), (7.0, 8.0, 9.0)]);
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.points[0], Point3::new(1.0, 2.0, 3.0));
        assert_eq!(cloud.points[2], Point3::new(7.0, 8.0, 9.0));
    }

    #[test]
    fn from_positions_matches_tuples() {
        let a = PointCloud::from_positions([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let b = PointCloud::from_tuples([(1.0, 0.0, 0.0), (0.0, 1.0, 0.0)]);
        assert_eq!(a, b);
    }

    #[test]
    fn centroid_of_square() {
        let cloud = PointCloud::from_tuples([
            (0.0, 0.0, 0.0),
            (2.0, 0.0, 0.0),
            (2.0, 2.0, 0.0),
            (0.0, 2.0, 0.0),
        ]);
        let c = cloud.centroid().unwrap();
        assert_relative_eq!(c.coords, Vector3::new(1.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn detects_non_finite() {
        let mut cloud = PointCloud::from_tuples([(1.0, 1.0, 1.0)]);
        assert!(cloud.is_finite());
        cloud.push(Point3::new(f64::NAN, 0.0, 0.0));
        assert!(!cloud.is_finite());
    }

    #[test]
    fn iterates_by_reference() {
        let cloud = PointCloud::from_tuples([(1.0, 0.0, 0.0), (2.0, 0.0, 0.0)]);
        let xs: Vec<f64> = (&cloud).into_iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![1.0, 2.0]);
    }
}
