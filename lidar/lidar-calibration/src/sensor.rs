//! Sensor identity and the shared reference frame.

use std::fmt;
use std::sync::Arc;

use lidar_registration::{CloudRole, RegistrationError, SearchMethod, TargetIndex};
use lidar_types::PointCloud;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::CalibrationResult;

/// Identifier of one LiDAR unit in the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SensorId(String);

impl SensorId {
    /// Creates a sensor id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SensorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SensorId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The reference cloud every sensor is registered against, with its
/// neighbor index built once.
///
/// Sessions hold it behind an [`Arc`] so a fleet shares one index. It is
/// never mutated after construction.
#[derive(Debug)]
pub struct ReferenceFrame {
    cloud: PointCloud,
    index: TargetIndex,
}

impl ReferenceFrame {
    /// Builds a reference frame with a KD-tree index.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::EmptyInput`] if the cloud is empty.
    pub fn new(cloud: PointCloud) -> CalibrationResult<Self> {
        Self::with_search(cloud, SearchMethod::KdTree)
    }

    /// Builds a reference frame with the given neighbor search strategy.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::EmptyInput`] if the cloud is empty.
    pub fn with_search(cloud: PointCloud, method: SearchMethod) -> CalibrationResult<Self> {
        if cloud.is_empty() {
            return Err(RegistrationError::EmptyInput {
                which: CloudRole::Target,
            }
            .into());
        }
        let index = TargetIndex::build(cloud.as_slice(), method);
        Ok(Self { cloud, index })
    }

    /// Builds a reference frame and wraps it for sharing.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::EmptyInput`] if the cloud is empty.
    pub fn shared(cloud: PointCloud) -> CalibrationResult<Arc<Self>> {
        Self::new(cloud).map(Arc::new)
    }

    /// The reference cloud.
    #[must_use]
    pub const fn cloud(&self) -> &PointCloud {
        &self.cloud
    }

    /// The prebuilt neighbor index.
    #[must_use]
    pub const fn index(&self) -> &TargetIndex {
        &self.index
    }

    /// Number of reference points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cloud.len()
    }

    /// Always `false`; an empty reference frame cannot be built.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cloud.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::CalibrationError;

    #[test]
    fn test_sensor_id_display() {
        let id = SensorId::new("lidar_rear");
        assert_eq!(id.to_string(), "lidar_rear");
        assert_eq!(id.as_str(), "lidar_rear");
        assert_eq!(SensorId::from("lidar_rear"), id);
    }

    #[test]
    fn test_empty_reference_rejected() {
        let err = ReferenceFrame::new(PointCloud::new()).unwrap_err();
        assert_eq!(
            err,
            CalibrationError::Registration(RegistrationError::EmptyInput {
                which: CloudRole::Target
            })
        );
    }

    #[test]
    fn test_reference_builds_index() {
        let cloud = PointCloud::from_tuples([(1.0, 0.0, 0.0), (0.0, 1.0, 0.0), (0.0, 0.0, 1.0)]);
        let frame = ReferenceFrame::with_search(cloud, SearchMethod::BruteForce).unwrap();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.index().len(), 3);
        assert_eq!(frame.index().method(), SearchMethod::BruteForce);
    }

    #[test]
    fn test_reference_from_flat_ground_with_repeated_returns() {
        use lidar_registration::NeighborSearch;
        use lidar_types::Point3;

        let mut cloud: PointCloud = (0..400)
            .map(|i| Point3::new(f64::from(i % 20), f64::from(i / 20), -1.5))
            .collect();
        for _ in 0..40 {
            cloud.push(Point3::new(4.0, 4.0, -1.5));
        }

        let frame = ReferenceFrame::new(cloud).unwrap();
        assert_eq!(frame.len(), 440);

        let hit = frame.index().nearest(&Point3::new(4.1, 4.0, -1.5)).unwrap();
        assert_eq!(hit.index, 84);
        assert!((hit.distance_sq - 0.01).abs() < 1e-12);
    }
}
