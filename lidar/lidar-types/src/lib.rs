//! Geometry primitives for LiDAR calibration.
//!
//! This crate provides the value types shared by the registration engine and
//! the calibration sessions:
//! - [`PointCloud`] - Ordered sequence of 3D points
//! - [`RigidTransform`] - Rotation + translation, `p' = R * p + t`
//!
//! Points are [`nalgebra::Point3<f64>`]; all arithmetic is double precision.
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with no framework dependencies.
//!
//! # Example
//!
//! ```
//! use lidar_types::{PointCloud, RigidTransform};
//! use nalgebra::Vector3;
//!
//! let cloud = PointCloud::from_tuples([(1.0, 0.0, 0.0), (0.0, 1.0, 0.0)]);
//! let shift = RigidTransform::from_translation(Vector3::new(0.0, 0.0, 2.0));
//!
//! let moved = shift.transform_cloud(&cloud);
//! let back = shift.inverse().transform_cloud(&moved);
//!
//! assert!((moved.points[0].z - 2.0).abs() < 1e-12);
//! assert!((back.points[0].z).abs() < 1e-12);
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]

mod cloud;
mod error;
mod transform;

pub use cloud::PointCloud;
pub use error::{GeometryError, GeometryResult};
pub use transform::{RIGIDITY_TOLERANCE, RigidTransform, transform_cloud_with_matrix};

/// Re-export of the point type used throughout the workspace.
pub use nalgebra::Point3;
