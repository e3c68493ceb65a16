//! Point cloud registration for LiDAR extrinsic calibration.
//!
//! This crate estimates the rigid transform that aligns a sensor's point
//! cloud to a reference cloud:
//! - **Range filter** - Drops near-origin and non-finite returns before registration
//! - **ICP (Iterative Closest Point)** - Alignment without known correspondences
//! - **Kabsch algorithm** - Optimal rigid transform from paired points
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with no framework dependencies.
//!
//! # Quick Start
//!
//! ```
//! use lidar_registration::{filter_cloud, icp_align, FilterParams, IcpParams};
//! use lidar_types::{PointCloud, RigidTransform};
//! use nalgebra::Vector3;
//!
//! let reference = PointCloud::from_tuples([
//!     (1.0, 0.0, 0.0),
//!     (0.0, 2.0, 0.0),
//!     (0.0, 0.0, 3.0),
//!     (1.0, 1.0, 1.0),
//!     (2.0, -1.0, 0.5),
//! ]);
//! let raw = RigidTransform::from_translation(Vector3::new(-0.05, 0.0, 0.0))
//!     .transform_cloud(&reference);
//!
//! let cleaned = filter_cloud(&raw, &FilterParams::default());
//! let result = icp_align(&cleaned, &reference, &IcpParams::default()).unwrap();
//!
//! assert!(result.converged);
//! assert!((result.transform.translation.x - 0.05).abs() < 1e-9);
//! ```
//!
//! # Failure Modes
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | Empty source or target | `RegistrationError::EmptyInput` |
//! | Fewer than 3 non-colinear points | `RegistrationError::DegenerateGeometry`, or a translation-only fit with `DegeneratePolicy::TranslationOnly` |
//! | No point within the search radius | `RegistrationError::NoCorrespondence` |
//! | Iteration cap reached | `Ok`, with `RegistrationWarning::NonConvergence` |
//!
//! # Determinism
//!
//! Registration never draws random numbers and every reduction is summed in
//! source order, so identical inputs give bit-identical results with or
//! without the parallel correspondence search.

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]

mod error;
mod filter;
mod icp;
mod kabsch;
mod neighbors;

pub use error::{CloudRole, RegistrationError, RegistrationResult, RegistrationWarning};
pub use filter::{DEFAULT_MIN_DISTANCE, FilterParams, filter_cloud, filter_cloud_parallel};
pub use icp::{
    DegeneratePolicy, FitMode, IcpParams, IcpResult, icp_align, icp_align_indexed,
    icp_align_points,
};
pub use kabsch::{
    COINCIDENT_SPREAD, COLINEAR_RATIO, check_geometry, compute_rigid_transform,
    compute_translation,
};
pub use neighbors::{
    BruteForceIndex, Correspondence, KdTreeIndex, Neighbor, NeighborSearch, SearchMethod,
    TargetIndex, find_correspondences,
};
