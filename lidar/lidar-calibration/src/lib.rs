//! Extrinsic calibration of a LiDAR fleet.
//!
//! Each sensor gets a [`CalibrationSession`] that registers its raw clouds
//! against a shared [`ReferenceFrame`] and keeps the resulting
//! sensor-to-reference transform. A fleet of sessions is calibrated in
//! parallel with [`calibrate_fleet`] and then compared with
//! [`check_consistency`], which yields a PASS/FAIL verdict listing the
//! offending sensors.
//!
//! # Example
//!
//! ```
//! use lidar_calibration::{CalibrationConfig, CalibrationSession, ReferenceFrame, run_fleet};
//! use lidar_types::{PointCloud, RigidTransform};
//! use nalgebra::Vector3;
//!
//! let reference = PointCloud::from_tuples([
//!     (1.0, 0.0, 0.0),
//!     (0.0, 2.0, 0.0),
//!     (0.0, 0.0, 3.0),
//!     (1.0, 1.0, 1.0),
//!     (-2.0, 1.0, 0.5),
//! ]);
//! let frame = ReferenceFrame::shared(reference.clone()).unwrap();
//! let config = CalibrationConfig::default();
//!
//! let mut sessions: Vec<_> = ["lidar_front", "lidar_rear"]
//!     .into_iter()
//!     .map(|id| CalibrationSession::new(id, frame.clone(), config.clone()).unwrap())
//!     .collect();
//!
//! let offset = RigidTransform::from_translation(Vector3::new(0.05, 0.0, 0.0));
//! let clouds = vec![reference.clone(), offset.transform_cloud(&reference)];
//!
//! let run = run_fleet(&mut sessions, &clouds, config.consistency_tolerance).unwrap();
//! assert!(run.consistency.passed());
//! ```
//!
//! # State
//!
//! A session is either NOT_CALIBRATED or CALIBRATED with a residual error.
//! A failed calibration never changes it. Sessions are mutated only through
//! `&mut`, so the borrow checker enforces one calibration task per session
//! and no reads during an update.

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]

mod config;
mod consistency;
mod error;
mod fleet;
mod report;
mod sensor;
mod session;

pub use config::{CalibrationConfig, DEFAULT_CONSISTENCY_TOLERANCE};
pub use consistency::{
    ConsistencyReport, FailureReason, SensorFailure, Verdict, check_consistency, check_reports,
};
pub use error::{CalibrationError, CalibrationResult};
pub use fleet::{FleetRun, calibrate_fleet, calibrate_fleet_sequential, run_fleet};
pub use report::CalibrationReport;
pub use sensor::{ReferenceFrame, SensorId};
pub use session::{Calibration, CalibrationSession, CalibrationStatus};
