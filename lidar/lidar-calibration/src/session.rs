//! Per-sensor calibration session.
//!
//! A [`CalibrationSession`] owns the calibration state of one sensor. The
//! state is a single `Option<Calibration>`: a successful calibration replaces
//! it in one assignment, and a failed one leaves it untouched, so a reader
//! never sees a transform paired with another run's error.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use lidar_registration::{
    CloudRole, FitMode, IcpResult, RegistrationError, RegistrationWarning, filter_cloud_parallel,
    icp_align_indexed,
};
use lidar_types::{PointCloud, RigidTransform};
use tracing::{info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    CalibrationConfig, CalibrationError, CalibrationReport, CalibrationResult, ReferenceFrame,
    SensorId,
};

/// Calibration status of a sensor.
///
/// Displays as `NOT_CALIBRATED` or `CALIBRATED (Error: 0.000123)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CalibrationStatus {
    /// No calibration has succeeded yet.
    NotCalibrated,
    /// The sensor holds a calibration with this residual error.
    Calibrated {
        /// Mean-squared residual of the calibration.
        error: f64,
    },
}

impl CalibrationStatus {
    /// Returns `true` for [`CalibrationStatus::Calibrated`].
    #[must_use]
    pub const fn is_calibrated(&self) -> bool {
        matches!(self, Self::Calibrated { .. })
    }
}

impl fmt::Display for CalibrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotCalibrated => f.write_str("NOT_CALIBRATED"),
            Self::Calibrated { error } => write!(f, "CALIBRATED (Error: {error:.6})"),
        }
    }
}

/// The outcome of a successful calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    /// Sensor-to-reference transform.
    pub transform: RigidTransform,
    /// Mean-squared residual under `transform`.
    pub error: f64,
    /// Root-mean-squared residual.
    pub rms_error: f64,
    /// Largest single residual distance.
    pub max_error: f64,
    /// ICP iterations performed.
    pub iterations: u32,
    /// Whether ICP met its convergence threshold.
    pub converged: bool,
    /// Rigid or translation-only estimate.
    pub fit_mode: FitMode,
    /// Points that survived the range filter.
    pub points_used: usize,
    /// Conditions that lower confidence in the result.
    pub warnings: Vec<RegistrationWarning>,
}

impl Calibration {
    fn from_icp(result: IcpResult, points_used: usize) -> Self {
        Self {
            transform: result.transform,
            error: result.mse,
            rms_error: result.rms_error,
            max_error: result.max_error,
            iterations: result.iterations,
            converged: result.converged,
            fit_mode: result.fit_mode,
            points_used,
            warnings: result.warnings,
        }
    }

    /// Returns `true` if the calibration carries any warning.
    #[must_use]
    pub fn is_low_confidence(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Calibration state of one sensor against a shared reference frame.
///
/// # Example
///
/// ```
/// use lidar_calibration::{CalibrationConfig, CalibrationSession, ReferenceFrame};
/// use lidar_types::PointCloud;
///
/// let reference = PointCloud::from_tuples([
///     (1.0, 0.0, 0.0),
///     (0.0, 2.0, 0.0),
///     (0.0, 0.0, 3.0),
///     (1.0, 1.0, 1.0),
///     (-1.0, 2.0, 0.5),
/// ]);
/// let frame = ReferenceFrame::shared(reference.clone()).unwrap();
/// let mut session =
///     CalibrationSession::new("lidar_front", frame, CalibrationConfig::default()).unwrap();
///
/// assert_eq!(session.status().to_string(), "NOT_CALIBRATED");
///
/// let calibration = session.calibrate_sensor(&reference).unwrap();
/// assert!(calibration.error < 1e-12);
/// assert!(session.status().is_calibrated());
/// ```
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    sensor: SensorId,
    reference: Arc<ReferenceFrame>,
    config: CalibrationConfig,
    calibration: Option<Calibration>,
}

impl CalibrationSession {
    /// Creates an uncalibrated session.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::InvalidConfig`] if the configuration is invalid.
    pub fn new(
        sensor: impl Into<SensorId>,
        reference: Arc<ReferenceFrame>,
        config: CalibrationConfig,
    ) -> CalibrationResult<Self> {
        config.validate()?;
        Ok(Self {
            sensor: sensor.into(),
            reference,
            config,
            calibration: None,
        })
    }

    /// The sensor this session calibrates.
    #[must_use]
    pub const fn sensor(&self) -> &SensorId {
        &self.sensor
    }

    /// The session configuration.
    #[must_use]
    pub const fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// The shared reference frame.
    #[must_use]
    pub fn reference(&self) -> &ReferenceFrame {
        &self.reference
    }

    /// The current calibration, if any.
    #[must_use]
    pub const fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    /// The current sensor-to-reference transform, if calibrated.
    #[must_use]
    pub fn transform(&self) -> Option<&RigidTransform> {
        self.calibration.as_ref().map(|c| &c.transform)
    }

    /// Calibrates the sensor from one raw point cloud.
    ///
    /// The cloud is range-filtered, then registered against the reference
    /// frame. With `warm_start` enabled, an already calibrated session starts
    /// from its current transform. On success the session state is replaced
    /// as a whole; on failure it is left exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::EmptyInput`] if `cloud` is empty
    /// - [`CalibrationError::EmptyAfterFiltering`] if no point survives the filter
    /// - any other [`RegistrationError`] raised by ICP
    pub fn calibrate_sensor(&mut self, cloud: &PointCloud) -> CalibrationResult<&Calibration> {
        let started = Instant::now();
        match self.run(cloud) {
            Ok(calibration) => {
                info!(
                    sensor = %self.sensor,
                    points = calibration.points_used,
                    error = calibration.error,
                    iterations = calibration.iterations,
                    converged = calibration.converged,
                    elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
                    "Calibration complete"
                );
                Ok(self.calibration.insert(calibration))
            }
            Err(err) => {
                warn!(sensor = %self.sensor, error = %err, "Calibration failed");
                Err(err)
            }
        }
    }

    fn run(&self, cloud: &PointCloud) -> CalibrationResult<Calibration> {
        if cloud.is_empty() {
            return Err(RegistrationError::EmptyInput {
                which: CloudRole::Source,
            }
            .into());
        }

        info!(sensor = %self.sensor, points = cloud.len(), "Calibrating sensor");

        let filtered = filter_cloud_parallel(cloud, &self.config.filter_params());
        if filtered.is_empty() {
            return Err(CalibrationError::EmptyAfterFiltering {
                sensor: self.sensor.clone(),
                input_points: cloud.len(),
            });
        }

        let initial = match (&self.calibration, self.config.warm_start) {
            (Some(previous), true) => previous.transform,
            _ => RigidTransform::identity(),
        };
        let params = self.config.icp_params(initial);
        let result = icp_align_indexed(filtered.as_slice(), self.reference.index(), &params)?;

        Ok(Calibration::from_icp(result, filtered.len()))
    }

    /// Residual error of the current calibration.
    ///
    /// Returns `0.0` before the first successful calibration. Use
    /// [`status`](Self::status) to tell the two cases apart.
    #[must_use]
    pub fn calculate_calibration_error(&self) -> f64 {
        self.calibration.as_ref().map_or(0.0, |c| c.error)
    }

    /// Current calibration status.
    #[must_use]
    pub fn status(&self) -> CalibrationStatus {
        self.calibration
            .as_ref()
            .map_or(CalibrationStatus::NotCalibrated, |c| {
                CalibrationStatus::Calibrated { error: c.error }
            })
    }

    /// Maps a cloud from the sensor frame into the reference frame.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::NotCalibrated`] before the first
    /// successful calibration.
    pub fn transform_point_cloud(&self, cloud: &PointCloud) -> CalibrationResult<PointCloud> {
        self.transform()
            .map(|t| t.transform_cloud(cloud))
            .ok_or_else(|| CalibrationError::NotCalibrated {
                sensor: self.sensor.clone(),
            })
    }

    /// Snapshot of the session for the orchestrator.
    #[must_use]
    pub fn report(&self) -> CalibrationReport {
        CalibrationReport {
            sensor: self.sensor.clone(),
            status: self.status(),
            transform: self.transform().copied(),
            error: self.calibration.as_ref().map(|c| c.error),
            low_confidence: self
                .calibration
                .as_ref()
                .is_some_and(Calibration::is_low_confidence),
        }
    }

    /// Drops the current calibration.
    pub fn reset(&mut self) {
        self.calibration = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lidar_types::Point3;
    use nalgebra::Vector3;
    use rand::{Rng, SeedableRng};

    fn random_cloud(count: usize, seed: u64) -> PointCloud {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                Point3::new(
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                )
            })
            .collect()
    }

    fn session(reference: &PointCloud) -> CalibrationSession {
        let frame = ReferenceFrame::shared(reference.clone()).unwrap();
        CalibrationSession::new("lidar_test", frame, CalibrationConfig::default()).unwrap()
    }

    #[test]
    fn test_new_session_not_calibrated() {
        let s = session(&random_cloud(100, 1));
        assert_eq!(s.status(), CalibrationStatus::NotCalibrated);
        assert_eq!(s.calculate_calibration_error(), 0.0);
        assert!(s.transform().is_none());
        assert_eq!(s.status().to_string(), "NOT_CALIBRATED");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let frame = ReferenceFrame::shared(random_cloud(10, 1)).unwrap();
        let config = CalibrationConfig::default().with_max_iterations(0);
        assert!(matches!(
            CalibrationSession::new("x", frame, config),
            Err(CalibrationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_self_calibration() {
        let reference = random_cloud(500, 2);
        let mut s = session(&reference);
        let c = s.calibrate_sensor(&reference).unwrap();
        assert!(c.error < 1e-12);
        assert!(c.transform.is_identity(1e-9));
        assert!(s.status().is_calibrated());
    }

    #[test]
    fn test_recovers_translation_offset() {
        let reference = random_cloud(2_000, 3);
        let offset = Vector3::new(0.05, 0.0, 0.0);
        let shifted = RigidTransform::from_translation(offset).transform_cloud(&reference);

        let mut s = session(&reference);
        let c = s.calibrate_sensor(&shifted).unwrap().clone();
        assert!(c.error < 1e-10);
        assert_relative_eq!(c.transform.translation, -offset, epsilon = 1e-6);
        assert_eq!(s.calculate_calibration_error(), c.error);
    }

    #[test]
    fn test_empty_cloud_keeps_state() {
        let reference = random_cloud(300, 4);
        let mut s = session(&reference);

        let err = s.calibrate_sensor(&PointCloud::new()).unwrap_err();
        assert_eq!(
            err,
            CalibrationError::Registration(RegistrationError::EmptyInput {
                which: CloudRole::Source
            })
        );
        assert_eq!(s.status(), CalibrationStatus::NotCalibrated);
    }

    #[test]
    fn test_failure_preserves_previous_calibration() {
        let reference = random_cloud(300, 5);
        let mut s = session(&reference);
        let before = s.calibrate_sensor(&reference).unwrap().clone();

        let near_origin = PointCloud::from_tuples([(0.01, 0.0, 0.0), (0.0, 0.02, 0.0)]);
        let err = s.calibrate_sensor(&near_origin).unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::EmptyAfterFiltering {
                input_points: 2,
                ..
            }
        ));
        assert_eq!(s.calibration(), Some(&before));
    }

    #[test]
    fn test_transform_before_calibration_is_error() {
        let s = session(&random_cloud(50, 6));
        let err = s.transform_point_cloud(&random_cloud(5, 7)).unwrap_err();
        assert_eq!(
            err,
            CalibrationError::NotCalibrated {
                sensor: SensorId::new("lidar_test")
            }
        );
    }

    #[test]
    fn test_transform_point_cloud_maps_into_reference() {
        let reference = random_cloud(1_000, 8);
        let offset = Vector3::new(0.0, -0.04, 0.02);
        let shifted = RigidTransform::from_translation(offset).transform_cloud(&reference);

        let mut s = session(&reference);
        s.calibrate_sensor(&shifted).unwrap();
        let mapped = s.transform_point_cloud(&shifted).unwrap();
        for (a, b) in mapped.iter().zip(reference.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_status_display() {
        let status = CalibrationStatus::Calibrated { error: 0.000_123_4 };
        assert_eq!(status.to_string(), "CALIBRATED (Error: 0.000123)");
    }

    #[test]
    fn test_report_and_reset() {
        let reference = random_cloud(200, 9);
        let mut s = session(&reference);
        s.calibrate_sensor(&reference).unwrap();

        let report = s.report();
        assert_eq!(report.sensor, SensorId::new("lidar_test"));
        assert!(report.transform.is_some());
        assert!(report.error.is_some());

        s.reset();
        assert_eq!(s.report().status, CalibrationStatus::NotCalibrated);
        assert!(s.report().transform.is_none());
    }
}
