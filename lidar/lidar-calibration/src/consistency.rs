//! Fleet-wide consistency check.
//!
//! The check is a pure aggregation over session reports. It passes only when
//! every sensor is calibrated and every residual error is within tolerance.
//! An empty fleet fails: there is nothing to vouch for.

use std::fmt;

use tracing::{info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{CalibrationReport, CalibrationSession, CalibrationStatus, SensorId};

/// Aggregate verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Verdict {
    /// Every sensor is calibrated within tolerance.
    Pass,
    /// At least one sensor failed, or the fleet is empty.
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => f.write_str("PASS"),
            Self::Fail => f.write_str("FAIL"),
        }
    }
}

/// Why a sensor failed the check.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FailureReason {
    /// The sensor has no calibration.
    NotCalibrated,
    /// The residual error exceeds the tolerance.
    ErrorAboveTolerance {
        /// The sensor's residual error.
        error: f64,
        /// The tolerance it was compared against.
        tolerance: f64,
    },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotCalibrated => f.write_str("not calibrated"),
            Self::ErrorAboveTolerance { error, tolerance } => {
                write!(f, "error {error:.6} exceeds tolerance {tolerance:.6}")
            }
        }
    }
}

/// A sensor that failed the check.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorFailure {
    /// The offending sensor.
    pub sensor: SensorId,
    /// Why it failed.
    pub reason: FailureReason,
}

/// Result of a consistency check.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConsistencyReport {
    /// PASS or FAIL.
    pub verdict: Verdict,
    /// Tolerance the errors were compared against.
    pub tolerance: f64,
    /// Largest error among calibrated sensors.
    pub max_error: Option<f64>,
    /// Mean error among calibrated sensors.
    pub mean_error: Option<f64>,
    /// Difference between the largest and smallest error among calibrated sensors.
    pub spread: Option<f64>,
    /// Offending sensors, in input order.
    pub failures: Vec<SensorFailure>,
}

impl ConsistencyReport {
    /// Returns `true` if the verdict is [`Verdict::Pass`].
    #[must_use]
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    /// Identifiers of the offending sensors, in input order.
    #[must_use]
    pub fn failing_sensors(&self) -> Vec<&SensorId> {
        self.failures.iter().map(|f| &f.sensor).collect()
    }
}

/// Checks a set of sensor reports against a residual tolerance.
///
/// A sensor passes when it is calibrated and its error is at most
/// `tolerance`. Non-finite errors always fail.
#[must_use]
pub fn check_reports(reports: &[CalibrationReport], tolerance: f64) -> ConsistencyReport {
    let mut failures = Vec::new();
    let mut errors = Vec::with_capacity(reports.len());

    for report in reports {
        match report.status {
            CalibrationStatus::NotCalibrated => failures.push(SensorFailure {
                sensor: report.sensor.clone(),
                reason: FailureReason::NotCalibrated,
            }),
            CalibrationStatus::Calibrated { error } => {
                errors.push(error);
                if error.is_nan() || error > tolerance {
                    failures.push(SensorFailure {
                        sensor: report.sensor.clone(),
                        reason: FailureReason::ErrorAboveTolerance { error, tolerance },
                    });
                }
            }
        }
    }

    let max_error = errors.iter().copied().reduce(f64::max);
    let min_error = errors.iter().copied().reduce(f64::min);
    #[allow(clippy::cast_precision_loss)]
    let mean_error = (!errors.is_empty()).then(|| errors.iter().sum::<f64>() / errors.len() as f64);
    let spread = max_error.zip(min_error).map(|(max, min)| max - min);

    let verdict = if reports.is_empty() || !failures.is_empty() {
        Verdict::Fail
    } else {
        Verdict::Pass
    };

    if verdict == Verdict::Pass {
        info!(
            sensors = reports.len(),
            max_error = max_error.unwrap_or_default(),
            tolerance,
            "Consistency check passed"
        );
    } else {
        let failing: Vec<&str> = failures.iter().map(|f| f.sensor.as_str()).collect();
        warn!(
            sensors = reports.len(),
            failing = ?failing,
            tolerance,
            "Consistency check failed"
        );
    }

    ConsistencyReport {
        verdict,
        tolerance,
        max_error,
        mean_error,
        spread,
        failures,
    }
}

/// Checks a set of sessions against a residual tolerance.
///
/// Takes shared references only: call it after every calibration task has
/// been joined.
#[must_use]
pub fn check_consistency(sessions: &[CalibrationSession], tolerance: f64) -> ConsistencyReport {
    let reports: Vec<CalibrationReport> = sessions.iter().map(CalibrationSession::report).collect();
    check_reports(&reports, tolerance)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lidar_types::RigidTransform;

    fn calibrated(name: &str, error: f64) -> CalibrationReport {
        CalibrationReport::calibrated(name, RigidTransform::identity(), error)
    }

    #[test]
    fn test_all_within_tolerance_passes() {
        let reports = vec![
            calibrated("a", 0.001),
            calibrated("b", 0.004),
            calibrated("c", 0.002),
        ];
        let report = check_reports(&reports, 0.02);
        assert!(report.passed());
        assert!(report.failures.is_empty());
        assert_eq!(report.max_error, Some(0.004));
        assert_relative_eq!(report.mean_error.unwrap(), 0.007 / 3.0, epsilon = 1e-15);
        assert_relative_eq!(report.spread.unwrap(), 0.003, epsilon = 1e-15);
    }

    #[test]
    fn test_error_at_tolerance_passes() {
        let report = check_reports(&[calibrated("a", 0.02)], 0.02);
        assert_eq!(report.verdict, Verdict::Pass);
    }

    #[test]
    fn test_error_above_tolerance_fails() {
        let reports = vec![calibrated("a", 0.001), calibrated("b", 0.5)];
        let report = check_reports(&reports, 0.02);
        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(report.failing_sensors(), vec![&SensorId::new("b")]);
        assert_eq!(
            report.failures[0].reason,
            FailureReason::ErrorAboveTolerance {
                error: 0.5,
                tolerance: 0.02
            }
        );
    }

    #[test]
    fn test_not_calibrated_fails() {
        let reports = vec![
            calibrated("a", 0.001),
            CalibrationReport::not_calibrated("b"),
            calibrated("c", 0.001),
        ];
        let report = check_reports(&reports, 0.02);
        assert!(!report.passed());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].sensor, SensorId::new("b"));
        assert_eq!(report.failures[0].reason, FailureReason::NotCalibrated);
        assert_eq!(report.max_error, Some(0.001));
    }

    #[test]
    fn test_nan_error_fails() {
        let report = check_reports(&[calibrated("a", f64::NAN)], 0.02);
        assert_eq!(report.verdict, Verdict::Fail);
    }

    #[test]
    fn test_empty_fleet_fails() {
        let report = check_reports(&[], 0.02);
        assert_eq!(report.verdict, Verdict::Fail);
        assert!(report.failures.is_empty());
        assert!(report.max_error.is_none());
        assert!(report.mean_error.is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(Verdict::Pass.to_string(), "PASS");
        assert_eq!(Verdict::Fail.to_string(), "FAIL");
        assert_eq!(FailureReason::NotCalibrated.to_string(), "not calibrated");
    }
}
