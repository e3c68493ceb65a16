//! Per-sensor report handed to the orchestrator.

use lidar_types::RigidTransform;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{CalibrationStatus, SensorId};

/// Snapshot of one session's calibration state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationReport {
    /// Sensor identifier.
    pub sensor: SensorId,
    /// Calibration status.
    pub status: CalibrationStatus,
    /// Sensor-to-reference transform, when calibrated.
    pub transform: Option<RigidTransform>,
    /// Mean-squared residual, when calibrated.
    pub error: Option<f64>,
    /// The calibration finished with a warning (non-convergence or a
    /// translation-only fit).
    pub low_confidence: bool,
}

impl CalibrationReport {
    /// Report for a sensor that has never been calibrated.
    pub fn not_calibrated(sensor: impl Into<SensorId>) -> Self {
        Self {
            sensor: sensor.into(),
            status: CalibrationStatus::NotCalibrated,
            transform: None,
            error: None,
            low_confidence: false,
        }
    }

    /// Report for a calibrated sensor.
    pub fn calibrated(sensor: impl Into<SensorId>, transform: RigidTransform, error: f64) -> Self {
        Self {
            sensor: sensor.into(),
            status: CalibrationStatus::Calibrated { error },
            transform: Some(transform),
            error: Some(error),
            low_confidence: false,
        }
    }
}
