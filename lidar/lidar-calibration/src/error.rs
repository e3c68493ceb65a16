//! Error types for calibration sessions.

use lidar_registration::RegistrationError;
use thiserror::Error;

use crate::SensorId;

/// Errors that can occur while calibrating a sensor.
///
/// A failed calibration never changes the session it was run on.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
    /// The registration engine rejected the input.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// A calibrated transform was requested before any calibration succeeded.
    #[error("sensor {sensor} is not calibrated")]
    NotCalibrated {
        /// The uncalibrated sensor.
        sensor: SensorId,
    },

    /// The range filter removed every point of a non-empty cloud.
    #[error("sensor {sensor}: all {input_points} points removed by range filter")]
    EmptyAfterFiltering {
        /// The sensor whose cloud was emptied.
        sensor: SensorId,
        /// Number of points before filtering.
        input_points: usize,
    },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The number of clouds does not match the number of sessions.
    #[error("fleet has {sessions} sessions but {clouds} point clouds")]
    FleetSizeMismatch {
        /// Number of sessions.
        sessions: usize,
        /// Number of clouds supplied.
        clouds: usize,
    },
}

/// Result type for calibration operations.
pub type CalibrationResult<T> = Result<T, CalibrationError>;
