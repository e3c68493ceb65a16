//! Calibration configuration bundle.

use lidar_registration::{DegeneratePolicy, FilterParams, IcpParams};
use lidar_types::RigidTransform;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{CalibrationError, CalibrationResult};

/// Default fleet-wide residual tolerance (mean-squared error, m²).
pub const DEFAULT_CONSISTENCY_TOLERANCE: f64 = 0.02;

/// Configuration supplied by the orchestrator for every calibration cycle.
///
/// # Example
///
/// ```
/// use lidar_calibration::CalibrationConfig;
///
/// let config = CalibrationConfig::default()
///     .with_max_iterations(100)
///     .with_max_correspondence_distance(1.0);
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.icp_params(Default::default()).max_iterations, 100);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CalibrationConfig {
    /// ICP iteration cap (default: 50).
    pub max_iterations: u32,
    /// ICP stop criterion on residual change (default: 1e-9).
    pub convergence_threshold: f64,
    /// Range filter minimum distance from the sensor origin (default: 0.1).
    pub filter_distance_threshold: f64,
    /// Largest residual a sensor may report and still pass the fleet
    /// consistency check (default: 0.02).
    pub consistency_tolerance: f64,
    /// Correspondence search radius; `None` searches without limit (default: `None`).
    pub max_correspondence_distance: Option<f64>,
    /// Handling of under-determined geometry (default: `Reject`).
    pub degenerate_policy: DegeneratePolicy,
    /// Seed each new calibration with the session's previous transform
    /// (default: true).
    pub warm_start: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        let icp = IcpParams::default();
        Self {
            max_iterations: icp.max_iterations,
            convergence_threshold: icp.convergence_threshold,
            filter_distance_threshold: FilterParams::default().min_distance,
            consistency_tolerance: DEFAULT_CONSISTENCY_TOLERANCE,
            max_correspondence_distance: None,
            degenerate_policy: DegeneratePolicy::Reject,
            warm_start: true,
        }
    }
}

impl CalibrationConfig {
    /// Sets the ICP iteration cap.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the ICP convergence threshold.
    #[must_use]
    pub const fn with_convergence_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = threshold;
        self
    }

    /// Sets the range filter threshold.
    #[must_use]
    pub const fn with_filter_distance_threshold(mut self, threshold: f64) -> Self {
        self.filter_distance_threshold = threshold;
        self
    }

    /// Sets the fleet consistency tolerance.
    #[must_use]
    pub const fn with_consistency_tolerance(mut self, tolerance: f64) -> Self {
        self.consistency_tolerance = tolerance;
        self
    }

    /// Sets the correspondence search radius.
    #[must_use]
    pub const fn with_max_correspondence_distance(mut self, distance: f64) -> Self {
        self.max_correspondence_distance = Some(distance);
        self
    }

    /// Sets the degenerate-geometry policy.
    #[must_use]
    pub const fn with_degenerate_policy(mut self, policy: DegeneratePolicy) -> Self {
        self.degenerate_policy = policy;
        self
    }

    /// Enables or disables warm starts.
    #[must_use]
    pub const fn with_warm_start(mut self, warm_start: bool) -> Self {
        self.warm_start = warm_start;
        self
    }

    /// Checks every value.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::InvalidConfig`] naming the first bad value.
    pub fn validate(&self) -> CalibrationResult<()> {
        if !self.filter_distance_threshold.is_finite() || self.filter_distance_threshold < 0.0 {
            return Err(CalibrationError::InvalidConfig(format!(
                "filter_distance_threshold must be finite and non-negative, got {}",
                self.filter_distance_threshold
            )));
        }
        if !self.consistency_tolerance.is_finite() || self.consistency_tolerance <= 0.0 {
            return Err(CalibrationError::InvalidConfig(format!(
                "consistency_tolerance must be finite and positive, got {}",
                self.consistency_tolerance
            )));
        }
        self.icp_params(RigidTransform::identity())
            .validate()
            .map_err(|err| CalibrationError::InvalidConfig(err.to_string()))
    }

    /// ICP parameters for one calibration, starting from `initial`.
    #[must_use]
    pub fn icp_params(&self, initial: RigidTransform) -> IcpParams {
        let mut params = IcpParams::new()
            .with_max_iterations(self.max_iterations)
            .with_convergence_threshold(self.convergence_threshold)
            .with_degenerate_policy(self.degenerate_policy)
            .with_initial_transform(initial);
        params.max_correspondence_distance = self.max_correspondence_distance;
        params
    }

    /// Range filter parameters.
    #[must_use]
    pub fn filter_params(&self) -> FilterParams {
        FilterParams::new().with_min_distance(self.filter_distance_threshold)
    }
}
