//! Error types for registration operations.

use std::fmt;

use thiserror::Error;

/// Which of the two clouds an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudRole {
    /// The cloud being aligned (sensor data).
    Source,
    /// The reference cloud being aligned to.
    Target,
}

impl fmt::Display for CloudRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Target => f.write_str("target"),
        }
    }
}

/// Errors that can occur during registration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistrationError {
    /// A point cloud has no points.
    #[error("{which} point cloud is empty")]
    EmptyInput {
        /// The empty cloud.
        which: CloudRole,
    },

    /// Not enough non-colinear points to determine a rotation.
    #[error("degenerate geometry in {which} ({points} points): {reason}")]
    DegenerateGeometry {
        /// The cloud (or matched subset) that is degenerate.
        which: CloudRole,
        /// Number of points examined.
        points: usize,
        /// Why the configuration is under-determined.
        reason: &'static str,
    },

    /// Every source point was farther than the search radius from the target.
    #[error("no correspondences found in iteration {iteration}")]
    NoCorrespondence {
        /// 1-based iteration in which the search came back empty.
        iteration: u32,
    },

    /// SVD computation failed during transform estimation.
    #[error("SVD computation failed during transform estimation")]
    SvdFailed,

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for registration operations.
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// Non-fatal conditions attached to a successful registration.
///
/// A result carrying warnings is still usable but should be treated as
/// lower confidence.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationWarning {
    /// The iteration cap was reached before the residual change fell below
    /// the convergence threshold.
    NonConvergence {
        /// Iterations performed.
        iterations: u32,
        /// Residual change in the last iteration.
        last_change: f64,
    },

    /// The geometry could not constrain a rotation, so only a translation
    /// was estimated.
    TranslationOnly {
        /// The degenerate cloud.
        which: CloudRole,
        /// Why the rotation was dropped.
        reason: &'static str,
    },
}

impl fmt::Display for RegistrationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonConvergence {
                iterations,
                last_change,
            } => write!(
                f,
                "did not converge after {iterations} iterations (last change {last_change:.3e})"
            ),
            Self::TranslationOnly { which, reason } => {
                write!(f, "translation-only fit, {which} degenerate: {reason}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = RegistrationError::EmptyInput {
            which: CloudRole::Source,
        };
        assert_eq!(format!("{err}"), "source point cloud is empty");

        let err = RegistrationError::NoCorrespondence { iteration: 3 };
        assert!(format!("{err}").contains('3'));
    }

    #[test]
    fn degenerate_display() {
        let err = RegistrationError::DegenerateGeometry {
            which: CloudRole::Target,
            points: 2,
            reason: "fewer than 3 points",
        };
        let msg = format!("{err}");
        assert!(msg.contains("target"));
        assert!(msg.contains("fewer than 3 points"));
    }

    #[test]
    fn warning_display() {
        let w = RegistrationWarning::NonConvergence {
            iterations: 50,
            last_change: 1e-3,
        };
        assert!(format!("{w}").contains("50 iterations"));
    }
}
