//! Error types for geometry primitives.

use thiserror::Error;

/// Errors that can occur when building geometry primitives from raw data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    /// A flat matrix had the wrong number of elements.
    #[error("invalid matrix: expected 12 or 16 row-major elements, got {actual}")]
    InvalidMatrix {
        /// Number of elements supplied.
        actual: usize,
    },

    /// The rotation block is not orthonormal with determinant +1,
    /// or the homogeneous row is not `[0, 0, 0, 1]`.
    #[error("matrix is not a rigid transform: {0}")]
    NotRigid(String),

    /// The input contained `NaN` or infinite values.
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
}

/// Result type for geometry operations.
pub type GeometryResult<T> = Result<T, GeometryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = GeometryError::InvalidMatrix { actual: 9 };
        let msg = format!("{err}");
        assert!(msg.contains("12 or 16"));
        assert!(msg.contains('9'));
    }

    #[test]
    fn error_not_rigid() {
        let err = GeometryError::NotRigid("determinant -1".to_string());
        assert!(format!("{err}").contains("determinant -1"));
    }
}
