//! Closed-form rigid transform estimation from paired points.
//!
//! The Kabsch algorithm finds the rotation that minimizes the sum of squared
//! distances between two paired point sets, via the SVD of their
//! cross-covariance matrix.

use lidar_types::{Point3, RigidTransform};
use nalgebra::{Matrix3, Rotation3, SymmetricEigen, UnitQuaternion, Vector3};

use crate::{CloudRole, RegistrationError, RegistrationResult};

/// Ratio between the second-largest and largest spread of a point set below
/// which the points are treated as colinear.
pub const COLINEAR_RATIO: f64 = 1e-10;

/// Absolute spread (m²) below which a point set is treated as a single point.
pub const COINCIDENT_SPREAD: f64 = 1e-18;

/// Checks that a point set can constrain a full rotation.
///
/// At least three points are required, and they must not all lie on one
/// line. Planar sets are accepted.
///
/// # Errors
///
/// Returns [`RegistrationError::DegenerateGeometry`] describing why the set
/// is under-determined.
pub fn check_geometry(points: &[Point3<f64>], which: CloudRole) -> RegistrationResult<()> {
    let degenerate = |reason| RegistrationError::DegenerateGeometry {
        which,
        points: points.len(),
        reason,
    };

    if points.len() < 3 {
        return Err(degenerate("fewer than 3 points"));
    }

    let centroid = compute_centroid(points);
    let mut scatter = Matrix3::zeros();
    for p in points {
        let d = p.coords - centroid;
        scatter += d * d.transpose();
    }

    let mut spread: Vec<f64> = SymmetricEigen::new(scatter).eigenvalues.iter().copied().collect();
    spread.sort_by(|a, b| b.total_cmp(a));

    if spread[0] <= COINCIDENT_SPREAD {
        return Err(degenerate("all points coincide"));
    }
    if spread[1] <= COLINEAR_RATIO * spread[0] {
        return Err(degenerate("all points are colinear"));
    }
    Ok(())
}

/// Computes the optimal rigid transform that aligns source points to target points.
///
/// # Errors
///
/// Returns an error if:
/// - Either point set is empty
/// - The point sets have different lengths
/// - SVD computation fails
///
/// # Example
///
/// ```
/// use lidar_registration::compute_rigid_transform;
/// use nalgebra::Point3;
///
/// let source = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// ];
///
/// // Target is source translated by (1, 2, 3)
/// let target = vec![
///     Point3::new(1.0, 2.0, 3.0),
///     Point3::new(2.0, 2.0, 3.0),
///     Point3::new(1.0, 3.0, 3.0),
/// ];
///
/// let transform = compute_rigid_transform(&source, &target).unwrap();
/// let aligned = transform.transform_point(&source[0]);
/// assert!((aligned.coords - target[0].coords).norm() < 1e-9);
/// ```
pub fn compute_rigid_transform(
    source_points: &[Point3<f64>],
    target_points: &[Point3<f64>],
) -> RegistrationResult<RigidTransform> {
    check_pairs(source_points, target_points)?;

    let source_centroid = compute_centroid(source_points);
    let target_centroid = compute_centroid(target_points);

    // H = sum(source_i * target_i^T) over centered points
    let mut h = Matrix3::zeros();
    for (s, t) in source_points.iter().zip(target_points.iter()) {
        h += (s.coords - source_centroid) * (t.coords - target_centroid).transpose();
    }

    let svd = h.svd(true, true);
    let u = svd.u.ok_or(RegistrationError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(RegistrationError::SvdFailed)?;

    // R = V * U^T
    let mut rotation_matrix = v_t.transpose() * u.transpose();

    // Reflection: flip the axis of the smallest singular value
    if rotation_matrix.determinant() < 0.0 {
        let mut v = v_t.transpose();
        for i in 0..3 {
            v[(i, 2)] = -v[(i, 2)];
        }
        rotation_matrix = v * u.transpose();
    }

    let rotation =
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation_matrix));

    let translation = target_centroid - rotation * source_centroid;

    Ok(RigidTransform::new(rotation, translation))
}

/// Computes the translation that best aligns paired points, with no rotation.
///
/// This is the degraded fit used when the geometry cannot constrain a
/// rotation.
///
/// # Errors
///
/// Returns an error if either point set is empty or the lengths differ.
pub fn compute_translation(
    source_points: &[Point3<f64>],
    target_points: &[Point3<f64>],
) -> RegistrationResult<RigidTransform> {
    check_pairs(source_points, target_points)?;
    let offset = compute_centroid(target_points) - compute_centroid(source_points);
    Ok(RigidTransform::from_translation(offset))
}

fn check_pairs(source_points: &[Point3<f64>], target_points: &[Point3<f64>]) -> RegistrationResult<()> {
    if source_points.is_empty() {
        return Err(RegistrationError::EmptyInput {
            which: CloudRole::Source,
        });
    }
    if target_points.is_empty() {
        return Err(RegistrationError::EmptyInput {
            which: CloudRole::Target,
        });
    }
    if source_points.len() != target_points.len() {
        return Err(RegistrationError::InvalidParameter(format!(
            "point sets must have equal length: {} vs {}",
            source_points.len(),
            target_points.len()
        )));
    }
    Ok(())
}

/// Computes the centroid of a set of points. Summation runs in index order.
fn compute_centroid(points: &[Point3<f64>]) -> Vector3<f64> {
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let sum: Vector3<f64> = points.iter().map(|p| p.coords).sum();
    sum / n
}
