//! Rigid transformation type for calibration results.

use nalgebra::{Matrix3, Matrix4, Point3, Rotation3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{GeometryError, GeometryResult, PointCloud};

/// Maximum deviation from orthonormality accepted for a user-supplied
/// rotation block.
pub const RIGIDITY_TOLERANCE: f64 = 1e-5;

/// A rigid transformation: rotation followed by translation.
///
/// Points are mapped as `p' = R * p + t`. The rotation is stored as a unit
/// quaternion, so the equivalent 3x3 matrix is always orthonormal with
/// determinant +1.
///
/// # Example
///
/// ```
/// use lidar_types::RigidTransform;
/// use nalgebra::{Point3, UnitQuaternion, Vector3};
/// use std::f64::consts::PI;
///
/// // Rotate 90 degrees around Z, then translate
/// let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI / 2.0);
/// let transform = RigidTransform::new(rotation, Vector3::new(1.0, 2.0, 3.0));
///
/// let p = transform.transform_point(&Point3::new(1.0, 0.0, 0.0));
/// assert!((p.x - 1.0).abs() < 1e-12);
/// assert!((p.y - 3.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidTransform {
    /// Rotation as a unit quaternion.
    pub rotation: UnitQuaternion<f64>,
    /// Translation vector.
    pub translation: Vector3<f64>,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    /// Creates a new rigid transform with the given rotation and translation.
    #[must_use]
    pub const fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Creates an identity transform.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Creates a transform with only translation.
    #[must_use]
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation,
        }
    }

    /// Creates a transform with only rotation.
    #[must_use]
    pub fn from_rotation(rotation: UnitQuaternion<f64>) -> Self {
        Self {
            rotation,
            translation: Vector3::zeros(),
        }
    }

    /// Creates a transform from a 3x3 rotation matrix and a translation.
    ///
    /// The matrix is projected onto the nearest rotation after validation, so
    /// small single-precision round-off in the input is tolerated.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::NotRigid`] if the matrix deviates from
    /// orthonormal by more than [`RIGIDITY_TOLERANCE`] or is a reflection,
    /// and [`GeometryError::NonFinite`] if any element is `NaN` or infinite.
    pub fn from_rotation_matrix(
        rotation: &Matrix3<f64>,
        translation: Vector3<f64>,
    ) -> GeometryResult<Self> {
        if !rotation.iter().chain(translation.iter()).all(|v| v.is_finite()) {
            return Err(GeometryError::NonFinite("transform"));
        }

        let deviation = (rotation.transpose() * rotation - Matrix3::identity())
            .abs()
            .max();
        if deviation > RIGIDITY_TOLERANCE {
            return Err(GeometryError::NotRigid(format!(
                "rotation block deviates from orthonormal by {deviation:.3e}"
            )));
        }

        let det = rotation.determinant();
        if det <= 0.0 {
            return Err(GeometryError::NotRigid(format!(
                "rotation block has determinant {det:.6}"
            )));
        }

        let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix(rotation));
        Ok(Self::new(rotation, translation))
    }

    /// Creates a transform from a flat row-major matrix.
    ///
    /// Accepts either the 12 elements of a 3x4 `[R | t]` block or all 16
    /// elements of a homogeneous 4x4 matrix. In the latter case the last row
    /// must be `[0, 0, 0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::InvalidMatrix`] for any other length, and
    /// the errors of [`Self::from_rotation_matrix`] for a non-rigid block.
    ///
    /// # Example
    ///
    /// ```
    /// use lidar_types::RigidTransform;
    ///
    /// let m = [
    ///     1.0, 0.0, 0.0, 5.0,
    ///     0.0, 1.0, 0.0, 0.0,
    ///     0.0, 0.0, 1.0, 0.0,
    ///     0.0, 0.0, 0.0, 1.0,
    /// ];
    /// let transform = RigidTransform::from_row_major(&m).unwrap();
    /// assert!((transform.translation.x - 5.0).abs() < 1e-12);
    /// ```
    pub fn from_row_major(elements: &[f64]) -> GeometryResult<Self> {
        if elements.len() != 12 && elements.len() != 16 {
            return Err(GeometryError::InvalidMatrix {
                actual: elements.len(),
            });
        }
        if !elements.iter().all(|v| v.is_finite()) {
            return Err(GeometryError::NonFinite("matrix"));
        }

        if elements.len() == 16 {
            let last_row = [elements[12], elements[13], elements[14], elements[15] - 1.0];
            if last_row.iter().any(|v| v.abs() > RIGIDITY_TOLERANCE) {
                return Err(GeometryError::NotRigid(
                    "homogeneous row must be [0, 0, 0, 1]".to_string(),
                ));
            }
        }

        let e = elements;
        let rotation = Matrix3::new(e[0], e[1], e[2], e[4], e[5], e[6], e[8], e[9], e[10]);
        let translation = Vector3::new(e[3], e[7], e[11]);
        Self::from_rotation_matrix(&rotation, translation)
    }

    /// Transforms a 3D point.
    #[must_use]
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * point.coords + self.translation)
    }

    /// Transforms a 3D vector (direction). Vectors are rotated but not translated.
    #[must_use]
    pub fn transform_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * vector
    }

    /// Applies the transform to every point of a cloud, returning a new cloud
    /// in the same order. The input is not modified.
    #[must_use]
    pub fn transform_cloud(&self, cloud: &PointCloud) -> PointCloud {
        cloud.iter().map(|p| self.transform_point(p)).collect()
    }

    /// Composes this transform with another (`self * other`).
    ///
    /// The result applies `other` first, then `self`:
    /// `compose(a, b).transform_point(p) == a.transform_point(&b.transform_point(p))`.
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.translation + self.rotation * other.translation,
        }
    }

    /// Computes the inverse of this transform.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let inv_rotation = self.rotation.inverse();
        Self {
            rotation: inv_rotation,
            translation: inv_rotation * -self.translation,
        }
    }

    /// Returns a copy with the rotation renormalized, removing drift that
    /// accumulates over many compositions.
    #[must_use]
    pub fn orthonormalized(mut self) -> Self {
        self.rotation.renormalize_fast();
        self
    }

    /// Returns the rotation as a 3x3 matrix.
    #[must_use]
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }

    /// Converts to a 4x4 homogeneous transformation matrix.
    #[must_use]
    pub fn to_matrix4(&self) -> Matrix4<f64> {
        let mut mat = Matrix4::identity();
        mat.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&self.rotation_matrix());
        mat.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        mat
    }

    /// Returns the 16 elements of the homogeneous matrix in row-major order.
    #[must_use]
    pub fn to_row_major(&self) -> [f64; 16] {
        let m = self.to_matrix4();
        let mut out = [0.0; 16];
        for row in 0..4 {
            for col in 0..4 {
                out[row * 4 + col] = m[(row, col)];
            }
        }
        out
    }

    /// Rotation angle in radians.
    #[must_use]
    pub fn angle(&self) -> f64 {
        self.rotation.angle()
    }

    /// Returns true if this transform is approximately the identity.
    #[must_use]
    pub fn is_identity(&self, epsilon: f64) -> bool {
        self.rotation.angle().abs() < epsilon && self.translation.norm() < epsilon
    }

    /// Returns true if both transforms agree within `epsilon` in rotation
    /// angle (radians) and translation distance.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.rotation.angle_to(&other.rotation) < epsilon
            && (self.translation - other.translation).norm() < epsilon
    }
}

/// Applies a flat row-major matrix (12 or 16 elements) to every point of a
/// cloud.
///
/// The matrix is validated as a rigid transform first; nothing is applied if
/// it is not.
///
/// # Errors
///
/// See [`RigidTransform::from_row_major`].
pub fn transform_cloud_with_matrix(
    cloud: &PointCloud,
    elements: &[f64],
) -> GeometryResult<PointCloud> {
    Ok(RigidTransform::from_row_major(elements)?.transform_cloud(cloud))
}
