//! Iterative Closest Point (ICP) registration.
//!
//! ICP iteratively refines the alignment between two point sets by:
//! 1. Finding closest point correspondences
//! 2. Computing the optimal rigid transform for those correspondences
//! 3. Composing it into the running estimate and repeating until the
//!    mean-squared residual stops changing
//!
//! All reductions run sequentially in source order, so the result is
//! bit-identical for the same inputs regardless of whether the
//! correspondence search runs in parallel.

use lidar_types::{Point3, PointCloud, RigidTransform};
use tracing::{debug, warn};

use crate::kabsch::{check_geometry, compute_rigid_transform, compute_translation};
use crate::neighbors::{
    Correspondence, NeighborSearch, SearchMethod, TargetIndex, find_correspondences,
};
use crate::{CloudRole, RegistrationError, RegistrationResult, RegistrationWarning};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What to do when the geometry cannot constrain a rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DegeneratePolicy {
    /// Fail with [`RegistrationError::DegenerateGeometry`].
    #[default]
    Reject,
    /// Estimate translation only and flag the result with
    /// [`RegistrationWarning::TranslationOnly`].
    TranslationOnly,
}

/// The kind of transform that was estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FitMode {
    /// Full rotation + translation.
    Rigid,
    /// Translation only (degenerate geometry).
    TranslationOnly,
}

/// Parameters for ICP registration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IcpParams {
    /// Maximum number of iterations (default: 50).
    pub max_iterations: u32,
    /// Convergence threshold on the change in mean-squared residual between
    /// iterations (default: 1e-9).
    pub convergence_threshold: f64,
    /// Maximum correspondence distance. Points farther than this from every
    /// target point are left out of an iteration's fit.
    /// `None` means no distance filtering (default: `None`).
    pub max_correspondence_distance: Option<f64>,
    /// Initial transform guess (default: identity).
    pub initial_transform: RigidTransform,
    /// Handling of under-determined geometry (default: `Reject`).
    pub degenerate_policy: DegeneratePolicy,
    /// Nearest-neighbor strategy (default: KD-tree).
    pub search: SearchMethod,
    /// Run the correspondence search on the rayon pool (default: true).
    pub parallel: bool,
}

impl Default for IcpParams {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            convergence_threshold: 1e-9,
            max_correspondence_distance: None,
            initial_transform: RigidTransform::identity(),
            degenerate_policy: DegeneratePolicy::Reject,
            search: SearchMethod::KdTree,
            parallel: true,
        }
    }
}

impl IcpParams {
    /// Creates new ICP parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of iterations.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the convergence threshold.
    #[must_use]
    pub const fn with_convergence_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = threshold;
        self
    }

    /// Sets the maximum correspondence distance.
    #[must_use]
    pub const fn with_max_correspondence_distance(mut self, distance: f64) -> Self {
        self.max_correspondence_distance = Some(distance);
        self
    }

    /// Sets the initial transform guess (warm start).
    #[must_use]
    pub const fn with_initial_transform(mut self, transform: RigidTransform) -> Self {
        self.initial_transform = transform;
        self
    }

    /// Sets the degenerate-geometry policy.
    #[must_use]
    pub const fn with_degenerate_policy(mut self, policy: DegeneratePolicy) -> Self {
        self.degenerate_policy = policy;
        self
    }

    /// Sets the nearest-neighbor strategy.
    #[must_use]
    pub const fn with_search(mut self, search: SearchMethod) -> Self {
        self.search = search;
        self
    }

    /// Enables or disables the parallel correspondence search.
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Checks that every parameter is in range.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidParameter`] naming the first bad value.
    pub fn validate(&self) -> RegistrationResult<()> {
        if self.max_iterations == 0 {
            return Err(RegistrationError::InvalidParameter(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !self.convergence_threshold.is_finite() || self.convergence_threshold < 0.0 {
            return Err(RegistrationError::InvalidParameter(format!(
                "convergence_threshold must be finite and non-negative, got {}",
                self.convergence_threshold
            )));
        }
        if let Some(d) = self.max_correspondence_distance {
            if d.is_nan() || d <= 0.0 {
                return Err(RegistrationError::InvalidParameter(format!(
                    "max_correspondence_distance must be positive, got {d}"
                )));
            }
        }
        Ok(())
    }
}

/// Result of ICP registration.
#[derive(Debug, Clone)]
pub struct IcpResult {
    /// The computed rigid transform from source to target.
    pub transform: RigidTransform,
    /// Mean-squared distance between matched pairs under the final transform.
    pub mse: f64,
    /// Root of [`Self::mse`].
    pub rms_error: f64,
    /// Largest matched-pair distance under the final transform.
    pub max_error: f64,
    /// Number of iterations performed.
    pub iterations: u32,
    /// Whether the residual change fell below the threshold.
    pub converged: bool,
    /// Number of valid correspondences under the final transform.
    pub correspondence_count: usize,
    /// Whether rotation was estimated.
    pub fit_mode: FitMode,
    /// Non-fatal conditions; a non-empty list means lower confidence.
    pub warnings: Vec<RegistrationWarning>,
}

impl IcpResult {
    /// Returns `true` if the result carries any warning.
    #[must_use]
    pub fn is_low_confidence(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Aligns a source cloud to a target cloud using ICP.
///
/// # Errors
///
/// Returns an error if:
/// - Either cloud is empty
/// - Either cloud is degenerate and the policy is [`DegeneratePolicy::Reject`]
/// - An iteration finds no correspondences
/// - A parameter is out of range
///
/// # Example
///
/// ```
/// use lidar_registration::{icp_align, IcpParams};
/// use lidar_types::PointCloud;
///
/// let source = PointCloud::from_tuples([
///     (0.0, 0.0, 0.0),
///     (1.0, 0.0, 0.0),
///     (0.0, 1.0, 0.0),
///     (0.0, 0.0, 1.0),
///     (1.0, 1.0, 1.0),
/// ]);
/// let target = PointCloud::from_tuples([
///     (0.05, 0.0, 0.0),
///     (1.05, 0.0, 0.0),
///     (0.05, 1.0, 0.0),
///     (0.05, 0.0, 1.0),
///     (1.05, 1.0, 1.0),
/// ]);
///
/// let result = icp_align(&source, &target, &IcpParams::default()).unwrap();
/// assert!(result.converged);
/// assert!(result.mse < 1e-12);
/// ```
pub fn icp_align(
    source: &PointCloud,
    target: &PointCloud,
    params: &IcpParams,
) -> RegistrationResult<IcpResult> {
    icp_align_points(source.as_slice(), target.as_slice(), params)
}

/// Aligns source points to target points using ICP.
///
/// Builds a [`TargetIndex`] with [`IcpParams::search`] and delegates to
/// [`icp_align_indexed`].
///
/// # Errors
///
/// See [`icp_align`].
pub fn icp_align_points(
    source_points: &[Point3<f64>],
    target_points: &[Point3<f64>],
    params: &IcpParams,
) -> RegistrationResult<IcpResult> {
    params.validate()?;
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
    let index = TargetIndex::build(target_points, params.search);
    icp_align_indexed(source_points, &index, params)
}

/// Aligns source points against a prebuilt target index.
///
/// [`IcpParams::search`] is ignored; the index decides the strategy.
///
/// # Errors
///
/// See [`icp_align`].
pub fn icp_align_indexed<S: NeighborSearch + ?Sized>(
    source_points: &[Point3<f64>],
    target: &S,
    params: &IcpParams,
) -> RegistrationResult<IcpResult> {
    params.validate()?;
    if source_points.is_empty() {
        return Err(RegistrationError::EmptyInput {
            which: CloudRole::Source,
        });
    }
    if target.points().is_empty() {
        return Err(RegistrationError::EmptyInput {
            which: CloudRole::Target,
        });
    }

    let mut warnings = Vec::new();
    let mut fit_mode = FitMode::Rigid;
    for (points, which) in [
        (source_points, CloudRole::Source),
        (target.points(), CloudRole::Target),
    ] {
        if fit_mode == FitMode::Rigid {
            if let Err(err) = check_geometry(points, which) {
                fit_mode = degrade(err, params.degenerate_policy, &mut warnings)?;
            }
        }
    }

    let max_dist_sq = params
        .max_correspondence_distance
        .map_or(f64::MAX, |d| d * d);

    let mut current_transform = params.initial_transform;
    let mut prev_mse: Option<f64> = None;
    let mut last_change = f64::INFINITY;
    let mut converged = false;
    let mut iterations = 0;

    for iter in 1..=params.max_iterations {
        iterations = iter;

        let transformed = transform_points(source_points, &current_transform);
        let correspondences =
            find_correspondences(&transformed, target, max_dist_sq, params.parallel);
        if correspondences.is_empty() {
            return Err(RegistrationError::NoCorrespondence { iteration: iter });
        }

        let (matched_source, matched_target): (Vec<Point3<f64>>, Vec<Point3<f64>>) =
            correspondences
                .iter()
                .map(|c| (transformed[c.source_idx], c.target_point))
                .unzip();

        if fit_mode == FitMode::Rigid {
            if let Err(err) = check_geometry(&matched_source, CloudRole::Source) {
                fit_mode = degrade(err, params.degenerate_policy, &mut warnings)?;
            }
        }

        let incremental = match fit_mode {
            FitMode::Rigid => compute_rigid_transform(&matched_source, &matched_target)?,
            FitMode::TranslationOnly => compute_translation(&matched_source, &matched_target)?,
        };
        current_transform = incremental.compose(&current_transform).orthonormalized();

        // Residual of this iteration's pairs after applying the update
        let mse = mean_squared(
            matched_source
                .iter()
                .zip(matched_target.iter())
                .map(|(s, t)| (incremental.transform_point(s) - t).norm_squared()),
        );

        let change = prev_mse.map_or(f64::INFINITY, |prev| (prev - mse).abs());
        last_change = change;
        debug!(
            iteration = iter,
            correspondences = correspondences.len(),
            mse,
            change,
            "ICP iteration"
        );

        if change < params.convergence_threshold {
            converged = true;
            break;
        }
        prev_mse = Some(mse);
    }

    if !converged {
        warn!(
            iterations,
            last_change, "ICP reached iteration cap without converging"
        );
        warnings.push(RegistrationWarning::NonConvergence {
            iterations,
            last_change,
        });
    }

    // Final residual against fresh correspondences for the final transform
    let transformed = transform_points(source_points, &current_transform);
    let correspondences = find_correspondences(&transformed, target, max_dist_sq, params.parallel);
    if correspondences.is_empty() {
        return Err(RegistrationError::NoCorrespondence {
            iteration: iterations,
        });
    }
    let (mse, max_error) = compute_error_metrics(&correspondences);

    Ok(IcpResult {
        transform: current_transform,
        mse,
        rms_error: mse.sqrt(),
        max_error,
        iterations,
        converged,
        correspondence_count: correspondences.len(),
        fit_mode,
        warnings,
    })
}

/// Applies the degenerate policy to a geometry error.
fn degrade(
    err: RegistrationError,
    policy: DegeneratePolicy,
    warnings: &mut Vec<RegistrationWarning>,
) -> RegistrationResult<FitMode> {
    match (policy, err) {
        (
            DegeneratePolicy::TranslationOnly,
            RegistrationError::DegenerateGeometry { which, reason, .. },
        ) => {
            warn!(%which, reason, "Degenerate geometry, falling back to translation-only fit");
            warnings.push(RegistrationWarning::TranslationOnly { which, reason });
            Ok(FitMode::TranslationOnly)
        }
        (_, err) => Err(err),
    }
}

fn transform_points(points: &[Point3<f64>], transform: &RigidTransform) -> Vec<Point3<f64>> {
    points.iter().map(|p| transform.transform_point(p)).collect()
}

#[allow(clippy::cast_precision_loss)]
fn mean_squared(distances_sq: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = distances_sq.fold((0.0, 0_usize), |(s, n), d| (s + d, n + 1));
    if count == 0 {
        return f64::MAX;
    }
    sum / count as f64
}

/// Computes mean-squared and max error from correspondences.
fn compute_error_metrics(correspondences: &[Correspondence]) -> (f64, f64) {
    let mse = mean_squared(correspondences.iter().map(|c| c.distance_sq));
    let max_sq = correspondences
        .iter()
        .map(|c| c.distance_sq)
        .fold(0.0, f64::max);
    (mse, max_sq.sqrt())
}
