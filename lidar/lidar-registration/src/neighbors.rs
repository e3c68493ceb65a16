//! Nearest-neighbor search over the target cloud.
//!
//! [`TargetIndex`] owns a copy of the target points and answers
//! nearest-neighbor queries either through a KD-tree (the default, O(log n)
//! per query) or by exhaustive scan. The scan is the reference used to check
//! the tree in tests.

use std::collections::HashSet;

use kiddo::{ImmutableKdTree, SquaredEuclidean};
use lidar_types::Point3;
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Nearest-neighbor search strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SearchMethod {
    /// KD-tree acceleration.
    #[default]
    KdTree,
    /// Exhaustive scan over every target point.
    BruteForce,
}

/// The closest target point to a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index into the target cloud.
    pub index: usize,
    /// Squared Euclidean distance to the query.
    pub distance_sq: f64,
}

/// Anything that can answer nearest-neighbor queries against a fixed set of
/// target points.
pub trait NeighborSearch: Sync {
    /// Returns the nearest target point, or `None` if the index is empty.
    fn nearest(&self, query: &Point3<f64>) -> Option<Neighbor>;

    /// Target points, addressable by [`Neighbor::index`].
    fn points(&self) -> &[Point3<f64>];
}

/// A source/target pairing found by nearest-neighbor search.
#[derive(Debug, Clone, Copy)]
pub struct Correspondence {
    /// Index into the (transformed) source points.
    pub source_idx: usize,
    /// The matched target point.
    pub target_point: Point3<f64>,
    /// Squared distance between the pair.
    pub distance_sq: f64,
}

/// Exhaustive nearest-neighbor search.
#[derive(Debug, Clone)]
pub struct BruteForceIndex {
    points: Vec<Point3<f64>>,
}

impl BruteForceIndex {
    /// Creates an index over a copy of `points`.
    #[must_use]
    pub fn new(points: &[Point3<f64>]) -> Self {
        Self {
            points: points.to_vec(),
        }
    }
}

impl NeighborSearch for BruteForceIndex {
    fn nearest(&self, query: &Point3<f64>) -> Option<Neighbor> {
        let mut best: Option<Neighbor> = None;
        for (index, p) in self.points.iter().enumerate() {
            let distance_sq = (p - query).norm_squared();
            if distance_sq.is_nan() {
                continue;
            }
            if best.is_none_or(|b| distance_sq < b.distance_sq) {
                best = Some(Neighbor { index, distance_sq });
            }
        }
        best
    }

    fn points(&self) -> &[Point3<f64>] {
        &self.points
    }
}

/// KD-tree nearest-neighbor search.
///
/// Built once as a balanced immutable tree, which tolerates many points
/// sharing a coordinate (ground planes, walls). Exact duplicate positions and
/// non-finite points are left out of the tree; a query reports the first
/// point at the nearest position, as the exhaustive scan does.
pub struct KdTreeIndex {
    tree: Option<ImmutableKdTree<f64, 3>>,
    /// Tree item to index of the first point at that position.
    first_index: Vec<usize>,
    points: Vec<Point3<f64>>,
}

impl KdTreeIndex {
    /// Builds a KD-tree over a copy of `points`.
    #[must_use]
    pub fn new(points: &[Point3<f64>]) -> Self {
        let mut seen = HashSet::with_capacity(points.len());
        let mut positions = Vec::with_capacity(points.len());
        let mut first_index = Vec::with_capacity(points.len());
        for (i, p) in points.iter().enumerate() {
            if !p.coords.iter().all(|v| v.is_finite()) {
                continue;
            }
            if seen.insert([p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]) {
                positions.push([p.x, p.y, p.z]);
                first_index.push(i);
            }
        }

        let tree = (!positions.is_empty()).then(|| ImmutableKdTree::new_from_slice(&positions));
        Self {
            tree,
            first_index,
            points: points.to_vec(),
        }
    }

    /// Number of distinct finite positions held by the tree.
    #[must_use]
    pub fn distinct_positions(&self) -> usize {
        self.first_index.len()
    }
}

impl std::fmt::Debug for KdTreeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KdTreeIndex")
            .field("points", &self.points.len())
            .field("distinct_positions", &self.first_index.len())
            .finish_non_exhaustive()
    }
}

impl NeighborSearch for KdTreeIndex {
    fn nearest(&self, query: &Point3<f64>) -> Option<Neighbor> {
        let tree = self.tree.as_ref()?;
        let nearest = tree.nearest_one::<SquaredEuclidean>(&[query.x, query.y, query.z]);
        #[allow(clippy::cast_possible_truncation)]
        let item = nearest.item as usize;
        Some(Neighbor {
            index: self.first_index[item],
            distance_sq: nearest.distance,
        })
    }

    fn points(&self) -> &[Point3<f64>] {
        &self.points
    }
}

/// A target cloud prepared for repeated registration.
///
/// Building the index once and reusing it across calibration cycles avoids
/// rebuilding the KD-tree for every incoming frame.
#[derive(Debug)]
pub enum TargetIndex {
    /// KD-tree backed.
    KdTree(KdTreeIndex),
    /// Exhaustive scan.
    BruteForce(BruteForceIndex),
}

impl TargetIndex {
    /// Builds an index over `points` with the given strategy.
    #[must_use]
    pub fn build(points: &[Point3<f64>], method: SearchMethod) -> Self {
        match method {
            SearchMethod::KdTree => Self::KdTree(KdTreeIndex::new(points)),
            SearchMethod::BruteForce => Self::BruteForce(BruteForceIndex::new(points)),
        }
    }

    /// The strategy this index uses.
    #[must_use]
    pub const fn method(&self) -> SearchMethod {
        match self {
            Self::KdTree(_) => SearchMethod::KdTree,
            Self::BruteForce(_) => SearchMethod::BruteForce,
        }
    }

    /// Number of indexed target points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points().len()
    }

    /// Returns `true` if the index holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points().is_empty()
    }
}

impl NeighborSearch for TargetIndex {
    fn nearest(&self, query: &Point3<f64>) -> Option<Neighbor> {
        match self {
            Self::KdTree(index) => index.nearest(query),
            Self::BruteForce(index) => index.nearest(query),
        }
    }

    fn points(&self) -> &[Point3<f64>] {
        match self {
            Self::KdTree(index) => index.points(),
            Self::BruteForce(index) => index.points(),
        }
    }
}

/// Finds the nearest target point for every source point.
///
/// Source points whose nearest neighbor is farther than `max_dist_sq` are
/// left out. The output is ordered by source index whether or not the
/// search runs in parallel.
pub fn find_correspondences<S: NeighborSearch + ?Sized>(
    transformed_source: &[Point3<f64>],
    index: &S,
    max_dist_sq: f64,
    parallel: bool,
) -> Vec<Correspondence> {
    let matcher = |(source_idx, p): (usize, &Point3<f64>)| {
        let nearest = index.nearest(p)?;
        (nearest.distance_sq <= max_dist_sq).then(|| Correspondence {
            source_idx,
            target_point: index.points()[nearest.index],
            distance_sq: nearest.distance_sq,
        })
    };

    if parallel {
        transformed_source
            .par_iter()
            .enumerate()
            .filter_map(matcher)
            .collect()
    } else {
        transformed_source
            .iter()
            .enumerate()
            .filter_map(matcher)
            .collect()
    }
}
