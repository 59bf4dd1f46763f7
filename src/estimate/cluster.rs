//! Deterministic k-means over task feature vectors.
//!
//! Seeding is the max-distance variant of k-means++: the first seed is the
//! point farthest from the mean of all points, each further seed is the point
//! farthest from its nearest existing seed. Ties always go to the lowest
//! index, so the same input produces the same partition.

use super::distance::{DistanceMeasure, Euclidean, check_dimensions};
use super::features::FeatureVector;
use crate::error::{EstimateError, EstimateResult};
use serde::Serialize;
use tracing::debug;

/// Default cap on assignment/update rounds.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Heuristic cluster count: `round(sqrt(n / 2))`, at least 1 for `n >= 1`.
pub fn choose_k(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let k = (n as f64 / 2.0).sqrt().round() as usize;
    k.clamp(1, n)
}

/// Element-wise mean of `points`. Returns an empty vector for no points.
pub fn centroid<'a>(points: impl IntoIterator<Item = &'a FeatureVector>) -> FeatureVector {
    let mut sum: FeatureVector = Vec::new();
    let mut count = 0usize;
    for point in points {
        if sum.is_empty() {
            sum = vec![0.0; point.len()];
        }
        for (s, v) in sum.iter_mut().zip(point) {
            *s += v;
        }
        count += 1;
    }
    if count > 0 {
        for s in sum.iter_mut() {
            *s /= count as f64;
        }
    }
    sum
}

/// A group of points plus their centroid.
///
/// Members are indices into the point slice the cluster was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub members: Vec<usize>,
    pub centroid: FeatureVector,
}

impl Cluster {
    /// One cluster holding every point. Used when k-means cannot run.
    pub fn whole(points: &[FeatureVector]) -> Self {
        Self {
            members: (0..points.len()).collect(),
            centroid: centroid(points),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The member vectors, resolved against the original point slice.
    pub fn points<'a>(&'a self, all: &'a [FeatureVector]) -> impl Iterator<Item = &'a FeatureVector> + 'a {
        self.members.iter().map(move |&i| &all[i])
    }
}

/// Clustering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Hard upper bound on assignment/update rounds.
    pub max_iterations: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// K-means with a pluggable distance measure.
#[derive(Debug, Clone)]
pub struct KMeansClusterer<D = Euclidean> {
    config: ClusterConfig,
    measure: D,
}

impl KMeansClusterer<Euclidean> {
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            config,
            measure: Euclidean,
        }
    }
}

impl<D: DistanceMeasure> KMeansClusterer<D> {
    pub fn with_measure(config: ClusterConfig, measure: D) -> Self {
        Self { config, measure }
    }

    pub fn measure(&self) -> &D {
        &self.measure
    }

    /// Partition `points` into `k` non-empty clusters.
    ///
    /// Fails with `InvalidInput` for an empty point list or `k` outside
    /// `1..=n`, `DimensionMismatch` for ragged input, and `Clustering` when a
    /// cluster runs empty (including fewer distinct points than `k`).
    pub fn cluster(&self, points: &[FeatureVector], k: usize) -> EstimateResult<Vec<Cluster>> {
        if points.is_empty() {
            return Err(EstimateError::invalid_input("cannot cluster an empty point list"));
        }
        let n = points.len();
        if k == 0 || k > n {
            return Err(EstimateError::invalid_input(format!(
                "cluster count {} out of range for {} points",
                k, n
            )));
        }
        for point in &points[1..] {
            check_dimensions(&points[0], point)?;
        }
        if self.config.max_iterations == 0 {
            return Err(EstimateError::invalid_input("max_iterations must be at least 1"));
        }

        let mut centroids = self.seed(points, k)?;
        let mut assignments: Vec<usize> = Vec::new();

        for iteration in 0..self.config.max_iterations {
            let next = self.assign(points, &centroids)?;

            let mut counts = vec![0usize; k];
            for &c in &next {
                counts[c] += 1;
            }
            if let Some(empty) = counts.iter().position(|&c| c == 0) {
                return Err(EstimateError::Clustering(format!(
                    "cluster {} became empty at iteration {}",
                    empty, iteration
                )));
            }

            if next == assignments {
                debug!(iteration, k, "k-means converged");
                break;
            }
            assignments = next;

            centroids = (0..k)
                .map(|c| {
                    centroid(
                        assignments
                            .iter()
                            .zip(points)
                            .filter(|(a, _)| **a == c)
                            .map(|(_, p)| p),
                    )
                })
                .collect();

            if iteration + 1 == self.config.max_iterations {
                debug!(
                    max_iterations = self.config.max_iterations,
                    "k-means stopped at iteration cap"
                );
            }
        }

        let mut clusters: Vec<Cluster> = centroids
            .into_iter()
            .map(|centroid| Cluster {
                members: Vec::new(),
                centroid,
            })
            .collect();
        for (i, &c) in assignments.iter().enumerate() {
            clusters[c].members.push(i);
        }
        Ok(clusters)
    }

    fn seed(&self, points: &[FeatureVector], k: usize) -> EstimateResult<Vec<FeatureVector>> {
        let mean = centroid(points);
        let first = self.farthest(points, |p| self.measure.distance(p, &mean))?;
        let mut seeds = vec![points[first].clone()];

        while seeds.len() < k {
            let mut best = 0usize;
            let mut best_dist = f64::NEG_INFINITY;
            for (i, point) in points.iter().enumerate() {
                let d = self.nearest(point, &seeds)?.1;
                if d > best_dist {
                    best = i;
                    best_dist = d;
                }
            }
            if best_dist <= 0.0 {
                return Err(EstimateError::Clustering(format!(
                    "only {} distinct points for {} clusters",
                    seeds.len(),
                    k
                )));
            }
            seeds.push(points[best].clone());
        }
        Ok(seeds)
    }

    fn farthest<F>(&self, points: &[FeatureVector], dist: F) -> EstimateResult<usize>
    where
        F: Fn(&FeatureVector) -> EstimateResult<f64>,
    {
        let mut best = 0usize;
        let mut best_dist = f64::NEG_INFINITY;
        for (i, point) in points.iter().enumerate() {
            let d = dist(point)?;
            if d > best_dist {
                best = i;
                best_dist = d;
            }
        }
        Ok(best)
    }

    /// Index of and distance to the nearest centroid. Ties go to the lower index.
    fn nearest(&self, point: &[f64], centroids: &[FeatureVector]) -> EstimateResult<(usize, f64)> {
        let mut best = (0usize, f64::INFINITY);
        for (j, c) in centroids.iter().enumerate() {
            let d = self.measure.distance(point, c)?;
            if d < best.1 {
                best = (j, d);
            }
        }
        Ok(best)
    }

    fn assign(&self, points: &[FeatureVector], centroids: &[FeatureVector]) -> EstimateResult<Vec<usize>> {
        points
            .iter()
            .map(|p| self.nearest(p, centroids).map(|(j, _)| j))
            .collect()
    }
}
