//! Duration prediction from an owner's task history.
//!
//! The pipeline is: build feature vectors over the owner's tag vocabulary,
//! partition them with k-means, fit one regression per cluster, then blend
//! the cluster predictions weighted by centroid distance. Clustering and
//! regression failures are recovered here; everything else is returned.

pub mod cluster;
pub mod distance;
pub mod ensemble;
pub mod features;
pub mod regression;
pub mod stats;

pub use cluster::{Cluster, ClusterConfig, DEFAULT_MAX_ITERATIONS, KMeansClusterer, choose_k};
pub use distance::{DistanceMeasure, Euclidean};
pub use features::{FeatureVector, TagVocabulary, build_target_vector, build_vector};
pub use regression::{RegressionModel, RegressionStrategy};
pub use stats::{duration_ratio, estimation_timeseries};

use crate::error::{EstimateError, EstimateResult};
use crate::types::{
    AggregateStats, ClusterContribution, ClusterSummary, ClusteringReport, Prediction,
    PredictionSource, TargetTask, TaskRecord,
};
use features::ACTUAL_IDX;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// How a prediction is produced from the clustered history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMode {
    /// Distance-weighted blend of per-cluster regressions.
    #[default]
    Ensemble,
    /// Mean actual duration of the nearest cluster.
    NearestCentroid,
    /// `expected + avg_task_time / 2`, ignoring history.
    Naive,
}

impl EstimationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimationMode::Ensemble => "ensemble",
            EstimationMode::NearestCentroid => "nearest_centroid",
            EstimationMode::Naive => "naive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ensemble" => Some(EstimationMode::Ensemble),
            "nearest_centroid" | "nearest" => Some(EstimationMode::NearestCentroid),
            "naive" => Some(EstimationMode::Naive),
            _ => None,
        }
    }
}

/// Estimator tuning, usually the `estimator` section of the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub regression: RegressionStrategy,
    pub mode: EstimationMode,
    pub max_iterations: usize,
    /// Divide the blended estimate by k, the number of clusters the history
    /// was split into. Older predictions were computed this way.
    pub divide_by_cluster_count: bool,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            regression: RegressionStrategy::default(),
            mode: EstimationMode::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            divide_by_cluster_count: false,
        }
    }
}

/// Estimate used when the history cannot say anything better.
pub fn naive_estimate(expected_duration: f64, stats: &AggregateStats) -> f64 {
    expected_duration + stats.avg_task_time / 2.0
}

/// History turned into vectors and clusters.
struct Partition {
    vocabulary: TagVocabulary,
    points: Vec<FeatureVector>,
    clusters: Vec<Cluster>,
    fallback: bool,
}

/// End-to-end predictor. Holds no state between calls.
#[derive(Debug, Clone)]
pub struct DurationEstimator<D = Euclidean> {
    config: EstimatorConfig,
    clusterer: KMeansClusterer<D>,
}

impl DurationEstimator<Euclidean> {
    pub fn new(config: EstimatorConfig) -> Self {
        Self::with_measure(config, Euclidean)
    }
}

impl<D: DistanceMeasure> DurationEstimator<D> {
    pub fn with_measure(config: EstimatorConfig, measure: D) -> Self {
        let cluster_config = ClusterConfig {
            max_iterations: config.max_iterations,
        };
        Self {
            config,
            clusterer: KMeansClusterer::with_measure(cluster_config, measure),
        }
    }

    /// Partition `history` the way a prediction would.
    pub fn cluster_tasks(&self, history: &[TaskRecord]) -> EstimateResult<ClusteringReport> {
        let partition = self.partition(history)?;
        let clusters = partition
            .clusters
            .into_iter()
            .map(|c| ClusterSummary {
                task_ids: c.members.iter().map(|&i| history[i].id.clone()).collect(),
                centroid: c.centroid,
            })
            .collect::<Vec<_>>();
        Ok(ClusteringReport {
            k: clusters.len(),
            vocabulary: partition.vocabulary.tags().to_vec(),
            fallback: partition.fallback,
            clusters,
        })
    }

    /// Predict the actual duration of `target`, timestamped now.
    pub fn predict(
        &self,
        target: &TargetTask,
        history: &[TaskRecord],
        stats: &AggregateStats,
    ) -> EstimateResult<Prediction> {
        self.predict_at(target, history, stats, chrono::Utc::now().timestamp_millis())
    }

    /// Predict with an explicit request time (epoch ms), used when the
    /// target carries no creation time.
    pub fn predict_at(
        &self,
        target: &TargetTask,
        history: &[TaskRecord],
        stats: &AggregateStats,
        now_ms: i64,
    ) -> EstimateResult<Prediction> {
        if !target.expected_duration.is_finite() || target.expected_duration < 0.0 {
            return Err(EstimateError::invalid_input(format!(
                "expected_duration must be a non-negative number, got {}",
                target.expected_duration
            )));
        }

        if self.config.mode == EstimationMode::Naive {
            return Ok(fallback(target, stats, 0, Vec::new()));
        }
        if history.is_empty() {
            warn!("no task history, using naive estimate");
            return Ok(fallback(target, stats, 0, Vec::new()));
        }

        let created_at = target.created_at.unwrap_or(now_ms);
        let partition = self.partition(history)?;
        match self.config.mode {
            EstimationMode::NearestCentroid => self.nearest_centroid(target, stats, created_at, &partition),
            _ => self.ensemble(target, stats, created_at, &partition),
        }
    }

    fn partition(&self, history: &[TaskRecord]) -> EstimateResult<Partition> {
        if history.is_empty() {
            return Err(EstimateError::invalid_input("no task history to cluster"));
        }
        let vocabulary = TagVocabulary::from_tasks(history);
        let points = history
            .iter()
            .map(|t| build_vector(t, &vocabulary))
            .collect::<EstimateResult<Vec<_>>>()?;

        let k = choose_k(points.len());
        let (clusters, fallback) = match self.clusterer.cluster(&points, k) {
            Ok(clusters) => (clusters, false),
            Err(err) if err.is_recoverable() => {
                warn!(k, error = %err, "clustering failed, using a single cluster");
                (vec![Cluster::whole(&points)], true)
            }
            Err(err) => return Err(err),
        };
        debug!(
            tasks = points.len(),
            tags = vocabulary.len(),
            clusters = clusters.len(),
            "partitioned history"
        );

        Ok(Partition {
            vocabulary,
            points,
            clusters,
            fallback,
        })
    }

    fn ensemble(
        &self,
        target: &TargetTask,
        stats: &AggregateStats,
        created_at: i64,
        partition: &Partition,
    ) -> EstimateResult<Prediction> {
        let base = build_target_vector(target, 0.0, created_at, &partition.vocabulary)?;

        let mut contributions = Vec::with_capacity(partition.clusters.len());
        let mut weights = Vec::new();
        let mut predictions = Vec::new();

        for (index, cluster) in partition.clusters.iter().enumerate() {
            let members: Vec<&FeatureVector> = cluster.points(&partition.points).collect();
            let fitted = self
                .config
                .regression
                .fit(&members)
                .and_then(|model| model.predict(&base));

            match fitted {
                Ok(prediction) => {
                    // The target is placed where its own prediction says it lands.
                    let mut placed = base.clone();
                    placed[ACTUAL_IDX] = prediction;
                    let distance = self.clusterer.measure().distance(&placed, &cluster.centroid)?;
                    debug!(index, size = cluster.len(), prediction, distance, "cluster prediction");

                    weights.push(distance);
                    predictions.push(prediction);
                    contributions.push(ClusterContribution {
                        index,
                        size: cluster.len(),
                        centroid_distance: Some(distance),
                        prediction: Some(prediction),
                        weight: 0.0,
                        skipped: None,
                    });
                }
                Err(err) if err.is_recoverable() => {
                    warn!(index, size = cluster.len(), error = %err, "skipping cluster");
                    contributions.push(ClusterContribution {
                        index,
                        size: cluster.len(),
                        centroid_distance: None,
                        prediction: None,
                        weight: 0.0,
                        skipped: Some(err.to_string()),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        if weights.is_empty() {
            warn!(
                clusters = partition.clusters.len(),
                "no cluster produced a usable prediction, using naive estimate"
            );
            return Ok(fallback(target, stats, partition.clusters.len(), contributions));
        }

        let cluster_count = partition.clusters.len();
        let divisor = self.config.divide_by_cluster_count.then_some(cluster_count);
        let (estimate, shares) = match ensemble::combine(&weights, &predictions, divisor) {
            Ok(combined) => combined,
            Err(err) if err.is_recoverable() => {
                warn!(clusters = cluster_count, error = %err, "ensemble failed, using naive estimate");
                return Ok(fallback(target, stats, cluster_count, contributions));
            }
            Err(err) => return Err(err),
        };
        for (contribution, share) in contributions
            .iter_mut()
            .filter(|c| c.skipped.is_none())
            .zip(shares)
        {
            contribution.weight = share;
        }

        info!(estimate, clusters = cluster_count, used = weights.len(), "ensemble prediction");
        Ok(Prediction {
            estimate,
            source: PredictionSource::Ensemble,
            cluster_count,
            contributions,
        })
    }

    fn nearest_centroid(
        &self,
        target: &TargetTask,
        stats: &AggregateStats,
        created_at: i64,
        partition: &Partition,
    ) -> EstimateResult<Prediction> {
        let placed = build_target_vector(target, stats.avg_task_time, created_at, &partition.vocabulary)?;

        let mut contributions = Vec::with_capacity(partition.clusters.len());
        let mut best: Option<(usize, f64)> = None;
        for (index, cluster) in partition.clusters.iter().enumerate() {
            let distance = self.clusterer.measure().distance(&placed, &cluster.centroid)?;
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((index, distance));
            }
            contributions.push(ClusterContribution {
                index,
                size: cluster.len(),
                centroid_distance: Some(distance),
                prediction: Some(cluster.centroid[ACTUAL_IDX]),
                weight: 0.0,
                skipped: None,
            });
        }

        let Some((nearest, distance)) = best else {
            return Ok(fallback(target, stats, 0, contributions));
        };
        contributions[nearest].weight = 1.0;
        let estimate = partition.clusters[nearest].centroid[ACTUAL_IDX];

        info!(estimate, cluster = nearest, distance, "nearest-centroid prediction");
        Ok(Prediction {
            estimate,
            source: PredictionSource::NearestCentroid,
            cluster_count: partition.clusters.len(),
            contributions,
        })
    }
}

fn fallback(
    target: &TargetTask,
    stats: &AggregateStats,
    cluster_count: usize,
    contributions: Vec<ClusterContribution>,
) -> Prediction {
    Prediction {
        estimate: naive_estimate(target.expected_duration, stats),
        source: PredictionSource::Fallback,
        cluster_count,
        contributions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    fn history() -> Vec<TaskRecord> {
        // Two groups far apart in time, each with a clean linear trend.
        let mut tasks = Vec::new();
        for (i, e) in [100.0, 200.0, 300.0, 400.0].into_iter().enumerate() {
            tasks.push(TaskRecord::new(
                format!("a{}", i),
                "o",
                e,
                2.0 * e,
                T0 + i as i64,
                ["code"],
            ));
        }
        for (i, e) in [100.0, 200.0, 300.0, 400.0].into_iter().enumerate() {
            tasks.push(TaskRecord::new(
                format!("b{}", i),
                "o",
                e,
                e + 50.0,
                T0 + 1_000_000_000 + i as i64,
                ["write"],
            ));
        }
        tasks
    }

    fn stats_of(tasks: &[TaskRecord]) -> AggregateStats {
        AggregateStats::from_tasks(tasks).unwrap()
    }

    #[test]
    fn naive_estimate_adds_half_average() {
        let stats = AggregateStats {
            avg_task_time: 600.0,
            ..Default::default()
        };
        assert_eq!(naive_estimate(1000.0, &stats), 1300.0);
    }

    #[test]
    fn empty_history_falls_back() {
        let estimator = DurationEstimator::new(EstimatorConfig::default());
        let p = estimator
            .predict_at(&TargetTask::new(1000.0, ["x"]), &[], &AggregateStats::default(), T0)
            .unwrap();
        assert_eq!(p.source, PredictionSource::Fallback);
        assert_eq!(p.estimate, 1000.0);
        assert_eq!(p.cluster_count, 0);
    }

    #[test]
    fn clusters_split_by_time() {
        let tasks = history();
        let report = DurationEstimator::new(EstimatorConfig::default())
            .cluster_tasks(&tasks)
            .unwrap();
        assert_eq!(report.k, 2);
        assert!(!report.fallback);
        assert_eq!(report.vocabulary, vec!["code", "write"]);
        let mut groups: Vec<Vec<String>> = report.clusters.iter().map(|c| c.task_ids.clone()).collect();
        groups.sort();
        assert_eq!(groups[0], vec!["a0", "a1", "a2", "a3"]);
        assert_eq!(groups[1], vec!["b0", "b1", "b2", "b3"]);
    }

    #[test]
    fn ensemble_blends_cluster_regressions() {
        let tasks = history();
        let estimator = DurationEstimator::new(EstimatorConfig::default());
        let p = estimator
            .predict_at(&TargetTask::new(250.0, ["code"]), &tasks, &stats_of(&tasks), T0 + 10)
            .unwrap();
        assert_eq!(p.source, PredictionSource::Ensemble);
        assert_eq!(p.cluster_count, 2);

        let mut preds: Vec<f64> = p.contributions.iter().filter_map(|c| c.prediction).collect();
        preds.sort_by(f64::total_cmp);
        assert!((preds[0] - 300.0).abs() < 1e-6);
        assert!((preds[1] - 500.0).abs() < 1e-6);

        let total: f64 = p.contributions.iter().map(|c| c.weight).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(p.estimate > 300.0 && p.estimate < 500.0);
    }

    #[test]
    fn degenerate_clusters_fall_back_to_naive() {
        // Every expected duration equal: no simple fit is possible.
        let tasks: Vec<TaskRecord> = [1200.0, 1000.0, 1400.0, 200.0, 3600.0, 4600.0]
            .into_iter()
            .enumerate()
            .map(|(i, a)| TaskRecord::new(format!("t{}", i), "o", 1000.0, a, T0 + i as i64, Vec::<String>::new()))
            .collect();
        let stats = stats_of(&tasks);
        let p = DurationEstimator::new(EstimatorConfig::default())
            .predict_at(&TargetTask::new(1000.0, Vec::<String>::new()), &tasks, &stats, T0)
            .unwrap();
        assert_eq!(p.source, PredictionSource::Fallback);
        assert!((p.estimate - 2000.0).abs() < 1e-9);
        assert!(p.contributions.iter().all(|c| c.skipped.is_some()));
    }

    /// Group `a` fits exactly; group `b` shares one expected duration, so its
    /// simple regression is singular and the cluster is skipped.
    fn history_with_flat_group() -> Vec<TaskRecord> {
        let mut tasks: Vec<TaskRecord> = history().into_iter().take(4).collect();
        for (i, a) in [200.0, 250.0, 300.0, 350.0].into_iter().enumerate() {
            tasks.push(TaskRecord::new(
                format!("b{}", i),
                "o",
                250.0,
                a,
                T0 + 1_000_000_000 + i as i64,
                ["write"],
            ));
        }
        tasks
    }

    #[test]
    fn skipped_cluster_gets_no_weight() {
        let tasks = history_with_flat_group();
        let p = DurationEstimator::new(EstimatorConfig::default())
            .predict_at(&TargetTask::new(250.0, ["code"]), &tasks, &stats_of(&tasks), T0 + 10)
            .unwrap();
        assert_eq!(p.source, PredictionSource::Ensemble);
        assert_eq!(p.cluster_count, 2);
        assert!((p.estimate - 500.0).abs() < 1e-6);

        let used = p.contributions.iter().find(|c| c.skipped.is_none()).unwrap();
        let skipped = p.contributions.iter().find(|c| c.skipped.is_some()).unwrap();
        assert_eq!(used.weight, 1.0);
        assert_eq!(skipped.weight, 0.0);
        assert_eq!(skipped.prediction, None);
        assert_eq!(skipped.centroid_distance, None);
    }

    #[test]
    fn legacy_division_counts_skipped_clusters() {
        let tasks = history_with_flat_group();
        let config = EstimatorConfig {
            divide_by_cluster_count: true,
            ..Default::default()
        };
        let p = DurationEstimator::new(config)
            .predict_at(&TargetTask::new(250.0, ["code"]), &tasks, &stats_of(&tasks), T0 + 10)
            .unwrap();
        assert_eq!(p.source, PredictionSource::Ensemble);
        assert_eq!(p.cluster_count, 2);
        assert_eq!(p.contributions.iter().filter(|c| c.skipped.is_some()).count(), 1);
        assert!((p.estimate - 250.0).abs() < 1e-6);
    }

    #[test]
    fn nearest_centroid_returns_cluster_mean() {
        let tasks = history();
        let config = EstimatorConfig {
            mode: EstimationMode::NearestCentroid,
            ..Default::default()
        };
        let p = DurationEstimator::new(config)
            .predict_at(
                &TargetTask::new(250.0, ["write"]).with_created_at(T0 + 1_000_000_001),
                &tasks,
                &stats_of(&tasks),
                T0,
            )
            .unwrap();
        assert_eq!(p.source, PredictionSource::NearestCentroid);
        assert!((p.estimate - 300.0).abs() < 1e-9);
        assert_eq!(p.contributions.iter().filter(|c| c.weight == 1.0).count(), 1);
    }

    #[test]
    fn naive_mode_ignores_history() {
        let tasks = history();
        let stats = stats_of(&tasks);
        let config = EstimatorConfig {
            mode: EstimationMode::Naive,
            ..Default::default()
        };
        let p = DurationEstimator::new(config)
            .predict_at(&TargetTask::new(100.0, ["code"]), &tasks, &stats, T0)
            .unwrap();
        assert_eq!(p.source, PredictionSource::Fallback);
        assert!((p.estimate - naive_estimate(100.0, &stats)).abs() < 1e-12);
    }

    #[test]
    fn negative_target_is_rejected() {
        let err = DurationEstimator::new(EstimatorConfig::default())
            .predict_at(&TargetTask::new(-5.0, ["x"]), &history(), &AggregateStats::default(), T0)
            .unwrap_err();
        assert!(matches!(err, EstimateError::InvalidInput(_)));
    }

    #[test]
    fn mode_names() {
        assert_eq!(EstimationMode::from_str("nearest_centroid"), Some(EstimationMode::NearestCentroid));
        assert_eq!(EstimationMode::from_str("bogus"), None);
        assert_eq!(EstimationMode::Naive.as_str(), "naive");
    }
}
