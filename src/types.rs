//! Core types for the task estimator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A completed task as seen by the estimator.
///
/// Durations are in milliseconds. `created_at` is epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub owner_id: String,
    pub expected_duration: f64,
    pub actual_duration: f64,
    pub created_at: i64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl TaskRecord {
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        expected_duration: f64,
        actual_duration: f64,
        created_at: i64,
        tags: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            expected_duration,
            actual_duration,
            created_at,
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the task ran longer than planned.
    pub fn is_over(&self) -> bool {
        self.actual_duration > self.expected_duration
    }
}

/// A task that has not run yet and needs a duration estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetTask {
    pub expected_duration: f64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Creation time; the request time is used when absent.
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl TargetTask {
    pub fn new(expected_duration: f64, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            expected_duration,
            tags: tags.into_iter().map(Into::into).collect(),
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Running summary of an owner's completed tasks.
///
/// `total_under_tasks + total_over_tasks == total_tasks_completed` holds
/// after every update applied through `estimate::stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_tasks_completed: u32,
    pub total_under_tasks: u32,
    pub total_over_tasks: u32,
    /// Running mean of actual durations.
    pub avg_task_time: f64,
    /// Running mean of actual/expected.
    pub task_est_factor: f64,
}

/// Whether an owner is a single user or a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    #[default]
    User,
    Team,
}

impl OwnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::User => "user",
            OwnerKind::Team => "team",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(OwnerKind::User),
            "team" => Some(OwnerKind::Team),
            _ => None,
        }
    }
}

/// A user or team that owns tasks and carries aggregate statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub name: String,
    pub kind: OwnerKind,
    #[serde(flatten)]
    pub stats: AggregateStats,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One point of an owner's estimation-factor history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesPoint {
    /// RFC 3339 UTC timestamp of the task that produced this point.
    pub name: String,
    /// Running mean of actual/expected up to and including this task.
    pub value: f64,
}

/// A tag set encoded against an owner's vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagMask {
    pub vocabulary: Vec<String>,
    /// `1.0` where the vocabulary tag was requested, else `0.0`.
    pub mask: Vec<f64>,
}

/// Where a prediction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    Ensemble,
    NearestCentroid,
    /// `expected + avg_task_time / 2`, used without history or usable clusters.
    Fallback,
}

impl PredictionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionSource::Ensemble => "ensemble",
            PredictionSource::NearestCentroid => "nearest_centroid",
            PredictionSource::Fallback => "fallback",
        }
    }
}

/// How one cluster took part in a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterContribution {
    pub index: usize,
    pub size: usize,
    pub centroid_distance: Option<f64>,
    pub prediction: Option<f64>,
    /// Final share of the estimate; zero for skipped clusters.
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

/// A duration estimate plus how it was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub estimate: f64,
    pub source: PredictionSource,
    pub cluster_count: usize,
    #[serde(default)]
    pub contributions: Vec<ClusterContribution>,
}

/// One cluster of an owner's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub centroid: Vec<f64>,
    pub task_ids: Vec<String>,
}

/// Partition of an owner's history, for inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringReport {
    pub k: usize,
    /// Tag order of the centroid tag slots.
    pub vocabulary: Vec<String>,
    /// True when k-means failed and every task was put in one cluster.
    pub fallback: bool,
    pub clusters: Vec<ClusterSummary>,
}
