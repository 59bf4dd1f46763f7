//! Feature vectors and the per-owner tag vocabulary.
//!
//! A task becomes `[expected, actual, created_at, tag_mask...]`. The tag mask
//! has one slot per tag in the owner's vocabulary, in lexicographic order, so
//! every task of one owner maps to a vector of the same length.

use crate::error::{EstimateError, EstimateResult};
use crate::types::{TargetTask, TaskRecord};
use serde::Serialize;
use std::collections::BTreeSet;

/// Numeric representation of a task.
pub type FeatureVector = Vec<f64>;

pub const EXPECTED_IDX: usize = 0;
pub const ACTUAL_IDX: usize = 1;
pub const CREATED_AT_IDX: usize = 2;
/// Index of the first tag slot.
pub const TAG_OFFSET: usize = 3;

/// Ordered, duplicate-free set of the tags an owner has used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TagVocabulary {
    tags: Vec<String>,
}

impl TagVocabulary {
    pub fn new(tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let set: BTreeSet<String> = tags.into_iter().map(Into::into).collect();
        Self {
            tags: set.into_iter().collect(),
        }
    }

    /// Union of the tags carried by `tasks`.
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a TaskRecord>) -> Self {
        Self::new(tasks.into_iter().flat_map(|t| t.tags.iter().cloned()))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn position(&self, tag: &str) -> Option<usize> {
        self.tags.binary_search_by(|t| t.as_str().cmp(tag)).ok()
    }

    /// Length of every feature vector built against this vocabulary.
    pub fn dimension(&self) -> usize {
        TAG_OFFSET + self.tags.len()
    }

    /// Indicator vector over the vocabulary. Tags outside it are ignored.
    pub fn mask(&self, tags: &BTreeSet<String>) -> Vec<f64> {
        self.tags
            .iter()
            .map(|t| if tags.contains(t) { 1.0 } else { 0.0 })
            .collect()
    }
}

fn check_duration(field: &str, value: f64) -> EstimateResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(EstimateError::invalid_input(format!(
            "{} must be a non-negative number, got {}",
            field, value
        )));
    }
    Ok(())
}

fn assemble(
    expected: f64,
    actual: f64,
    created_at: i64,
    tags: &BTreeSet<String>,
    vocabulary: &TagVocabulary,
) -> FeatureVector {
    let mut point = Vec::with_capacity(vocabulary.dimension());
    point.resize(TAG_OFFSET, 0.0);
    point[EXPECTED_IDX] = expected;
    point[ACTUAL_IDX] = actual;
    point[CREATED_AT_IDX] = created_at as f64;
    point.extend(vocabulary.mask(tags));
    point
}

/// Build the feature vector of a completed task.
pub fn build_vector(task: &TaskRecord, vocabulary: &TagVocabulary) -> EstimateResult<FeatureVector> {
    check_duration("expected_duration", task.expected_duration)?;
    check_duration("actual_duration", task.actual_duration)?;
    Ok(assemble(
        task.expected_duration,
        task.actual_duration,
        task.created_at,
        &task.tags,
        vocabulary,
    ))
}

/// Build the feature vector of a not-yet-run task.
///
/// The actual-duration slot is filled with `actual`, which the caller picks
/// (a cluster prediction, an owner average, or zero).
pub fn build_target_vector(
    target: &TargetTask,
    actual: f64,
    created_at: i64,
    vocabulary: &TagVocabulary,
) -> EstimateResult<FeatureVector> {
    check_duration("expected_duration", target.expected_duration)?;
    check_duration("actual_duration", actual)?;
    Ok(assemble(
        target.expected_duration,
        actual,
        created_at,
        &target.tags,
        vocabulary,
    ))
}
