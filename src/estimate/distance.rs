//! Distance measures between feature vectors.

use crate::error::{EstimateError, EstimateResult};

/// A symmetric, non-negative distance between two equal-length vectors.
///
/// Implementations must reject vectors of different length with
/// [`EstimateError::DimensionMismatch`].
pub trait DistanceMeasure {
    fn distance(&self, a: &[f64], b: &[f64]) -> EstimateResult<f64>;
}

/// Plain Euclidean distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Euclidean;

impl DistanceMeasure for Euclidean {
    fn distance(&self, a: &[f64], b: &[f64]) -> EstimateResult<f64> {
        euclidean(a, b)
    }
}

impl<F> DistanceMeasure for F
where
    F: Fn(&[f64], &[f64]) -> EstimateResult<f64>,
{
    fn distance(&self, a: &[f64], b: &[f64]) -> EstimateResult<f64> {
        self(a, b)
    }
}

/// Fail with `DimensionMismatch` unless both vectors have the same length.
pub fn check_dimensions(a: &[f64], b: &[f64]) -> EstimateResult<()> {
    if a.len() != b.len() {
        return Err(EstimateError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(())
}

/// `sqrt(sum((a_i - b_i)^2))`.
pub fn euclidean(a: &[f64], b: &[f64]) -> EstimateResult<f64> {
    check_dimensions(a, b)?;
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum();
    Ok(sum.sqrt())
}
