//! Combining per-cluster predictions into one estimate.

use crate::error::{EstimateError, EstimateResult};

/// Min-max normalization to `[0, 1]`.
///
/// All-equal input (including a single weight) maps to all zeros.
pub fn normalize_weights(weights: &[f64]) -> Vec<f64> {
    let min = weights.iter().copied().fold(f64::INFINITY, f64::min);
    let max = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if weights.is_empty() || range == 0.0 || !range.is_finite() {
        return vec![0.0; weights.len()];
    }
    weights.iter().map(|w| (w - min) / range).collect()
}

/// `exp(z_i) / sum(exp(z_j))`, shifted by the maximum for stability.
pub fn softmax(values: &[f64]) -> Vec<f64> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Weighted combination of cluster predictions.
///
/// `weights` are raw per-cluster weights (centroid distances); they are
/// min-max normalized and softmaxed before use. With `cluster_count` set the
/// sum is further divided by it. That count is the owner's full k, including
/// clusters whose regression was skipped, so it may exceed `weights.len()`.
///
/// Returns the estimate and the final softmax weights.
pub fn combine(
    weights: &[f64],
    predictions: &[f64],
    cluster_count: Option<usize>,
) -> EstimateResult<(f64, Vec<f64>)> {
    if weights.len() != predictions.len() {
        return Err(EstimateError::DimensionMismatch {
            left: weights.len(),
            right: predictions.len(),
        });
    }
    if weights.is_empty() {
        return Err(EstimateError::invalid_input("no cluster predictions to combine"));
    }

    let shares = softmax(&normalize_weights(weights));
    let mut estimate: f64 = shares.iter().zip(predictions).map(|(s, p)| s * p).sum();
    if let Some(k) = cluster_count {
        if k < shares.len() {
            return Err(EstimateError::invalid_input(format!(
                "cluster count {} is smaller than the {} predictions",
                k,
                shares.len()
            )));
        }
        estimate /= k as f64;
    }
    if !estimate.is_finite() {
        return Err(EstimateError::Regression(format!(
            "ensemble produced a non-finite estimate from {} clusters",
            shares.len()
        )));
    }
    Ok((estimate, shares))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn normalize_maps_to_unit_range() {
        assert_eq!(normalize_weights(&[2.0, 4.0, 6.0]), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn equal_weights_normalize_to_zero() {
        assert_eq!(normalize_weights(&[3.0, 3.0, 3.0]), vec![0.0, 0.0, 0.0]);
        assert_eq!(normalize_weights(&[7.0]), vec![0.0]);
        assert!(normalize_weights(&[]).is_empty());
    }

    #[test]
    fn equal_weights_give_uniform_shares() {
        let (_, shares) = combine(&[5.0, 5.0, 5.0, 5.0], &[1.0, 2.0, 3.0, 4.0], None).unwrap();
        for s in shares {
            assert!(close(s, 0.25));
        }
    }

    #[test]
    fn softmax_sums_to_one() {
        let s = softmax(&[0.0, 0.3, 1.0]);
        assert!(close(s.iter().sum::<f64>(), 1.0));
        assert!(s[2] > s[1] && s[1] > s[0]);
    }

    #[test]
    fn farther_clusters_get_more_weight() {
        let (estimate, shares) = combine(&[1.0, 10.0], &[100.0, 200.0], None).unwrap();
        let e = std::f64::consts::E;
        assert!(close(shares[0], 1.0 / (1.0 + e)));
        assert!(close(shares[1], e / (1.0 + e)));
        assert!(close(estimate, (100.0 + 200.0 * e) / (1.0 + e)));
    }

    #[test]
    fn divide_by_count_scales_estimate() {
        let (plain, _) = combine(&[1.0, 1.0], &[300.0, 500.0], None).unwrap();
        let (legacy, _) = combine(&[1.0, 1.0], &[300.0, 500.0], Some(2)).unwrap();
        assert!(close(plain, 400.0));
        assert!(close(legacy, 200.0));
    }

    #[test]
    fn divide_by_count_includes_skipped_clusters() {
        // One of three clusters produced a prediction.
        let (estimate, shares) = combine(&[7.0], &[900.0], Some(3)).unwrap();
        assert_eq!(shares, vec![1.0]);
        assert!(close(estimate, 300.0));
        assert!(matches!(
            combine(&[1.0, 2.0], &[1.0, 2.0], Some(1)),
            Err(EstimateError::InvalidInput(_))
        ));
    }

    #[test]
    fn overflowing_blend_is_a_regression_error() {
        let err = combine(&[1.0, 2.0], &[f64::INFINITY, 100.0], None).unwrap_err();
        assert!(matches!(err, EstimateError::Regression(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn single_cluster_returns_its_prediction() {
        let (estimate, shares) = combine(&[42.0], &[1234.5], None).unwrap();
        assert_eq!(shares, vec![1.0]);
        assert!(close(estimate, 1234.5));
    }

    #[test]
    fn length_mismatch_and_empty_input() {
        assert_eq!(
            combine(&[1.0, 2.0], &[1.0], None).unwrap_err(),
            EstimateError::DimensionMismatch { left: 2, right: 1 }
        );
        assert!(matches!(combine(&[], &[], None), Err(EstimateError::InvalidInput(_))));
    }
}
