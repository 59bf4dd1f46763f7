//! Per-cluster least-squares models.
//!
//! Both strategies predict the actual duration. Simple regression uses the
//! expected duration alone; multiple regression also uses the tag mask. The
//! raw actual and timestamp slots never enter a design matrix.

use super::features::{ACTUAL_IDX, EXPECTED_IDX, FeatureVector, TAG_OFFSET};
use crate::error::{EstimateError, EstimateResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Relative pivot size below which the normal equations count as singular.
const SINGULAR_TOLERANCE: f64 = 1e-10;

/// Which model to fit inside each cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionStrategy {
    /// `actual ~ a + b * expected`
    #[default]
    Simple,
    /// `actual ~ a + b0 * expected + sum(bi * tag_i)`
    Multiple,
}

impl RegressionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegressionStrategy::Simple => "simple",
            RegressionStrategy::Multiple => "multiple",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "simple" => Some(RegressionStrategy::Simple),
            "multiple" | "ols" => Some(RegressionStrategy::Multiple),
            _ => None,
        }
    }

    /// Fit a model to one cluster's points.
    pub fn fit(&self, points: &[&FeatureVector]) -> EstimateResult<RegressionModel> {
        match self {
            RegressionStrategy::Simple => fit_simple(points),
            RegressionStrategy::Multiple => fit_multiple(points),
        }
    }
}

/// A fitted per-cluster model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegressionModel {
    Simple {
        intercept: f64,
        slope: f64,
    },
    Multiple {
        intercept: f64,
        /// Feature indices the coefficients apply to.
        features: Vec<usize>,
        coefficients: Vec<f64>,
        /// Length of the vectors the model was fitted on.
        dimension: usize,
    },
}

impl RegressionModel {
    /// Predicted actual duration for `point`.
    pub fn predict(&self, point: &[f64]) -> EstimateResult<f64> {
        let value = match self {
            RegressionModel::Simple { intercept, slope } => {
                let x = point.get(EXPECTED_IDX).copied().ok_or_else(|| {
                    EstimateError::invalid_input("point has no expected-duration component")
                })?;
                intercept + slope * x
            }
            RegressionModel::Multiple {
                intercept,
                features,
                coefficients,
                dimension,
            } => {
                if point.len() != *dimension {
                    return Err(EstimateError::DimensionMismatch {
                        left: point.len(),
                        right: *dimension,
                    });
                }
                intercept
                    + features
                        .iter()
                        .zip(coefficients)
                        .map(|(&f, b)| b * point[f])
                        .sum::<f64>()
            }
        };
        if !value.is_finite() {
            return Err(EstimateError::Regression(format!(
                "model produced non-finite prediction {}",
                value
            )));
        }
        Ok(value)
    }
}

fn fit_simple(points: &[&FeatureVector]) -> EstimateResult<RegressionModel> {
    if points.len() < 2 {
        return Err(EstimateError::Regression(format!(
            "simple regression needs at least 2 points, got {}",
            points.len()
        )));
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p[EXPECTED_IDX]).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p[ACTUAL_IDX]).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for p in points {
        let dx = p[EXPECTED_IDX] - mean_x;
        sxx += dx * dx;
        sxy += dx * (p[ACTUAL_IDX] - mean_y);
    }
    if sxx <= SINGULAR_TOLERANCE * mean_x.abs().max(1.0).powi(2) {
        return Err(EstimateError::Regression(
            "expected durations have no spread".to_string(),
        ));
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    debug!(intercept, slope, n = points.len(), "fitted simple regression");
    Ok(RegressionModel::Simple { intercept, slope })
}

/// Predictor columns for multiple regression: expected duration plus every
/// tag slot that varies inside the cluster. Constant columns are collinear
/// with the intercept and are dropped.
fn predictor_columns(points: &[&FeatureVector], dimension: usize) -> Vec<usize> {
    std::iter::once(EXPECTED_IDX)
        .chain(TAG_OFFSET..dimension)
        .filter(|&f| {
            let first = points[0][f];
            points.iter().any(|p| p[f] != first)
        })
        .collect()
}

fn fit_multiple(points: &[&FeatureVector]) -> EstimateResult<RegressionModel> {
    let Some(first) = points.first() else {
        return Err(EstimateError::Regression("no points to fit".to_string()));
    };
    let dimension = first.len();
    if dimension < TAG_OFFSET {
        return Err(EstimateError::invalid_input(format!(
            "feature vectors need at least {} components, got {}",
            TAG_OFFSET, dimension
        )));
    }
    for p in points {
        if p.len() != dimension {
            return Err(EstimateError::DimensionMismatch {
                left: dimension,
                right: p.len(),
            });
        }
    }

    let features = predictor_columns(points, dimension);
    let cols = features.len() + 1;
    if points.len() <= cols {
        return Err(EstimateError::Regression(format!(
            "{} points cannot determine {} coefficients",
            points.len(),
            cols
        )));
    }

    // Normal equations (X^T X) b = X^T y with a leading intercept column.
    let mut xtx = vec![0.0; cols * cols];
    let mut xty = vec![0.0; cols];
    let mut row = vec![0.0; cols];
    for p in points {
        row[0] = 1.0;
        for (j, &f) in features.iter().enumerate() {
            row[j + 1] = p[f];
        }
        let y = p[ACTUAL_IDX];
        for i in 0..cols {
            xty[i] += row[i] * y;
            for j in 0..cols {
                xtx[i * cols + j] += row[i] * row[j];
            }
        }
    }

    let beta = solve(xtx, xty, cols)
        .ok_or_else(|| EstimateError::Regression("design matrix is singular".to_string()))?;

    debug!(coefficients = ?beta, ?features, "fitted multiple regression");
    Ok(RegressionModel::Multiple {
        intercept: beta[0],
        coefficients: beta[1..].to_vec(),
        features,
        dimension,
    })
}

/// Gaussian elimination with partial pivoting. `None` if `a` is singular.
fn solve(mut a: Vec<f64>, mut b: Vec<f64>, n: usize) -> Option<Vec<f64>> {
    // Per-column reference so a tag column is not judged against a duration column.
    let scale: Vec<f64> = (0..n)
        .map(|i| a[i * n + i].abs().max(f64::MIN_POSITIVE))
        .collect();

    for col in 0..n {
        let pivot = (col..n).max_by(|&x, &y| a[x * n + col].abs().total_cmp(&a[y * n + col].abs()))?;
        if a[pivot * n + col].abs() <= SINGULAR_TOLERANCE * scale[col] {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap(col * n + k, pivot * n + k);
            }
            b.swap(col, pivot);
        }
        for r in col + 1..n {
            let factor = a[r * n + col] / a[col * n + col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[r * n + k] -= factor * a[col * n + k];
            }
            b[r] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = b[i];
        for k in i + 1..n {
            sum -= a[i * n + k] * x[k];
        }
        x[i] = sum / a[i * n + i];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(expected: f64, actual: f64, tags: &[f64]) -> FeatureVector {
        let mut v = vec![expected, actual, 0.0];
        v.extend_from_slice(tags);
        v
    }

    fn refs(points: &[FeatureVector]) -> Vec<&FeatureVector> {
        points.iter().collect()
    }

    #[test]
    fn simple_fits_a_line() {
        let points = vec![pt(1.0, 3.0, &[]), pt(2.0, 5.0, &[]), pt(3.0, 7.0, &[])];
        let model = RegressionStrategy::Simple.fit(&refs(&points)).unwrap();
        let RegressionModel::Simple { intercept, slope } = &model else {
            panic!("expected simple model");
        };
        assert!((intercept - 1.0).abs() < 1e-9);
        assert!((slope - 2.0).abs() < 1e-9);
        assert!((model.predict(&[10.0, 0.0, 0.0]).unwrap() - 21.0).abs() < 1e-9);
    }

    #[test]
    fn simple_needs_two_points() {
        let points = vec![pt(1.0, 3.0, &[])];
        assert!(matches!(
            RegressionStrategy::Simple.fit(&refs(&points)),
            Err(EstimateError::Regression(_))
        ));
    }

    #[test]
    fn simple_rejects_constant_expected() {
        let points = vec![pt(1000.0, 1200.0, &[]), pt(1000.0, 800.0, &[])];
        assert!(matches!(
            RegressionStrategy::Simple.fit(&refs(&points)),
            Err(EstimateError::Regression(_))
        ));
    }

    #[test]
    fn multiple_recovers_tag_effect() {
        // actual = 100 + 1.5 * expected + 400 * tag0
        let points: Vec<FeatureVector> = [
            (100.0, 0.0),
            (200.0, 0.0),
            (300.0, 1.0),
            (400.0, 1.0),
            (500.0, 0.0),
            (600.0, 1.0),
        ]
        .iter()
        .map(|&(e, t)| pt(e, 100.0 + 1.5 * e + 400.0 * t, &[t, 0.0]))
        .collect();

        let model = RegressionStrategy::Multiple.fit(&refs(&points)).unwrap();
        let RegressionModel::Multiple { features, coefficients, intercept, .. } = &model else {
            panic!("expected multiple model");
        };
        // the always-zero second tag is dropped
        assert_eq!(features, &vec![EXPECTED_IDX, TAG_OFFSET]);
        assert!((intercept - 100.0).abs() < 1e-6);
        assert!((coefficients[0] - 1.5).abs() < 1e-9);
        assert!((coefficients[1] - 400.0).abs() < 1e-6);

        let y = model.predict(&pt(250.0, 0.0, &[1.0, 0.0])).unwrap();
        assert!((y - 875.0).abs() < 1e-6);
    }

    #[test]
    fn multiple_with_too_few_points_fails() {
        let points = vec![pt(1.0, 2.0, &[1.0]), pt(2.0, 3.0, &[0.0])];
        assert!(matches!(
            RegressionStrategy::Multiple.fit(&refs(&points)),
            Err(EstimateError::Regression(_))
        ));
    }

    #[test]
    fn multiple_detects_collinear_columns() {
        // tag0 == tag1 in every row
        let points: Vec<FeatureVector> = (0..6)
            .map(|i| {
                let t = (i % 2) as f64;
                pt(100.0 * i as f64, 50.0 * i as f64, &[t, t])
            })
            .collect();
        assert!(matches!(
            RegressionStrategy::Multiple.fit(&refs(&points)),
            Err(EstimateError::Regression(_))
        ));
    }

    #[test]
    fn multiple_predict_checks_dimension() {
        let model = RegressionModel::Multiple {
            intercept: 0.0,
            features: vec![0],
            coefficients: vec![1.0],
            dimension: 4,
        };
        assert!(matches!(
            model.predict(&[1.0, 2.0, 3.0]),
            Err(EstimateError::DimensionMismatch { left: 3, right: 4 })
        ));
    }

    #[test]
    fn strategy_names() {
        assert_eq!(RegressionStrategy::from_str("Multiple"), Some(RegressionStrategy::Multiple));
        assert_eq!(RegressionStrategy::from_str("simple"), Some(RegressionStrategy::Simple));
        assert_eq!(RegressionStrategy::from_str("lasso"), None);
        assert_eq!(RegressionStrategy::default().as_str(), "simple");
    }
}
