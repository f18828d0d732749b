//! Held-out quality of a fitted price model.
//!
//! R² drives model selection; RMSE and MAE are kept alongside it in the
//! artifact so a training run can be judged in price units as well.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Regression metrics over paired truth/prediction vectors.
///
/// All functions panic if the two views differ in length, and return `0.0`
/// for empty input.
pub struct Metrics;

impl Metrics {
    /// Mean of `f(truth - prediction)` over all pairs.
    fn mean_residual(
        y_true: ArrayView1<'_, f64>,
        y_pred: ArrayView1<'_, f64>,
        f: impl Fn(f64) -> f64,
    ) -> f64 {
        assert_eq!(
            y_true.len(),
            y_pred.len(),
            "Arrays must have the same length"
        );
        if y_true.is_empty() {
            return 0.0;
        }
        let total: f64 = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(&t, &p)| f(t - p))
            .sum();
        total / y_true.len() as f64
    }

    /// Mean squared error.
    pub fn mse(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
        Self::mean_residual(y_true, y_pred, |r| r * r)
    }

    /// Root of [`Self::mse`], in price units.
    pub fn rmse(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
        Self::mse(y_true, y_pred).sqrt()
    }

    /// Mean absolute error, in price units.
    pub fn mae(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
        Self::mean_residual(y_true, y_pred, f64::abs)
    }

    /// Coefficient of determination, `1 - SS_res / SS_tot`.
    ///
    /// At most 1. Negative when the model does worse than the mean of
    /// `y_true`; that is a valid score, not an error. A constant `y_true`
    /// scores 1 for an exact fit and 0 otherwise.
    pub fn r_squared(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
        assert_eq!(
            y_true.len(),
            y_pred.len(),
            "Arrays must have the same length"
        );
        if y_true.is_empty() {
            return 0.0;
        }

        let mean = y_true.sum() / y_true.len() as f64;
        let ss_res = Self::mse(y_true, y_pred) * y_true.len() as f64;
        let ss_tot: f64 = y_true.iter().map(|&t| (t - mean).powi(2)).sum();

        if ss_tot == 0.0 {
            return if ss_res == 0.0 { 1.0 } else { 0.0 };
        }
        1.0 - ss_res / ss_tot
    }

    /// Evaluate every metric on one held-out partition.
    pub fn calculate_all(
        y_true: ArrayView1<'_, f64>,
        y_pred: ArrayView1<'_, f64>,
    ) -> RegressionMetrics {
        let mse = Self::mse(y_true, y_pred);
        RegressionMetrics {
            mse,
            rmse: mse.sqrt(),
            mae: Self::mae(y_true, y_pred),
            r_squared: Self::r_squared(y_true, y_pred),
        }
    }
}

/// Held-out metrics of one model, stored in the trained artifact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r_squared: f64,
}

impl RegressionMetrics {
    /// Metrics carrying only an R² score.
    pub fn from_score(r_squared: f64) -> Self {
        Self {
            mse: f64::NAN,
            rmse: f64::NAN,
            mae: f64::NAN,
            r_squared,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_perfect_prediction() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        let m = Metrics::calculate_all(y.view(), y.view());
        assert_eq!(m.mse, 0.0);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.r_squared, 1.0);
    }

    #[test]
    fn test_mean_prediction_scores_zero() {
        let y = array![1.0, 2.0, 3.0];
        let p = array![2.0, 2.0, 2.0];
        assert!(Metrics::r_squared(y.view(), p.view()).abs() < 1e-12);
    }

    #[test]
    fn test_negative_r_squared() {
        let y = array![1.0, 2.0, 3.0];
        let p = array![3.0, 2.0, 1.0];
        assert!((Metrics::r_squared(y.view(), p.view()) - (-3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_errors_in_price_units() {
        let y = array![100_000.0, 200_000.0];
        let p = array![110_000.0, 170_000.0];
        let m = Metrics::calculate_all(y.view(), p.view());
        assert!((m.mae - 20_000.0).abs() < 1e-6);
        assert!((m.mse - 500_000_000.0).abs() < 1e-3);
        assert!((m.rmse - 500_000_000f64.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_constant_target() {
        let y = array![5.0, 5.0];
        assert_eq!(Metrics::r_squared(y.view(), y.view()), 1.0);
        assert_eq!(Metrics::r_squared(y.view(), array![5.0, 6.0].view()), 0.0);
    }

    #[test]
    fn test_from_score_keeps_only_r_squared() {
        let m = RegressionMetrics::from_score(0.8);
        assert_eq!(m.r_squared, 0.8);
        assert!(m.rmse.is_nan());
    }

    #[test]
    #[should_panic(expected = "same length")]
    fn test_length_mismatch_panics() {
        let y = array![1.0, 2.0];
        let p = array![1.0];
        Metrics::mse(y.view(), p.view());
    }
}
