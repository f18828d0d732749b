//! Best-of-N model selection.
//!
//! Hyperparameter sweeps are expressed as a finite list of candidate
//! configurations scored independently. Candidates may be evaluated in
//! parallel, but scores are always gathered back in candidate order so the
//! winner does not depend on scheduling.

use crate::config::TrainingConfig;
use crate::dataset::k_fold;
use crate::error::{PipelineError, Result};
use crate::metrics::Metrics;
use crate::model::{InferenceModel, Kernel, SvrConfig, SvrRegressor};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use tracing::debug;

/// Return the candidate with the highest score.
///
/// Ties keep the earliest candidate. NaN scores never win over a real
/// score. `None` only for an empty input.
pub fn best_of<C, I>(candidates: I) -> Option<(C, f64)>
where
    I: IntoIterator<Item = (C, f64)>,
{
    let mut best: Option<(C, f64)> = None;
    for (candidate, score) in candidates {
        let replace = match &best {
            None => true,
            Some((_, best_score)) => rank(score) > rank(*best_score),
        };
        if replace {
            best = Some((candidate, score));
        }
    }
    best
}

fn rank(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

/// Mean validation R² of `config` over contiguous K folds of `(x, y)`.
pub fn cross_val_score(config: &SvrConfig, x: &Array2<f64>, y: &Array1<f64>, folds: usize) -> Result<f64> {
    if folds < 2 || folds > x.nrows() {
        return Err(PipelineError::training(
            x.nrows(),
            format!("cannot run {}-fold cross-validation", folds),
        ));
    }

    let mut total = 0.0;
    for (train, validation) in k_fold(x.nrows(), folds) {
        let model = SvrRegressor::new(*config).fit(
            &x.select(Axis(0), &train),
            &y.select(Axis(0), &train),
        )?;
        let preds = model.predict_batch(&x.select(Axis(0), &validation));
        let truth = y.select(Axis(0), &validation);
        total += Metrics::r_squared(truth.view(), preds.view());
    }
    Ok(total / folds as f64)
}

/// Exhaustive search over kernel × C with K-fold cross-validation.
#[derive(Debug, Clone, PartialEq)]
pub struct SvrGridSearch {
    kernels: Vec<Kernel>,
    c_values: Vec<f64>,
    epsilon: f64,
    folds: usize,
}

/// Outcome of a grid search: the winning configuration and every
/// candidate's mean CV score in grid order.
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub best: SvrConfig,
    pub best_score: f64,
    pub scores: Vec<(SvrConfig, f64)>,
}

impl SvrGridSearch {
    pub fn new(kernels: Vec<Kernel>, c_values: Vec<f64>) -> Self {
        Self {
            kernels,
            c_values,
            epsilon: SvrConfig::default().epsilon,
            folds: 5,
        }
    }

    pub fn from_config(config: &TrainingConfig) -> Self {
        Self::new(config.svr_kernels.clone(), config.svr_c_values.clone())
            .with_epsilon(config.svr_epsilon)
            .with_folds(config.cv_folds)
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_folds(mut self, folds: usize) -> Self {
        self.folds = folds;
        self
    }

    /// Candidate configurations, C outer and kernel inner.
    pub fn candidates(&self) -> Vec<SvrConfig> {
        self.c_values
            .iter()
            .flat_map(|&c| {
                self.kernels.iter().map(move |&kernel| {
                    SvrConfig::default()
                        .with_kernel(kernel)
                        .with_c(c)
                        .with_epsilon(self.epsilon)
                })
            })
            .collect()
    }

    pub fn search(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<GridSearchResult> {
        let candidates = self.candidates();
        if candidates.is_empty() {
            return Err(PipelineError::training(
                x.nrows(),
                "support-vector grid has no candidates",
            ));
        }

        let scores = candidates
            .par_iter()
            .map(|config| cross_val_score(config, x, y, self.folds).map(|score| (*config, score)))
            .collect::<Result<Vec<_>>>()?;

        for (config, score) in &scores {
            debug!(
                "SVR kernel={} C={} mean CV R²={:.4}",
                config.kernel, config.c, score
            );
        }

        let (best, best_score) = best_of(scores.iter().copied()).ok_or_else(|| {
            PipelineError::training(x.nrows(), "support-vector grid produced no scores")
        })?;

        Ok(GridSearchResult {
            best,
            best_score,
            scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_of_picks_maximum() {
        let best = best_of(vec![("a", 0.1), ("b", 0.7), ("c", 0.3)]).unwrap();
        assert_eq!(best, ("b", 0.7));
    }

    #[test]
    fn test_best_of_ties_keep_first() {
        let best = best_of(vec![(40, 0.5), (70, 0.5), (100, 0.2)]).unwrap();
        assert_eq!(best.0, 40);
    }

    #[test]
    fn test_best_of_negative_and_nan_scores() {
        let best = best_of(vec![("nan", f64::NAN), ("neg", -2.0), ("worse", -3.0)]).unwrap();
        assert_eq!(best.0, "neg");
        assert!(best_of(Vec::<((), f64)>::new()).is_none());
    }

    #[test]
    fn test_candidate_order_is_c_outer_kernel_inner() {
        let grid = SvrGridSearch::new(vec![Kernel::Linear, Kernel::Rbf], vec![0.1, 1.0, 10.0]);
        let order: Vec<(f64, Kernel)> = grid.candidates().iter().map(|c| (c.c, c.kernel)).collect();
        assert_eq!(
            order,
            vec![
                (0.1, Kernel::Linear),
                (0.1, Kernel::Rbf),
                (1.0, Kernel::Linear),
                (1.0, Kernel::Rbf),
                (10.0, Kernel::Linear),
                (10.0, Kernel::Rbf),
            ]
        );
    }

    #[test]
    fn test_search_prefers_linear_on_linear_data() {
        let x = Array2::from_shape_fn((50, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| 2.0 * v + 5.0);
        let result = SvrGridSearch::new(vec![Kernel::Rbf, Kernel::Linear], vec![10.0])
            .search(&x, &y)
            .unwrap();
        assert_eq!(result.scores.len(), 2);
        assert_eq!(result.best.kernel, Kernel::Linear);
    }

    #[test]
    fn test_search_is_deterministic() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| ((i * 7 + j * 3) % 11) as f64);
        let y = x.map_axis(Axis(1), |r| r[0] * 3.0 - r[1]);
        let grid = SvrGridSearch::new(vec![Kernel::Linear, Kernel::Rbf], vec![0.1, 1.0]);
        let a = grid.search(&x, &y).unwrap();
        let b = grid.search(&x, &y).unwrap();
        assert_eq!(a.best, b.best);
        assert_eq!(a.best_score, b.best_score);
    }

    #[test]
    fn test_too_many_folds_is_training_error() {
        let x = Array2::<f64>::zeros((3, 1));
        let y = Array1::<f64>::zeros(3);
        let result = cross_val_score(&SvrConfig::default(), &x, &y, 5);
        assert!(matches!(result, Err(PipelineError::Training { .. })));
    }
}
