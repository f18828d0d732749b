//! Model trainer: split, fit every family, score on the held-out rows.

use crate::config::TrainingConfig;
use crate::dataset::train_test_split;
use crate::error::{PipelineError, Result};
use crate::metrics::{Metrics, RegressionMetrics};
use crate::model::{
    DecisionTreeRegressor, Fitted, FittedRegressor, InferenceModel, Kernel, MlpConfig,
    MlpRegressor, ModelFamily, SvrRegressor,
};
use crate::preprocessing::EncodedTable;
use crate::selection::{best_of, SvrGridSearch};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Best fitted model and its held-out metrics per family.
#[derive(Debug, Clone, Default)]
pub struct TrainedModels {
    models: BTreeMap<ModelFamily, FittedRegressor>,
    metrics: BTreeMap<ModelFamily, RegressionMetrics>,
}

impl TrainedModels {
    /// Record a fitted model and its held-out metrics, replacing any earlier
    /// entry of the same family.
    pub fn insert(&mut self, model: FittedRegressor, metrics: RegressionMetrics) {
        let family = model.family();
        self.models.insert(family, model);
        self.metrics.insert(family, metrics);
    }

    pub fn models(&self) -> &BTreeMap<ModelFamily, FittedRegressor> {
        &self.models
    }

    pub fn metrics(&self) -> &BTreeMap<ModelFamily, RegressionMetrics> {
        &self.metrics
    }

    /// Held-out R² per family.
    pub fn scores(&self) -> BTreeMap<ModelFamily, f64> {
        self.metrics
            .iter()
            .map(|(family, m)| (*family, m.r_squared))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn into_parts(
        self,
    ) -> (
        BTreeMap<ModelFamily, FittedRegressor>,
        BTreeMap<ModelFamily, RegressionMetrics>,
    ) {
        (self.models, self.metrics)
    }
}

/// Held-out partition of the encoded table.
struct Partition {
    x_train: Array2<f64>,
    y_train: Array1<f64>,
    x_test: Array2<f64>,
    y_test: Array1<f64>,
}

/// Trains the decision tree, the support-vector regressor and the neural
/// network on one encoded table.
///
/// Training is deterministic: the same table and configuration always give
/// the same models and scores.
///
/// # Example
/// ```ignore
/// let trainer = ModelTrainer::builder().seed(42).mlp_hidden_widths(vec![40, 70]).build();
/// let trained = trainer.fit(&encoded)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::new()
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit every family and score it on the held-out partition.
    ///
    /// # Errors
    /// [`PipelineError::Training`] when the table has fewer than
    /// `min_rows` rows, the target is constant, or the partitions are too
    /// small for the configured cross-validation.
    pub fn fit(&self, data: &EncodedTable) -> Result<TrainedModels> {
        let partition = self.partition(data)?;
        info!(
            "Training on {} rows, scoring on {} held-out rows, {} features",
            partition.x_train.nrows(),
            partition.x_test.nrows(),
            data.n_features()
        );

        let mut trained = TrainedModels::default();

        for (model, metrics) in [
            self.fit_tree(&partition)?,
            self.fit_svr(&partition)?,
            self.fit_mlp(&partition)?,
        ] {
            info!(
                "{}: R² = {:.4}, RMSE = {:.2}, MAE = {:.2}",
                model.family(),
                metrics.r_squared,
                metrics.rmse,
                metrics.mae
            );
            trained.insert(model, metrics);
        }

        Ok(trained)
    }

    fn partition(&self, data: &EncodedTable) -> Result<Partition> {
        let rows = data.n_rows();
        let config = &self.config;
        if rows < config.min_rows.max(2) {
            return Err(PipelineError::training(
                rows,
                format!("at least {} rows are required", config.min_rows),
            ));
        }

        let target = data.target();
        let first = target[0];
        if target.iter().all(|&v| v == first) {
            return Err(PipelineError::training(rows, "target has zero variance"));
        }

        let split = train_test_split(rows, config.test_size, config.seed);
        if split.test.is_empty() {
            return Err(PipelineError::training(rows, "held-out partition is empty"));
        }
        if split.train.len() < config.cv_folds.max(2) {
            return Err(PipelineError::training(
                rows,
                format!(
                    "{} training rows cannot support {}-fold cross-validation",
                    split.train.len(),
                    config.cv_folds
                ),
            ));
        }

        let x = data.features();
        Ok(Partition {
            x_train: x.select(Axis(0), &split.train),
            y_train: target.select(Axis(0), &split.train),
            x_test: x.select(Axis(0), &split.test),
            y_test: target.select(Axis(0), &split.test),
        })
    }

    fn fit_tree(&self, p: &Partition) -> Result<(FittedRegressor, RegressionMetrics)> {
        let tree = DecisionTreeRegressor::new()
            .with_seed(self.config.seed)
            .fit(&p.x_train, &p.y_train)?;
        debug!("Decision tree has {} leaves", tree.n_leaves());
        let metrics = held_out_metrics(&tree, p);
        Ok((tree.into(), metrics))
    }

    fn fit_svr(&self, p: &Partition) -> Result<(FittedRegressor, RegressionMetrics)> {
        let grid = SvrGridSearch::from_config(&self.config).search(&p.x_train, &p.y_train)?;
        info!(
            "Best SVR configuration: kernel={} C={} (mean CV R² = {:.4})",
            grid.best.kernel, grid.best.c, grid.best_score
        );
        let svr = SvrRegressor::new(grid.best).fit(&p.x_train, &p.y_train)?;
        let metrics = held_out_metrics(&svr, p);
        Ok((svr.into(), metrics))
    }

    fn fit_mlp(&self, p: &Partition) -> Result<(FittedRegressor, RegressionMetrics)> {
        let widths = &self.config.mlp_hidden_widths;
        if widths.is_empty() {
            return Err(PipelineError::training(
                p.x_train.nrows(),
                "no hidden-layer widths configured",
            ));
        }

        let fitted = widths
            .par_iter()
            .map(|&hidden| -> Result<(MlpRegressor<Fitted>, RegressionMetrics)> {
                let config = MlpConfig::default()
                    .with_hidden(hidden)
                    .with_max_iter(self.config.mlp_max_iter)
                    .with_seed(self.config.seed);
                let model = MlpRegressor::new(config).fit(&p.x_train, &p.y_train)?;
                let metrics = held_out_metrics(&model, p);
                debug!(
                    "MLP hidden={} epochs={} held-out R²={:.4}",
                    hidden,
                    model.n_iter(),
                    metrics.r_squared
                );
                Ok((model, metrics))
            })
            .collect::<Result<Vec<_>>>()?;

        let candidates = fitted
            .into_iter()
            .map(|(model, metrics)| ((model, metrics), metrics.r_squared));
        let ((best, metrics), _) = best_of(candidates).ok_or_else(|| {
            PipelineError::training(p.x_train.nrows(), "width sweep produced no models")
        })?;
        info!("Best MLP hidden width: {}", best.config().hidden);
        Ok((best.into(), metrics))
    }
}

fn held_out_metrics<M: InferenceModel>(model: &M, p: &Partition) -> RegressionMetrics {
    let preds = model.predict_batch(&p.x_test);
    Metrics::calculate_all(p.y_test.view(), preds.view())
}

/// Fluent builder for [`ModelTrainer`].
#[derive(Debug, Clone, Default)]
pub struct TrainerBuilder {
    config: TrainingConfig,
}

impl TrainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn test_size(mut self, test_size: f64) -> Self {
        self.config.test_size = test_size;
        self
    }

    pub fn min_rows(mut self, min_rows: usize) -> Self {
        self.config.min_rows = min_rows;
        self
    }

    pub fn cv_folds(mut self, folds: usize) -> Self {
        self.config.cv_folds = folds;
        self
    }

    pub fn svr_kernels(mut self, kernels: Vec<Kernel>) -> Self {
        self.config.svr_kernels = kernels;
        self
    }

    pub fn svr_c_values(mut self, c_values: Vec<f64>) -> Self {
        self.config.svr_c_values = c_values;
        self
    }

    pub fn mlp_hidden_widths(mut self, widths: Vec<usize>) -> Self {
        self.config.mlp_hidden_widths = widths;
        self
    }

    pub fn mlp_max_iter(mut self, max_iter: usize) -> Self {
        self.config.mlp_max_iter = max_iter;
        self
    }

    pub fn build(self) -> ModelTrainer {
        ModelTrainer::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::dataset::{RawTable, RawValue};
    use crate::preprocessing::{OneHotEncoder, SchemaNormalizer, Transformer};

    fn encoded(rows: usize, constant_price: bool) -> EncodedTable {
        let districts = ["A", "B", "C"];
        let data = (0..rows)
            .map(|i| {
                let area = 60.0 + ((i * 37) % 90) as f64;
                let district = districts[i % 3];
                let price = if constant_price {
                    100_000.0
                } else {
                    area * 2_000.0 + (i % 3) as f64 * 40_000.0 + ((i * 13) % 7) as f64 * 1_000.0
                };
                vec![
                    RawValue::text(district),
                    RawValue::Number(area),
                    RawValue::text(format!("{}TL", price)),
                ]
            })
            .collect();
        let table = RawTable::new(vec!["ilce".into(), "metrekare".into(), "fiyat".into()], data).unwrap();
        let config = PipelineConfig::default()
            .with_categorical_fields(&["ilce"])
            .with_numeric_fields(&["metrekare"]);
        let normalized = SchemaNormalizer::new(config).normalize(&table).unwrap();
        OneHotEncoder::new().fit_transform(&normalized).unwrap()
    }

    fn fast_trainer() -> ModelTrainer {
        ModelTrainer::builder()
            .svr_c_values(vec![1.0, 10.0])
            .mlp_hidden_widths(vec![8, 16])
            .mlp_max_iter(200)
            .build()
    }

    #[test]
    fn test_trains_every_family() {
        let trained = fast_trainer().fit(&encoded(80, false)).unwrap();
        assert_eq!(trained.len(), 3);
        for family in ModelFamily::ALL {
            let metrics = trained.metrics()[&family];
            assert!(metrics.r_squared <= 1.0, "{} scored {}", family, metrics.r_squared);
            assert!(metrics.rmse.is_finite() && metrics.rmse >= 0.0);
            assert!(metrics.mae <= metrics.rmse + 1e-9);
            assert_eq!(trained.scores()[&family], metrics.r_squared);
            assert_eq!(trained.models()[&family].family(), family);
        }
    }

    #[test]
    fn test_too_few_rows() {
        let result = fast_trainer().fit(&encoded(10, false));
        match result {
            Err(PipelineError::Training { rows, .. }) => assert!(rows <= 10),
            other => panic!("expected TrainingError, got {other:?}"),
        }
    }

    #[test]
    fn test_constant_target_is_rejected() {
        let result = fast_trainer().fit(&encoded(40, true));
        assert!(matches!(result, Err(PipelineError::Training { .. })));
    }

    #[test]
    fn test_training_is_reproducible() {
        let data = encoded(60, false);
        let a = fast_trainer().fit(&data).unwrap();
        let b = fast_trainer().fit(&data).unwrap();
        assert_eq!(a.scores(), b.scores());
    }

    #[test]
    fn test_builder_sets_config() {
        let trainer = ModelTrainer::builder()
            .seed(7)
            .test_size(0.25)
            .min_rows(30)
            .cv_folds(3)
            .svr_kernels(vec![Kernel::Rbf])
            .build();
        assert_eq!(trainer.config().seed, 7);
        assert_eq!(trainer.config().test_size, 0.25);
        assert_eq!(trainer.config().min_rows, 30);
        assert_eq!(trainer.config().cv_folds, 3);
        assert_eq!(trainer.config().svr_kernels, vec![Kernel::Rbf]);
    }
}
