//! Prediction requests against a trained artifact.

use crate::dataset::RawRecord;
use crate::error::{PipelineError, Result};
use crate::model::{InferenceModel, ModelFamily};
use crate::preprocessing::InferenceProjector;
use crate::serialization::TrainedArtifact;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// One scored prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub family: ModelFamily,
    /// Predicted price, in the units of the training target.
    pub price: f64,
    /// Held-out R² of the model that produced `price`.
    pub score: f64,
}

/// Serves predictions from an immutable [`TrainedArtifact`].
///
/// `PricePredictor` is `Send + Sync` and holds no mutable state, so a single
/// instance can answer concurrent requests without locking.
#[derive(Debug, Clone)]
pub struct PricePredictor {
    artifact: TrainedArtifact,
}

impl PricePredictor {
    pub fn new(artifact: TrainedArtifact) -> Self {
        Self { artifact }
    }

    /// Load the artifact from disk and wrap it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        TrainedArtifact::load_from_file(path).map(Self::new)
    }

    pub fn artifact(&self) -> &TrainedArtifact {
        &self.artifact
    }

    /// Resolve a model label (canonical name or alias) among the trained families.
    ///
    /// # Errors
    /// [`PipelineError::UnknownModel`] if the label names no family, or a
    /// family that is absent from this artifact.
    pub fn resolve(&self, label: &str) -> Result<ModelFamily> {
        ModelFamily::from_label(label)
            .filter(|family| self.artifact.model(*family).is_some())
            .ok_or_else(|| PipelineError::UnknownModel {
                label: label.to_string(),
                available: ModelFamily::describe(self.artifact.models().keys()),
            })
    }

    /// Predict the price of `record` with the model named by `label`.
    pub fn predict(&self, record: &RawRecord, label: &str) -> Result<Prediction> {
        let family = self.resolve(label)?;
        self.predict_with(record, family)
    }

    /// Predict the price of `record` with a specific family.
    pub fn predict_with(&self, record: &RawRecord, family: ModelFamily) -> Result<Prediction> {
        let unknown = || PipelineError::UnknownModel {
            label: family.label().to_string(),
            available: ModelFamily::describe(self.artifact.models().keys()),
        };
        let model = self.artifact.model(family).ok_or_else(unknown)?;
        let score = self.artifact.score(family).ok_or_else(unknown)?;

        let x = InferenceProjector::new(self.artifact.schema()).project(record);
        if x.len() != model.n_features() {
            return Err(PipelineError::SchemaMismatch {
                expected: model.n_features(),
                got: x.len(),
            });
        }

        let price = model.predict(x.view());
        debug!("{} predicted {:.2}", family, price);
        Ok(Prediction {
            family,
            price,
            score,
        })
    }

    /// Predict with every trained family, in label order.
    pub fn predict_all(&self, record: &RawRecord) -> Result<Vec<Prediction>> {
        self.artifact
            .families()
            .map(|family| self.predict_with(record, family))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RegressionMetrics;
    use crate::model::{DecisionTreeRegressor, FittedRegressor};
    use crate::preprocessing::FeatureSchema;
    use crate::trainer::TrainedModels;
    use ndarray::{array, Array2};
    use std::collections::BTreeSet;

    fn predictor() -> PricePredictor {
        let schema = FeatureSchema::build(
            "fiyat",
            "Unknown",
            vec!["metrekare".into()],
            vec![(
                "ilce".into(),
                ["A", "B"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            )],
        )
        .unwrap();
        // price = 1000 * area + 50_000 for district B
        let x: Array2<f64> = array![
            [50.0, 1.0, 0.0],
            [50.0, 0.0, 1.0],
            [100.0, 1.0, 0.0],
            [100.0, 0.0, 1.0]
        ];
        let y = array![50_000.0, 100_000.0, 100_000.0, 150_000.0];
        let tree = DecisionTreeRegressor::new().fit(&x, &y).unwrap();
        let mut trained = TrainedModels::default();
        trained.insert(FittedRegressor::from(tree), RegressionMetrics::from_score(0.9));
        PricePredictor::new(TrainedArtifact::new(schema, trained).unwrap())
    }

    #[test]
    fn test_predict_with_label_and_alias() {
        let predictor = predictor();
        let record = RawRecord::new().with("metrekare", 100.0).with("ilce", "B");

        let by_label = predictor.predict(&record, "decision tree").unwrap();
        assert_eq!(by_label.price, 150_000.0);
        assert_eq!(by_label.score, 0.9);
        assert_eq!(by_label.family, ModelFamily::DecisionTree);

        let by_alias = predictor.predict(&record, "Karar Ağacı").unwrap();
        assert_eq!(by_alias, by_label);
    }

    #[test]
    fn test_unknown_label() {
        let predictor = predictor();
        let err = predictor
            .predict(&RawRecord::new(), "Quantile Forest")
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownModel { .. }));
    }

    #[test]
    fn test_untrained_family_is_unknown() {
        let predictor = predictor();
        let err = predictor.predict(&RawRecord::new(), "SVR").unwrap_err();
        match err {
            PipelineError::UnknownModel { available, .. } => assert_eq!(available, "decision tree"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unseen_district_still_predicts() {
        let predictor = predictor();
        let record = RawRecord::new().with("metrekare", 50.0).with("ilce", "Z");
        let prediction = predictor.predict(&record, "decision tree").unwrap();
        assert!(prediction.price.is_finite());
    }

    #[test]
    fn test_predict_all() {
        let predictions = predictor()
            .predict_all(&RawRecord::new().with("metrekare", 50.0).with("ilce", "A"))
            .unwrap();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].price, 50_000.0);
    }
}
