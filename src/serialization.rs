//! Serialization of fitted parameters and of the trained artifact.
//!
//! The artifact bundles the feature schema, every fitted model and the score
//! table into one file, so the three can never drift apart between training
//! and serving.

use crate::error::{PipelineError, Result};
use crate::metrics::RegressionMetrics;
use crate::model::{FittedRegressor, InferenceModel, ModelFamily};
use crate::preprocessing::FeatureSchema;
use crate::trainer::TrainedModels;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::path::Path;
use tracing::info;

/// Version of the artifact layout written by [`TrainedArtifact::save_to_file`].
pub const ARTIFACT_FORMAT_VERSION: u32 = 2;

/// A trait for parameter representations that can be serialized to and from bytes.
///
/// Implementors should contain only plain data (numbers, strings, arrays),
/// never open handles or caches.
pub trait SerializableParams: Sized {
    /// The error type returned during (de)serialization.
    type Error: Error + Send + Sync + 'static;

    /// Serialize the parameters into a byte buffer.
    fn to_bytes(&self) -> std::result::Result<Vec<u8>, Self::Error>;

    /// Deserialize the parameters from a byte buffer.
    fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, Self::Error>;
}

impl<T> SerializableParams for T
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    type Error = bincode::Error;

    fn to_bytes(&self) -> std::result::Result<Vec<u8>, Self::Error> {
        bincode::serialize(self)
    }

    fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, Self::Error> {
        bincode::deserialize(bytes)
    }
}

/// Everything a serving session needs: schema, models and their held-out
/// metrics as one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedArtifact {
    format_version: u32,
    schema: FeatureSchema,
    models: BTreeMap<ModelFamily, FittedRegressor>,
    metrics: BTreeMap<ModelFamily, RegressionMetrics>,
}

impl TrainedArtifact {
    /// Bundle a training run with the schema its models were fitted on.
    ///
    /// # Errors
    /// [`PipelineError::SchemaMismatch`] if any model expects a different
    /// number of features than the schema provides.
    pub fn new(schema: FeatureSchema, trained: TrainedModels) -> Result<Self> {
        let (models, metrics) = trained.into_parts();
        let artifact = Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            schema,
            models,
            metrics,
        };
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn models(&self) -> &BTreeMap<ModelFamily, FittedRegressor> {
        &self.models
    }

    /// Held-out R² per family.
    pub fn scores(&self) -> BTreeMap<ModelFamily, f64> {
        self.metrics
            .iter()
            .map(|(family, m)| (*family, m.r_squared))
            .collect()
    }

    /// Held-out R², RMSE and MAE per family.
    pub fn all_metrics(&self) -> &BTreeMap<ModelFamily, RegressionMetrics> {
        &self.metrics
    }

    pub fn metrics(&self, family: ModelFamily) -> Option<RegressionMetrics> {
        self.metrics.get(&family).copied()
    }

    pub fn model(&self, family: ModelFamily) -> Option<&FittedRegressor> {
        self.models.get(&family)
    }

    pub fn score(&self, family: ModelFamily) -> Option<f64> {
        self.metrics.get(&family).map(|m| m.r_squared)
    }

    /// Trained families in label order.
    pub fn families(&self) -> impl Iterator<Item = ModelFamily> + '_ {
        self.models.keys().copied()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let artifact: Self = bincode::deserialize(bytes)?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Write the artifact to a single file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path.as_ref(), &bytes)?;
        info!(
            "Saved artifact with {} models ({} bytes) to {}",
            self.models.len(),
            bytes.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Read an artifact written by [`Self::save_to_file`].
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    fn validate(&self) -> Result<()> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(PipelineError::Serialization(format!(
                "artifact format version {} is not supported (expected {})",
                self.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        self.schema.check_version()?;

        for (family, model) in &self.models {
            if model.family() != *family {
                return Err(PipelineError::Serialization(format!(
                    "model stored under '{}' is a {}",
                    family,
                    model.family()
                )));
            }
            if model.n_features() != self.schema.len() {
                return Err(PipelineError::SchemaMismatch {
                    expected: self.schema.len(),
                    got: model.n_features(),
                });
            }
            if !self.metrics.contains_key(family) {
                return Err(PipelineError::Serialization(format!(
                    "no metrics recorded for '{}'",
                    family
                )));
            }
        }
        Ok(())
    }
}
