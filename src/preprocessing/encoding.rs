//! One-hot encoding of categorical listing fields.
//!
//! Fitting records, for every categorical field of the normalized table, the
//! sorted set of observed labels and fixes the resulting column layout in a
//! [`FeatureSchema`]. Transforming writes numeric fields through unchanged and
//! sets exactly one indicator per categorical field.
//!
//! ```text
//! ilce      tip        metrekare        metrekare  ilce_A  ilce_B  tip_Daire
//! "B"       "Daire"    120         -->  120        0       1       1
//! "A"       "Daire"    95               95         1       0       1
//! ```

use super::normalize::NormalizedTable;
use super::schema::FeatureSchema;
use super::traits::{FittedTransformer, Transformer};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

/// Strategy for categories that were not seen during fit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleUnknown {
    /// Raise an error when unknown categories are encountered.
    #[default]
    Error,
    /// Leave every indicator of the field at zero.
    Ignore,
}

/// Numeric matrix ready for model fitting.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedTable {
    features: Array2<f64>,
    target: Array1<f64>,
    schema: FeatureSchema,
}

impl EncodedTable {
    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Feature matrix; columns follow [`Self::schema`].
    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    /// Cleaned prices.
    pub fn target(&self) -> &Array1<f64> {
        &self.target
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.features.row(i)
    }
}

/// Unfitted one-hot encoder.
///
/// # Example
/// ```ignore
/// let fitted = OneHotEncoder::new().fit(&normalized)?;
/// assert_eq!(fitted.n_features_out(), fitted.schema().len());
/// ```
#[derive(Clone, Debug, Default)]
pub struct OneHotEncoder {
    handle_unknown: HandleUnknown,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the strategy for handling unknown categories during transform.
    pub fn with_handle_unknown(mut self, strategy: HandleUnknown) -> Self {
        self.handle_unknown = strategy;
        self
    }
}

/// Serializable parameters for a fitted [`OneHotEncoder`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OneHotEncoderParams {
    pub schema: FeatureSchema,
    pub handle_unknown: HandleUnknown,
}

/// Fitted encoder; owns the canonical [`FeatureSchema`].
#[derive(Clone, Debug)]
pub struct FittedOneHotEncoder {
    schema: FeatureSchema,
    handle_unknown: HandleUnknown,
}

impl FittedOneHotEncoder {
    /// The column layout fixed by this fit.
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn into_schema(self) -> FeatureSchema {
        self.schema
    }
}

impl Transformer for OneHotEncoder {
    type Input = NormalizedTable;
    type Output = EncodedTable;
    type Params = OneHotEncoderParams;
    type Fitted = FittedOneHotEncoder;

    fn fit(&self, data: &NormalizedTable) -> Result<FittedOneHotEncoder> {
        if data.is_empty() {
            return Err(PipelineError::training(
                0,
                "cannot fit OneHotEncoder on an empty table",
            ));
        }

        let numeric_fields: Vec<String> = data
            .numeric_columns()
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        let categorical: Vec<(String, BTreeSet<String>)> = data
            .categorical_columns()
            .iter()
            .map(|(name, labels)| (name.clone(), labels.iter().cloned().collect()))
            .collect();

        let schema = FeatureSchema::build(
            data.target_name(),
            data.unknown_category(),
            numeric_fields,
            categorical,
        )?;
        info!(
            "Feature schema v{} has {} columns ({} numeric, {} categorical fields)",
            schema.version(),
            schema.len(),
            schema.numeric_fields().len(),
            schema.blocks().len()
        );

        Ok(FittedOneHotEncoder {
            schema,
            handle_unknown: self.handle_unknown,
        })
    }
}

impl FittedTransformer for FittedOneHotEncoder {
    type Input = NormalizedTable;
    type Output = EncodedTable;
    type Params = OneHotEncoderParams;

    fn transform(&self, data: &NormalizedTable) -> Result<EncodedTable> {
        let rows = data.n_rows();
        let mut features = Array2::<f64>::zeros((rows, self.schema.len()));

        for (col, field) in self.schema.numeric_fields().iter().enumerate() {
            let values = data.numeric(field).ok_or_else(|| {
                PipelineError::data_format(field, None, "numeric field missing from table")
            })?;
            features
                .column_mut(col)
                .assign(&ArrayView1::from(values));
        }

        for block in self.schema.blocks() {
            let labels = data.categorical(block.field()).ok_or_else(|| {
                PipelineError::data_format(block.field(), None, "categorical field missing from table")
            })?;
            for (row, label) in labels.iter().enumerate() {
                match self.schema.column_index(block.field(), label) {
                    Some(col) => features[[row, col]] = 1.0,
                    None if self.handle_unknown == HandleUnknown::Ignore => {}
                    None => {
                        return Err(PipelineError::data_format(
                            block.field(),
                            Some(row),
                            format!("unknown category '{}'", label),
                        ))
                    }
                }
            }
        }

        Ok(EncodedTable {
            features,
            target: Array1::from(data.target().to_vec()),
            schema: self.schema.clone(),
        })
    }

    fn extract_params(&self) -> OneHotEncoderParams {
        OneHotEncoderParams {
            schema: self.schema.clone(),
            handle_unknown: self.handle_unknown,
        }
    }

    fn from_params(params: OneHotEncoderParams) -> Result<Self> {
        params.schema.check_version()?;
        Ok(Self {
            schema: params.schema,
            handle_unknown: params.handle_unknown,
        })
    }

    fn n_features_out(&self) -> usize {
        self.schema.len()
    }
}
