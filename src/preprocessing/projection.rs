//! Projection of a single new listing into a trained feature layout.

use super::schema::FeatureSchema;
use crate::dataset::{RawRecord, RawValue};
use ndarray::{Array1, Array2};
use tracing::{debug, warn};

/// Conforms raw records to a [`FeatureSchema`].
///
/// - numeric fields are copied; absent or unparsable values become `0.0`
/// - categorical fields set the indicator of their label; a missing label is
///   replaced by the schema's unknown sentinel first
/// - labels never seen in training are dropped, leaving the field's
///   indicators at zero
///
/// The projector borrows the schema and never changes it, so one schema can
/// serve any number of concurrent projections.
#[derive(Debug, Clone, Copy)]
pub struct InferenceProjector<'a> {
    schema: &'a FeatureSchema,
}

impl<'a> InferenceProjector<'a> {
    pub fn new(schema: &'a FeatureSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.schema
    }

    /// Feature vector for one record, in schema order. Always
    /// `schema.len()` long.
    pub fn project(&self, record: &RawRecord) -> Array1<f64> {
        let schema = self.schema;
        let mut x = Array1::<f64>::zeros(schema.len());

        for (col, field) in schema.numeric_fields().iter().enumerate() {
            x[col] = match record.get(field) {
                None | Some(RawValue::Missing) => 0.0,
                Some(value) => value.as_number().unwrap_or_else(|| {
                    warn!("Non-numeric value {:?} for '{}', using 0", value, field);
                    0.0
                }),
            };
        }

        for block in schema.blocks() {
            let label = record
                .get(block.field())
                .and_then(RawValue::as_category)
                .unwrap_or_else(|| schema.unknown_category().to_string());
            match schema.column_index(block.field(), &label) {
                Some(col) => x[col] = 1.0,
                None => debug!(
                    "Category '{}' of '{}' was not seen in training; dropped",
                    label,
                    block.field()
                ),
            }
        }

        x
    }

    /// Project several records into one matrix, one row per record.
    pub fn project_batch(&self, records: &[RawRecord]) -> Array2<f64> {
        let mut out = Array2::<f64>::zeros((records.len(), self.schema.len()));
        for (i, record) in records.iter().enumerate() {
            out.row_mut(i).assign(&self.project(record));
        }
        out
    }
}
