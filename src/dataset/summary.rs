//! Per-field summaries that let the form layer offer sensible inputs.

use super::table::RawTable;
use crate::config::PipelineConfig;
use serde::Serialize;
use std::collections::BTreeSet;

/// Choices offered for one categorical field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalOptions {
    pub field: String,
    /// Distinct non-missing values, sorted.
    pub options: Vec<String>,
}

/// Bounds and default for one numeric input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericOptions {
    pub field: String,
    pub range: NumericRange,
}

/// Input options for every designated field present in the raw table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormOptions {
    pub categorical: Vec<CategoricalOptions>,
    pub numeric: Vec<NumericOptions>,
}

impl FormOptions {
    /// Summarize the raw table. Headers are normalized first; fields absent from
    /// the table, and numeric fields without a single parsable value, are
    /// skipped.
    pub fn from_table(table: &RawTable, config: &PipelineConfig) -> Self {
        let table = table.with_normalized_headers();
        let config = config.clone().with_normalized_names();

        let categorical = config
            .categorical_fields
            .iter()
            .filter_map(|field| {
                let options: BTreeSet<String> =
                    table.column(field)?.filter_map(|v| v.as_category()).collect();
                Some(CategoricalOptions {
                    field: field.clone(),
                    options: options.into_iter().collect(),
                })
            })
            .collect();

        let numeric = config
            .numeric_fields
            .iter()
            .filter_map(|field| {
                let values: Vec<f64> = table.column(field)?.filter_map(|v| v.as_number()).collect();
                if values.is_empty() {
                    return None;
                }
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                Some(NumericOptions {
                    field: field.clone(),
                    range: NumericRange { min, max, mean },
                })
            })
            .collect();

        Self {
            categorical,
            numeric,
        }
    }

    pub fn categorical_options(&self, field: &str) -> Option<&[String]> {
        self.categorical
            .iter()
            .find(|c| c.field == field)
            .map(|c| c.options.as_slice())
    }

    pub fn numeric_range(&self, field: &str) -> Option<NumericRange> {
        self.numeric.iter().find(|n| n.field == field).map(|n| n.range)
    }
}
