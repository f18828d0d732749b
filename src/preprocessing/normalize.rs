//! Schema normalization: headers, price parsing, outlier filtering and imputation.
//!
//! The normalizer never mutates the caller's table; it produces a fresh
//! [`NormalizedTable`] in which every designated numeric column is dense
//! `f64`, every designated categorical column is a dense list of labels and the
//! price column is a validated positive number.
//!
//! Processing order:
//! 1. trim and lower-case all column names
//! 2. parse the price text (strip currency tokens and thousands separators)
//! 3. drop rows outside the `[lower_quantile, upper_quantile]` price band
//! 4. apply the balcony missing-value policy
//! 5. coerce numeric columns and fill gaps with the median of the kept rows
//! 6. fill missing categorical labels with the unknown sentinel

use crate::config::{MissingPolicy, PipelineConfig, PriceFormat};
use crate::dataset::{RawRecord, RawTable, RawValue};
use crate::error::{PipelineError, Result};
use tracing::{debug, info, warn};

/// Parse one price cell such as `"450,000TL"` into `450000.0`.
///
/// # Errors
/// Returns a description of the problem when the cell is missing, does not
/// parse after stripping the known tokens, or is not a positive number.
pub fn parse_price(value: &RawValue, format: &PriceFormat) -> std::result::Result<f64, String> {
    let parsed = match value {
        RawValue::Missing => return Err("price is missing".to_string()),
        RawValue::Number(v) => *v,
        RawValue::Text(s) => {
            let mut cleaned = s.clone();
            for token in format
                .currency_tokens
                .iter()
                .chain(format.thousands_separators.iter())
            {
                if !token.is_empty() {
                    cleaned = cleaned.replace(token.as_str(), "");
                }
            }
            cleaned
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("cannot parse price '{}'", s))?
        }
    };

    if !parsed.is_finite() || parsed <= 0.0 {
        return Err(format!("price must be a positive number, got {}", parsed));
    }
    Ok(parsed)
}

/// Empirical quantile with linear interpolation between order statistics.
///
/// Returns `NaN` for an empty slice.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let pos = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Dense, cleaned training table.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    numeric: Vec<(String, Vec<f64>)>,
    categorical: Vec<(String, Vec<String>)>,
    target_name: String,
    target: Vec<f64>,
    unknown_category: String,
}

impl NormalizedTable {
    pub fn n_rows(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    /// Numeric columns in configured order.
    pub fn numeric_columns(&self) -> &[(String, Vec<f64>)] {
        &self.numeric
    }

    /// Categorical columns in configured order.
    pub fn categorical_columns(&self) -> &[(String, Vec<String>)] {
        &self.categorical
    }

    pub fn numeric(&self, field: &str) -> Option<&[f64]> {
        self.numeric
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, v)| v.as_slice())
    }

    pub fn categorical(&self, field: &str) -> Option<&[String]> {
        self.categorical
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, v)| v.as_slice())
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Cleaned prices, one per row.
    pub fn target(&self) -> &[f64] {
        &self.target
    }

    pub fn unknown_category(&self) -> &str {
        &self.unknown_category
    }

    /// One cleaned row as a raw record, without the target.
    pub fn record(&self, row: usize) -> Option<RawRecord> {
        if row >= self.n_rows() {
            return None;
        }
        let mut record = RawRecord::new();
        for (name, values) in &self.numeric {
            record.insert(name, RawValue::Number(values[row]));
        }
        for (name, values) in &self.categorical {
            record.insert(name, RawValue::Text(values[row].clone()));
        }
        Some(record)
    }
}

/// Cleans a raw listing table according to a [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct SchemaNormalizer {
    config: PipelineConfig,
}

impl SchemaNormalizer {
    /// Designated field names are normalized the same way as table headers.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config: config.with_normalized_names(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Produce a cleaned copy of `table`.
    ///
    /// # Errors
    /// - [`PipelineError::DataFormat`] if the price column is absent or any
    ///   price cell cannot be parsed.
    pub fn normalize(&self, table: &RawTable) -> Result<NormalizedTable> {
        let config = &self.config;
        let table = table.with_normalized_headers();

        let target_idx = table.column_index(&config.target).ok_or_else(|| {
            PipelineError::data_format(&config.target, None, "price column is absent")
        })?;

        let prices = table
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| {
                parse_price(&row[target_idx], &config.price)
                    .map_err(|reason| PipelineError::data_format(&config.target, Some(i), reason))
            })
            .collect::<Result<Vec<f64>>>()?;

        let lower = quantile(&prices, config.lower_quantile);
        let upper = quantile(&prices, config.upper_quantile);
        let mut keep: Vec<bool> = prices.iter().map(|&p| p >= lower && p <= upper).collect();
        let in_band = keep.iter().filter(|&&k| k).count();
        info!(
            "Price band [{:.2}, {:.2}] keeps {} of {} rows",
            lower,
            upper,
            in_band,
            prices.len()
        );

        let balcony_idx = table.column_index(&config.balcony_field);
        if let (Some(idx), MissingPolicy::Drop) = (balcony_idx, config.balcony_policy) {
            for (k, row) in keep.iter_mut().zip(table.rows()) {
                if row[idx].as_category().is_none() {
                    *k = false;
                }
            }
            let kept = keep.iter().filter(|&&k| k).count();
            if kept < in_band {
                debug!(
                    "Dropped {} rows with missing '{}'",
                    in_band - kept,
                    config.balcony_field
                );
            }
        }

        let kept_rows: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect();

        let mut numeric: Vec<(String, Vec<f64>)> = Vec::new();
        for field in &config.numeric_fields {
            let Some(idx) = table.column_index(field) else {
                debug!("Numeric field '{}' not present", field);
                continue;
            };
            let raw: Vec<Option<f64>> = kept_rows
                .iter()
                .map(|&r| table.rows()[r][idx].as_number())
                .collect();
            let observed: Vec<f64> = raw.iter().flatten().copied().collect();
            let fill = if observed.is_empty() {
                0.0
            } else {
                quantile(&observed, 0.5)
            };
            let n_missing = raw.len() - observed.len();
            if n_missing > 0 {
                debug!(
                    "Imputed {} missing values in '{}' with median {}",
                    n_missing, field, fill
                );
            }
            numeric.push((field.clone(), raw.into_iter().map(|v| v.unwrap_or(fill)).collect()));
        }

        let mut categorical = Vec::new();
        for field in &config.categorical_fields {
            let Some(idx) = table.column_index(field) else {
                debug!("Categorical field '{}' not present", field);
                continue;
            };
            let labels: Vec<String> = kept_rows
                .iter()
                .map(|&r| {
                    table.rows()[r][idx]
                        .as_category()
                        .unwrap_or_else(|| config.unknown_category.clone())
                })
                .collect();
            categorical.push((field.clone(), labels));
        }

        for column in table.columns() {
            let designated = *column == config.target
                || config.numeric_fields.contains(column)
                || config.categorical_fields.contains(column);
            if !designated {
                warn!("Ignoring undesignated column '{}'", column);
            }
        }

        let target: Vec<f64> = kept_rows.iter().map(|&r| prices[r]).collect();
        info!("Normalized table has {} rows", target.len());

        Ok(NormalizedTable {
            numeric,
            categorical,
            target_name: config.target.clone(),
            target,
            unknown_category: config.unknown_category.clone(),
        })
    }
}
