//! Pipeline configuration.
//!
//! Every field has a default that reproduces the behaviour expected for the
//! listing dataset (Turkish column names, prices such as `"300,000TL"`), so an
//! empty TOML file is a valid configuration.
//!
//! ```toml
//! target = "fiyat"
//! categorical_fields = ["ilce", "tip"]
//! numeric_fields = ["metrekare", "binayas"]
//! balcony_policy = "impute"
//!
//! [price]
//! currency_tokens = ["TL"]
//! thousands_separators = [","]
//!
//! [training]
//! seed = 42
//! mlp_hidden_widths = [40, 70, 100]
//! ```

use crate::dataset::normalize_header;
use crate::error::{PipelineError, Result};
use crate::model::Kernel;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// What to do with rows whose balcony field is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Remove the row entirely.
    #[default]
    Drop,
    /// Keep the row and substitute the unknown-category sentinel.
    Impute,
}

/// Formatting tokens stripped from the price text before parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceFormat {
    pub currency_tokens: Vec<String>,
    pub thousands_separators: Vec<String>,
}

impl Default for PriceFormat {
    fn default() -> Self {
        Self {
            currency_tokens: vec!["TL".to_string()],
            thousands_separators: vec![",".to_string()],
        }
    }
}

/// Hyperparameters for the model trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Seed shared by the split, the tree and the networks.
    pub seed: u64,
    /// Fraction of rows held out for scoring.
    pub test_size: f64,
    /// Below this many encoded rows training is refused.
    pub min_rows: usize,
    /// Folds used by the support-vector grid search.
    pub cv_folds: usize,
    pub svr_kernels: Vec<Kernel>,
    pub svr_c_values: Vec<f64>,
    pub svr_epsilon: f64,
    pub mlp_hidden_widths: Vec<usize>,
    pub mlp_max_iter: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_size: 0.2,
            min_rows: 25,
            cv_folds: 5,
            svr_kernels: vec![Kernel::Linear, Kernel::Rbf],
            svr_c_values: vec![0.1, 1.0, 10.0],
            svr_epsilon: 0.1,
            mlp_hidden_widths: vec![40, 70, 100],
            mlp_max_iter: 1000,
        }
    }
}

/// Top-level configuration for normalization, encoding and training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Name of the price column after header normalization.
    pub target: String,
    /// Fields expanded into one-hot indicator columns, in schema order.
    pub categorical_fields: Vec<String>,
    /// Fields passed through as numbers, in schema order.
    pub numeric_fields: Vec<String>,
    /// Field governed by `balcony_policy`.
    pub balcony_field: String,
    pub balcony_policy: MissingPolicy,
    /// Category substituted for missing categorical values.
    pub unknown_category: String,
    pub price: PriceFormat,
    /// Lower quantile of the retained price band.
    pub lower_quantile: f64,
    /// Upper quantile of the retained price band.
    pub upper_quantile: f64,
    pub training: TrainingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target: "fiyat".to_string(),
            categorical_fields: [
                "ilce", "mahalle", "tip", "esya", "odasayi", "isitma", "site", "balkon",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            numeric_fields: [
                "metrekare",
                "binayas",
                "binakat",
                "banyosayi",
                "dairekat",
                "balkonsayi",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            balcony_field: "balkon".to_string(),
            balcony_policy: MissingPolicy::Drop,
            unknown_category: "Unknown".to_string(),
            price: PriceFormat::default(),
            lower_quantile: 0.05,
            upper_quantile: 0.95,
            training: TrainingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::DataLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml(&content)?;
        debug!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        let config = config.with_normalized_names();
        config.validate()?;
        Ok(config)
    }

    /// Trim and lower-case every designated field name so that it matches
    /// the normalized table headers.
    pub fn with_normalized_names(mut self) -> Self {
        self.target = normalize_header(&self.target);
        self.balcony_field = normalize_header(&self.balcony_field);
        for field in self
            .categorical_fields
            .iter_mut()
            .chain(self.numeric_fields.iter_mut())
        {
            *field = normalize_header(field);
        }
        self
    }

    /// Replace the designated categorical fields.
    pub fn with_categorical_fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.categorical_fields = fields.iter().map(|f| normalize_header(f.as_ref())).collect();
        self
    }

    /// Replace the designated numeric fields.
    pub fn with_numeric_fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.numeric_fields = fields.iter().map(|f| normalize_header(f.as_ref())).collect();
        self
    }

    pub fn with_target(mut self, target: impl AsRef<str>) -> Self {
        self.target = normalize_header(target.as_ref());
        self
    }

    pub fn with_balcony_policy(mut self, policy: MissingPolicy) -> Self {
        self.balcony_policy = policy;
        self
    }

    pub fn with_training(mut self, training: TrainingConfig) -> Self {
        self.training = training;
        self
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let band_ok = (0.0..=1.0).contains(&self.lower_quantile)
            && (0.0..=1.0).contains(&self.upper_quantile)
            && self.lower_quantile <= self.upper_quantile;
        if !band_ok {
            return Err(PipelineError::InvalidConfig(format!(
                "invalid quantile band [{}, {}]",
                self.lower_quantile, self.upper_quantile
            )));
        }
        let t = &self.training;
        if !(t.test_size > 0.0 && t.test_size < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "test_size must lie in (0, 1), got {}",
                t.test_size
            )));
        }
        if t.cv_folds < 2 {
            return Err(PipelineError::InvalidConfig(
                "cv_folds must be at least 2".to_string(),
            ));
        }
        if t.svr_kernels.is_empty() || t.svr_c_values.is_empty() || t.mlp_hidden_widths.is_empty()
        {
            return Err(PipelineError::InvalidConfig(
                "model search grids must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_listing_dataset() {
        let config = PipelineConfig::default();
        assert_eq!(config.target, "fiyat");
        assert_eq!(config.categorical_fields.len(), 8);
        assert_eq!(config.numeric_fields.len(), 6);
        assert_eq!(config.balcony_policy, MissingPolicy::Drop);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.training.mlp_hidden_widths, vec![40, 70, 100]);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_toml_overrides() {
        let toml_str = r#"
            target = "price"
            categorical_fields = ["district", "type"]
            balcony_policy = "impute"

            [training]
            seed = 7
            svr_kernels = ["rbf"]
        "#;
        let config = PipelineConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.target, "price");
        assert_eq!(config.categorical_fields, vec!["district", "type"]);
        assert_eq!(config.balcony_policy, MissingPolicy::Impute);
        assert_eq!(config.training.seed, 7);
        assert_eq!(config.training.svr_kernels, vec![Kernel::Rbf]);
        // untouched fields keep their defaults
        assert_eq!(config.training.cv_folds, 5);
    }

    #[test]
    fn test_invalid_band_rejected() {
        let result = PipelineConfig::from_toml("lower_quantile = 0.9\nupper_quantile = 0.1");
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));

        let mut config = PipelineConfig::default();
        config.training.cv_folds = 1;
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let result = PipelineConfig::from_toml("target = [");
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_field_names_are_normalized() {
        let config = PipelineConfig::from_toml(
            r#"
            target = " Price "
            categorical_fields = ["Ilce", "TIP"]
            numeric_fields = ["Metrekare"]
            balcony_field = "Balkon"
        "#,
        )
        .unwrap();
        assert_eq!(config.target, "price");
        assert_eq!(config.categorical_fields, vec!["ilce", "tip"]);
        assert_eq!(config.numeric_fields, vec!["metrekare"]);
        assert_eq!(config.balcony_field, "balkon");

        let built = PipelineConfig::default()
            .with_target("Price")
            .with_categorical_fields(&["District"])
            .with_numeric_fields(&[" Area"]);
        assert_eq!(built.target, "price");
        assert_eq!(built.categorical_fields, vec!["district"]);
        assert_eq!(built.numeric_fields, vec!["area"]);
    }

    #[test]
    fn test_load_missing_file() {
        let result = PipelineConfig::load(Path::new("/nonexistent/pipeline.toml"));
        assert!(matches!(result, Err(PipelineError::DataLoad { .. })));
    }
}
