//! Regression model families trained on the encoded feature table.
//!
//! Every family follows the same type-state pattern: a model starts as
//! `Model<Unfitted>` holding only hyperparameters, and `fit` returns a
//! `Model<Fitted>` holding only what inference needs. Only fitted models
//! implement [`InferenceModel`].

pub mod mlp;
pub mod scaling;
pub mod state;
pub mod svr;
pub mod tree;

pub use mlp::{MlpConfig, MlpRegressor};
pub use state::{Fitted, Unfitted};
pub use svr::{SvrConfig, SvrRegressor};
pub use tree::{DecisionTreeRegressor, TreeConfig};

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Support-vector kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    /// `k(a, b) = a · b`
    Linear,
    /// `k(a, b) = exp(-gamma * |a - b|²)`
    Rbf,
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kernel::Linear => write!(f, "linear"),
            Kernel::Rbf => write!(f, "rbf"),
        }
    }
}

/// The regressor families the trainer produces, keyed by a stable label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    #[serde(rename = "decision tree")]
    DecisionTree,
    #[serde(rename = "support-vector regression")]
    SupportVector,
    #[serde(rename = "neural network")]
    NeuralNetwork,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 3] = [
        ModelFamily::DecisionTree,
        ModelFamily::SupportVector,
        ModelFamily::NeuralNetwork,
    ];

    /// Canonical label used in logs, scores and prediction requests.
    pub fn label(&self) -> &'static str {
        match self {
            ModelFamily::DecisionTree => "decision tree",
            ModelFamily::SupportVector => "support-vector regression",
            ModelFamily::NeuralNetwork => "neural network",
        }
    }

    /// Labels the listing form has historically used for the same families.
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            ModelFamily::DecisionTree => &["karar ağacı"],
            ModelFamily::SupportVector => &["svr"],
            ModelFamily::NeuralNetwork => &["yapay sinir ağı"],
        }
    }

    /// Resolve a label or alias, ignoring case and surrounding whitespace.
    pub fn from_label(label: &str) -> Option<ModelFamily> {
        let wanted = label.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.label() == wanted || f.aliases().contains(&wanted.as_str()))
    }

    /// Comma-separated canonical labels of `families`.
    pub fn describe<'a>(families: impl IntoIterator<Item = &'a ModelFamily>) -> String {
        families
            .into_iter()
            .map(|f| f.label())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ModelFamily {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_label(s).ok_or_else(|| PipelineError::UnknownModel {
            label: s.to_string(),
            available: Self::describe(&Self::ALL),
        })
    }
}

/// Prediction interface shared by all fitted regressors.
pub trait InferenceModel {
    /// Predict the price for one feature vector in schema order.
    fn predict(&self, x: ArrayView1<'_, f64>) -> f64;

    /// Number of input features the model was fitted on.
    fn n_features(&self) -> usize;

    /// Predict one price per row.
    fn predict_batch(&self, x: &Array2<f64>) -> Array1<f64> {
        x.rows().into_iter().map(|row| self.predict(row)).collect()
    }
}

/// A fitted model of any family, as stored in the trained artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FittedRegressor {
    DecisionTree(DecisionTreeRegressor<Fitted>),
    SupportVector(SvrRegressor<Fitted>),
    NeuralNetwork(MlpRegressor<Fitted>),
}

impl FittedRegressor {
    pub fn family(&self) -> ModelFamily {
        match self {
            FittedRegressor::DecisionTree(_) => ModelFamily::DecisionTree,
            FittedRegressor::SupportVector(_) => ModelFamily::SupportVector,
            FittedRegressor::NeuralNetwork(_) => ModelFamily::NeuralNetwork,
        }
    }
}

impl InferenceModel for FittedRegressor {
    fn predict(&self, x: ArrayView1<'_, f64>) -> f64 {
        match self {
            FittedRegressor::DecisionTree(m) => m.predict(x),
            FittedRegressor::SupportVector(m) => m.predict(x),
            FittedRegressor::NeuralNetwork(m) => m.predict(x),
        }
    }

    fn n_features(&self) -> usize {
        match self {
            FittedRegressor::DecisionTree(m) => m.n_features(),
            FittedRegressor::SupportVector(m) => m.n_features(),
            FittedRegressor::NeuralNetwork(m) => m.n_features(),
        }
    }
}

impl From<DecisionTreeRegressor<Fitted>> for FittedRegressor {
    fn from(model: DecisionTreeRegressor<Fitted>) -> Self {
        FittedRegressor::DecisionTree(model)
    }
}

impl From<SvrRegressor<Fitted>> for FittedRegressor {
    fn from(model: SvrRegressor<Fitted>) -> Self {
        FittedRegressor::SupportVector(model)
    }
}

impl From<MlpRegressor<Fitted>> for FittedRegressor {
    fn from(model: MlpRegressor<Fitted>) -> Self {
        FittedRegressor::NeuralNetwork(model)
    }
}

/// Shared input checks for every `fit`.
pub(crate) fn check_training_data(model: &str, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(PipelineError::training(
            0,
            format!("cannot fit {} on an empty table", model),
        ));
    }
    if x.ncols() == 0 {
        return Err(PipelineError::training(
            x.nrows(),
            format!("cannot fit {} without feature columns", model),
        ));
    }
    if x.nrows() != y.len() {
        return Err(PipelineError::training(
            x.nrows(),
            format!("{} feature rows but {} targets", x.nrows(), y.len()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_labels_roundtrip() {
        for family in ModelFamily::ALL {
            assert_eq!(family.label().parse::<ModelFamily>().unwrap(), family);
        }
    }

    #[test]
    fn test_family_aliases() {
        assert_eq!(
            "Karar Ağacı".parse::<ModelFamily>().unwrap(),
            ModelFamily::DecisionTree
        );
        assert_eq!("SVR".parse::<ModelFamily>().unwrap(), ModelFamily::SupportVector);
        assert_eq!(
            " Yapay Sinir Ağı ".parse::<ModelFamily>().unwrap(),
            ModelFamily::NeuralNetwork
        );
        assert_eq!(
            "Neural Network".parse::<ModelFamily>().unwrap(),
            ModelFamily::NeuralNetwork
        );
    }

    #[test]
    fn test_unknown_family() {
        let err = "Quantile Forest".parse::<ModelFamily>().unwrap_err();
        match err {
            PipelineError::UnknownModel { label, available } => {
                assert_eq!(label, "Quantile Forest");
                assert!(available.contains("decision tree"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_kernel_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            kernels: Vec<Kernel>,
        }
        let parsed: Wrapper = toml::from_str(r#"kernels = ["linear", "rbf"]"#).unwrap();
        assert_eq!(parsed.kernels, vec![Kernel::Linear, Kernel::Rbf]);
        assert_eq!(Kernel::Rbf.to_string(), "rbf");
    }

    #[test]
    fn test_check_training_data() {
        let x = Array2::<f64>::zeros((3, 2));
        assert!(check_training_data("m", &x, &Array1::zeros(3)).is_ok());
        assert!(check_training_data("m", &x, &Array1::zeros(2)).is_err());
        assert!(check_training_data("m", &Array2::zeros((0, 2)), &Array1::zeros(0)).is_err());
    }
}
