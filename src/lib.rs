//! # housing-predictor
//!
//! Sale-price prediction for housing listings, with a strict guarantee that
//! the feature layout used to train the models is exactly the one used to
//! score new listings.
//!
//! ## Core Design Principles
//!
//! - **Explicit schema**: the one-hot encoder returns a versioned, immutable
//!   [`FeatureSchema`]. It travels with the models inside the
//!   [`TrainedArtifact`] and is the only authority on column order at
//!   inference time.
//! - **Stateful Type Safety**: models carry their training state in the type
//!   system (`Unfitted` vs `Fitted`); only fitted models can predict.
//! - **Determinism**: splits, tree growth and network initialization are
//!   seeded, and model sweeps pick winners by first-seen maximum.
//!
//! ## Quick Start
//!
//! ```no_run
//! use housing_predictor::{pipeline, PipelineConfig, PricePredictor, RawRecord};
//!
//! # fn main() -> housing_predictor::Result<()> {
//! let config = PipelineConfig::default();
//! let artifact = pipeline::train_from_path("HouseData2.csv", &config)?;
//!
//! let predictor = PricePredictor::new(artifact);
//! let listing = RawRecord::new()
//!     .with("ilce", "Kadıköy")
//!     .with("tip", "Daire")
//!     .with("metrekare", 120.0);
//! let prediction = predictor.predict(&listing, "neural network")?;
//! println!("{:.0} (R² {:.3})", prediction.price, prediction.score);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Structure
//!
//! - `dataset`: raw tables and records, CSV loading, splits, form options
//! - `preprocessing`: schema normalizer, one-hot encoder, inference projector
//! - `model`: decision tree, support-vector and neural-network regressors
//! - `selection`: best-of-N selection and cross-validated grid search
//! - `trainer`: split, fit and score every model family
//! - `serialization`: bincode parameters and the trained artifact
//! - `predictor`: prediction requests against an artifact
//! - `pipeline`: end-to-end training helpers

pub mod config;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod predictor;
pub mod preprocessing;
pub mod selection;
pub mod serialization;
pub mod trainer;

pub use config::{MissingPolicy, PipelineConfig, PriceFormat, TrainingConfig};
pub use dataset::{FormOptions, RawRecord, RawTable, RawValue};
pub use error::{PipelineError, Result};
pub use metrics::RegressionMetrics;
pub use model::{FittedRegressor, InferenceModel, Kernel, ModelFamily};
pub use predictor::{Prediction, PricePredictor};
pub use preprocessing::{FeatureSchema, InferenceProjector, OneHotEncoder, SchemaNormalizer};
pub use serialization::TrainedArtifact;
pub use trainer::{ModelTrainer, TrainedModels, TrainerBuilder};
