//! Turning raw listings into the fixed-width numeric feature space.
//!
//! The preprocessing chain has a training path and an inference path that must
//! agree column for column:
//!
//! ```text
//! training:   RawTable --SchemaNormalizer--> NormalizedTable --OneHotEncoder--> EncodedTable
//!                                                                   |
//!                                                                   +--> FeatureSchema
//! inference:  RawRecord + FeatureSchema --InferenceProjector--> feature vector
//! ```
//!
//! # Core Types
//!
//! - [`SchemaNormalizer`]: cleans headers and prices, filters outliers, imputes gaps
//! - [`OneHotEncoder`] / [`FittedOneHotEncoder`]: expands categorical fields and
//!   produces the [`FeatureSchema`]
//! - [`FeatureSchema`]: immutable, versioned column layout fixed at training time
//! - [`InferenceProjector`]: conforms one new record to a [`FeatureSchema`]
//!
//! # Example
//!
//! ```ignore
//! use housing_predictor::preprocessing::{OneHotEncoder, SchemaNormalizer, Transformer};
//!
//! let normalized = SchemaNormalizer::new(config.clone()).normalize(&raw_table)?;
//! let fitted = OneHotEncoder::new().fit(&normalized)?;
//! let encoded = fitted.transform(&normalized)?;
//!
//! // later, for one form submission:
//! let x = InferenceProjector::new(fitted.schema()).project(&record);
//! ```

pub mod encoding;
pub mod normalize;
pub mod projection;
pub mod schema;
pub mod traits;

pub use encoding::{
    EncodedTable, FittedOneHotEncoder, HandleUnknown, OneHotEncoder, OneHotEncoderParams,
};
pub use normalize::{parse_price, quantile, NormalizedTable, SchemaNormalizer};
pub use projection::InferenceProjector;
pub use schema::{CategoryBlock, FeatureSchema, SCHEMA_VERSION};
pub use traits::{FittedTransformer, Transformer};
