//! Raw tabular data: in-memory representation, loading, splitting and summaries.
//!
//! # Core Concepts
//!
//! - **[`RawTable`]**: rows of listings as read from the source, every cell a
//!   [`RawValue`] (text, number or missing). Nothing is interpreted yet.
//! - **[`RawRecord`]**: a single listing keyed by field name, the shape in
//!   which the form layer submits a prediction request.
//! - **Splits**: seeded shuffle split and K-fold index generation used by the
//!   trainer.
//!
//! # Example
//!
//! ```rust
//! use housing_predictor::dataset::{RawRecord, RawValue};
//!
//! let record = RawRecord::new()
//!     .with("ilce", RawValue::text("Kadıköy"))
//!     .with("metrekare", RawValue::Number(120.0));
//! assert_eq!(record.get("metrekare").and_then(RawValue::as_number), Some(120.0));
//! ```

pub mod loader;
pub mod split;
pub mod summary;
pub mod table;

pub use self::loader::{load_csv, load_table, load_workbook, read_csv};
pub use self::split::{k_fold, train_test_split, TrainTestIndices};
pub use self::summary::{CategoricalOptions, FormOptions, NumericRange};
pub use self::table::{normalize_header, RawRecord, RawTable, RawValue};
