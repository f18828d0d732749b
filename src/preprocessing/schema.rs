//! The canonical feature schema shared by training and inference.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Layout version written into every schema. Bumped whenever the column
/// naming or ordering rules change.
pub const SCHEMA_VERSION: u32 = 1;

/// Indicator columns produced by one categorical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBlock {
    field: String,
    /// Observed categories, sorted; column `offset + i` flags `categories[i]`.
    categories: Vec<String>,
    offset: usize,
}

impl CategoryBlock {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Ordered, immutable list of model input columns fixed at training time.
///
/// Numeric fields come first in configured order, followed by one block of
/// indicator columns per categorical field (configured order, categories
/// sorted lexicographically). Indicator columns are named
/// `"<field>_<category>"`.
///
/// There are no mutating methods: a schema is built once by the encoder and
/// then only read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    version: u32,
    target: String,
    unknown_category: String,
    numeric_fields: Vec<String>,
    blocks: Vec<CategoryBlock>,
    columns: Vec<String>,
}

impl FeatureSchema {
    /// # Errors
    /// [`PipelineError::DataFormat`] if two columns would share a name, for
    /// example field `a` with category `b_c` next to field `a_b` with
    /// category `c`.
    pub(crate) fn build(
        target: &str,
        unknown_category: &str,
        numeric_fields: Vec<String>,
        categorical: Vec<(String, BTreeSet<String>)>,
    ) -> Result<Self> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut claim = |field: &str, column: &str| {
            if seen.insert(column.to_string()) {
                Ok(())
            } else {
                Err(PipelineError::data_format(
                    field,
                    None,
                    format!("feature column '{}' would appear twice", column),
                ))
            }
        };

        for field in &numeric_fields {
            claim(field.as_str(), field.as_str())?;
        }
        let mut columns: Vec<String> = numeric_fields.clone();
        let mut blocks = Vec::with_capacity(categorical.len());

        for (field, categories) in categorical {
            let offset = columns.len();
            let categories: Vec<String> = categories.into_iter().collect();
            for category in &categories {
                let column = Self::indicator_name(&field, category);
                claim(field.as_str(), column.as_str())?;
                columns.push(column);
            }
            blocks.push(CategoryBlock {
                field,
                categories,
                offset,
            });
        }

        Ok(Self {
            version: SCHEMA_VERSION,
            target: target.to_string(),
            unknown_category: unknown_category.to_string(),
            numeric_fields,
            blocks,
            columns,
        })
    }

    /// Name of the indicator column for `field == category`.
    pub fn indicator_name(field: &str, category: &str) -> String {
        format!("{}_{}", field, category)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Number of feature columns (the target is not a feature).
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// All feature column names in model order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Sentinel used for missing categorical values when this schema was built.
    pub fn unknown_category(&self) -> &str {
        &self.unknown_category
    }

    pub fn numeric_fields(&self) -> &[String] {
        &self.numeric_fields
    }

    pub fn blocks(&self) -> &[CategoryBlock] {
        &self.blocks
    }

    /// Categories observed for a field during training.
    pub fn categories(&self, field: &str) -> Option<&[String]> {
        self.block(field).map(|b| b.categories())
    }

    /// Column of a numeric field.
    pub fn numeric_index(&self, field: &str) -> Option<usize> {
        self.numeric_fields.iter().position(|f| f == field)
    }

    /// Column flagging `field == category`, or `None` for a category never
    /// seen in training.
    pub fn column_index(&self, field: &str, category: &str) -> Option<usize> {
        let block = self.block(field)?;
        block
            .categories
            .binary_search_by(|c| c.as_str().cmp(category))
            .ok()
            .map(|i| block.offset + i)
    }

    /// Reject schemas written under a different layout version.
    pub fn check_version(&self) -> Result<()> {
        if self.version != SCHEMA_VERSION {
            return Err(PipelineError::Serialization(format!(
                "feature schema version {} is not supported (expected {})",
                self.version, SCHEMA_VERSION
            )));
        }
        Ok(())
    }

    fn block(&self, field: &str) -> Option<&CategoryBlock> {
        self.blocks.iter().find(|b| b.field == field)
    }
}
