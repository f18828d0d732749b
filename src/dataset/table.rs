use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trim and lower-case a column or field name.
pub fn normalize_header(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A single raw cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum RawValue {
    #[default]
    Missing,
    Text(String),
    Number(f64),
}

impl RawValue {
    pub fn text(s: impl Into<String>) -> Self {
        RawValue::Text(s.into())
    }

    /// Interpret a cell read from a text source. Blank cells and the usual
    /// spreadsheet spellings of NaN become [`RawValue::Missing`].
    pub fn parse_cell(cell: &str) -> Self {
        let trimmed = cell.trim();
        if trimmed.is_empty() || matches!(trimmed, "nan" | "NaN" | "NA" | "null") {
            RawValue::Missing
        } else {
            RawValue::Text(cell.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, RawValue::Missing)
    }

    /// Best-effort numeric coercion; `None` for missing or unparsable cells.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Missing => None,
            RawValue::Number(v) => v.is_finite().then_some(*v),
            RawValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }

    /// Category label of the cell; `None` for missing cells.
    ///
    /// Whole numbers render without a fractional part so that `3` typed into a
    /// form matches the `"3"` read from a file.
    pub fn as_category(&self) -> Option<String> {
        match self {
            RawValue::Missing => None,
            RawValue::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            RawValue::Number(v) if !v.is_finite() => None,
            RawValue::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => {
                Some(format!("{}", *v as i64))
            }
            RawValue::Number(v) => Some(v.to_string()),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Number(v)
    }
}

/// One listing keyed by (normalized) field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    fields: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: &str, value: impl Into<RawValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<RawValue>) {
        self.fields.insert(normalize_header(field), value.into());
    }

    /// Look up a field; the name is normalized the same way as on insert.
    pub fn get(&self, field: &str) -> Option<&RawValue> {
        self.fields.get(&normalize_header(field))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<'a> FromIterator<(&'a str, RawValue)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (&'a str, RawValue)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (field, value) in iter {
            record.insert(field, value);
        }
        record
    }
}

/// Rows of raw listings with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<RawValue>>,
}

impl RawTable {
    /// Create a table, checking that every row has one cell per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<RawValue>>) -> Result<Self> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(PipelineError::data_format(
                    "<row>",
                    Some(i),
                    format!("expected {} cells, got {}", columns.len(), row.len()),
                ));
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &RawValue> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    pub fn rows(&self) -> &[Vec<RawValue>] {
        &self.rows
    }

    /// Copy of the table with trimmed, lower-cased column names.
    pub fn with_normalized_headers(&self) -> Self {
        Self {
            columns: self.columns.iter().map(|c| normalize_header(c)).collect(),
            rows: self.rows.clone(),
        }
    }

    /// One row as a record.
    pub fn record(&self, row: usize) -> Option<RawRecord> {
        let cells = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .zip(cells.iter())
                .map(|(c, v)| (c.as_str(), v.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell_blank_is_missing() {
        assert_eq!(RawValue::parse_cell("   "), RawValue::Missing);
        assert_eq!(RawValue::parse_cell("NaN"), RawValue::Missing);
        assert_eq!(RawValue::parse_cell("3+1"), RawValue::text("3+1"));
    }

    #[test]
    fn test_as_number_coercion() {
        assert_eq!(RawValue::text(" 120 ").as_number(), Some(120.0));
        assert_eq!(RawValue::text("yüz").as_number(), None);
        assert_eq!(RawValue::Number(f64::NAN).as_number(), None);
        assert_eq!(RawValue::Missing.as_number(), None);
    }

    #[test]
    fn test_as_category_formats_whole_numbers() {
        assert_eq!(RawValue::Number(3.0).as_category(), Some("3".to_string()));
        assert_eq!(RawValue::Number(2.5).as_category(), Some("2.5".to_string()));
        assert_eq!(RawValue::text(" Var ").as_category(), Some("Var".to_string()));
        assert_eq!(RawValue::text("  ").as_category(), None);
    }

    #[test]
    fn test_record_keys_are_normalized() {
        let record = RawRecord::new().with(" ILCE ", "Beşiktaş");
        assert!(record.get("ilce").is_some());
        assert!(record.get("Ilce").is_some());
    }

    #[test]
    fn test_table_rejects_ragged_rows() {
        let result = RawTable::new(
            vec!["a".into(), "b".into()],
            vec![vec![RawValue::Number(1.0)]],
        );
        assert!(matches!(result, Err(PipelineError::DataFormat { row: Some(0), .. })));
    }

    #[test]
    fn test_normalized_headers_do_not_touch_original() {
        let table = RawTable::new(vec![" Fiyat ".into()], vec![vec!["1TL".into()]]).unwrap();
        let normalized = table.with_normalized_headers();
        assert_eq!(normalized.columns(), &["fiyat".to_string()]);
        assert_eq!(table.columns(), &[" Fiyat ".to_string()]);
    }

    #[test]
    fn test_record_from_row() {
        let table = RawTable::new(
            vec!["ilce".into(), "metrekare".into()],
            vec![vec!["Şişli".into(), RawValue::Number(90.0)]],
        )
        .unwrap();
        let record = table.record(0).unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("metrekare"), Some(&RawValue::Number(90.0)));
        assert!(table.record(1).is_none());
    }
}
