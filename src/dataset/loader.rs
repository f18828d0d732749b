//! Loading the listing table from a CSV file or a spreadsheet workbook.
//!
//! The first row holds the column names in both formats. Any failure to open
//! or read the source is reported as [`PipelineError::DataLoad`] so the caller
//! can halt cleanly.

use super::table::{RawTable, RawValue};
use crate::error::{PipelineError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| WORKBOOK_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Load a listing table, choosing the reader from the file extension.
///
/// Workbook extensions go to [`load_workbook`]; everything else is read as CSV.
pub fn load_table<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let path = path.as_ref();
    if is_workbook(path) {
        load_workbook(path)
    } else {
        load_csv(path)
    }
}

/// Load a CSV file into a [`RawTable`].
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let path = path.as_ref();
    let source = path.display().to_string();

    let file = File::open(path).map_err(|e| PipelineError::DataLoad {
        path: source.clone(),
        reason: e.to_string(),
    })?;
    let table = read_csv(BufReader::new(file), &source)?;
    info!(
        "Loaded {} rows and {} columns from {}",
        table.n_rows(),
        table.n_cols(),
        source
    );
    Ok(table)
}

/// Read CSV from any reader. `source` only labels errors.
pub fn read_csv<R: Read>(reader: R, source: &str) -> Result<RawTable> {
    let load_err = |reason: String| PipelineError::DataLoad {
        path: source.to_string(),
        reason,
    };

    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let columns: Vec<String> = rdr
        .headers()
        .map_err(|e| load_err(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if columns.is_empty() || columns.iter().all(|c| c.trim().is_empty()) {
        return Err(load_err("no header row".to_string()));
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| load_err(e.to_string()))?;
        rows.push(record.iter().map(RawValue::parse_cell).collect());
    }

    RawTable::new(columns, rows)
}

/// Load the first sheet of a workbook (xlsx, xlsm, xlsb, xls or ods).
///
/// Numeric cells become [`RawValue::Number`], text cells go through the same
/// parsing as CSV cells, and empty or error cells become [`RawValue::Missing`].
pub fn load_workbook<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let path = path.as_ref();
    let source = path.display().to_string();
    let load_err = |reason: String| PipelineError::DataLoad {
        path: source.clone(),
        reason,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| load_err(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| load_err("workbook has no sheets".to_string()))?
        .map_err(|e| load_err(e.to_string()))?;

    let mut rows = range.rows();
    let columns: Vec<String> = rows
        .next()
        .ok_or_else(|| load_err("no header row".to_string()))?
        .iter()
        .map(|cell| cell.to_string())
        .collect();
    if columns.iter().all(|c| c.trim().is_empty()) {
        return Err(load_err("no header row".to_string()));
    }

    let rows = rows
        .map(|row| row.iter().map(cell_value).collect())
        .collect();
    let table = RawTable::new(columns, rows)?;
    info!(
        "Loaded {} rows and {} columns from workbook {}",
        table.n_rows(),
        table.n_cols(),
        source
    );
    Ok(table)
}

fn cell_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty | Data::Error(_) => RawValue::Missing,
        Data::Int(v) => RawValue::Number(*v as f64),
        Data::Float(v) => RawValue::Number(*v),
        Data::String(s) => RawValue::parse_cell(s),
        other => RawValue::parse_cell(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LISTINGS_XLSX: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/listings.xlsx");

    #[test]
    fn test_read_csv_basic() {
        let data = "ilce,fiyat,metrekare\nKadıköy,\"450,000TL\",120\nŞişli,,95\n";
        let table = read_csv(data.as_bytes(), "inline").unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.columns(), &["ilce", "fiyat", "metrekare"]);
        assert_eq!(table.rows()[0][1], RawValue::text("450,000TL"));
        assert_eq!(table.rows()[1][1], RawValue::Missing);
    }

    #[test]
    fn test_read_csv_ragged_row_is_load_error() {
        let data = "a,b\n1,2\n3\n";
        let result = read_csv(data.as_bytes(), "inline");
        assert!(matches!(result, Err(PipelineError::DataLoad { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_csv("/definitely/not/here.csv");
        assert!(matches!(result, Err(PipelineError::DataLoad { .. })));
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tip,fiyat").unwrap();
        writeln!(file, "Daire,\"300,000TL\"").unwrap();
        let table = load_csv(file.path()).unwrap();
        assert_eq!(table.n_rows(), 1);
    }

    #[test]
    fn test_load_workbook_first_sheet() {
        let table = load_workbook(LISTINGS_XLSX).unwrap();
        assert_eq!(
            table.columns(),
            &["ilce", "tip", "metrekare", "binayas", "fiyat"]
        );
        assert_eq!(table.n_rows(), 3);

        let first = &table.rows()[0];
        assert_eq!(first[0], RawValue::text("Kadıköy"));
        assert_eq!(first[2], RawValue::Number(120.0));
        assert_eq!(first[4], RawValue::text("450,000TL"));

        let second = &table.rows()[1];
        assert_eq!(second[2], RawValue::Number(250.5));
        assert_eq!(second[3], RawValue::Missing);
        assert_eq!(second[4], RawValue::Number(1_200_000.0));
    }

    #[test]
    fn test_load_table_dispatches_on_extension() {
        let workbook = load_table(LISTINGS_XLSX).unwrap();
        assert_eq!(workbook.n_rows(), 3);

        let mut csv = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(csv, "tip,fiyat").unwrap();
        writeln!(csv, "Daire,100").unwrap();
        assert_eq!(load_table(csv.path()).unwrap().n_rows(), 1);
    }

    #[test]
    fn test_load_missing_workbook() {
        let result = load_table("/definitely/not/here.xlsx");
        assert!(matches!(result, Err(PipelineError::DataLoad { .. })));
    }

    #[test]
    fn test_corrupt_workbook_is_load_error() {
        let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        file.write_all(b"ilce,fiyat\nnot a zip archive\n").unwrap();
        let result = load_table(file.path());
        assert!(matches!(result, Err(PipelineError::DataLoad { .. })));
    }
}
