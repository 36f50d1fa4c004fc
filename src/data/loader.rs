use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellTable, CellValue};

/// Unit annotations the segmentation software appends to column headers.
const UNIT_SUFFIXES: &[&str] = &[
    " (Normalized Counts, Total Weighting)",
    " (Percent)",
    " (percent)",
    " (pixels)",
    " (microns)",
    " (sq microns)",
];

/// File extensions [`load_file`] understands.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "tsv", "csv", "json", "parquet", "pq"];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a cell table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.txt` / `.tsv` – tab-delimited cell segmentation export
/// * `.csv`          – comma-delimited table
/// * `.json`         – `[{ "Cell X Position": 1.5, "Phenotype": "CD8+", ... }, ...]`
/// * `.parquet`      – one scalar column per table column
pub fn load_file(path: &Path) -> Result<CellTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let columns = match ext.as_str() {
        "txt" | "tsv" => load_delimited(path, b'\t')?,
        "csv" => load_delimited(path, b',')?,
        "json" => load_json(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    let table = CellTable::from_columns(columns)
        .with_context(|| format!("building cell table from {}", path.display()))?;
    log::debug!("loaded {} cells from {}", table.len(), path.display());
    Ok(table)
}

/// Trim a header and drop the unit annotation the exporter appends to it.
pub fn clean_column_name(raw: &str) -> String {
    let mut name = raw.trim();
    for suffix in UNIT_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.trim_end();
        }
    }
    name.to_string()
}

// ---------------------------------------------------------------------------
// Delimited text loader
// ---------------------------------------------------------------------------

fn load_delimited(path: &Path, delimiter: u8) -> Result<Vec<(String, Vec<CellValue>)>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .context("opening delimited table")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading table headers")?
        .iter()
        .map(clean_column_name)
        .collect();

    let mut columns: Vec<Vec<CellValue>> = vec![Vec::new(); headers.len()];

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("table row {row_no}"))?;
        if record.len() != headers.len() {
            bail!(
                "table row {row_no}: {} fields but {} columns",
                record.len(),
                headers.len()
            );
        }
        for (col_idx, value) in record.iter().enumerate() {
            columns[col_idx].push(guess_value_type(value));
        }
    }

    Ok(headers.into_iter().zip(columns).collect())
}

fn guess_value_type(s: &str) -> CellValue {
    let s = s.trim();
    if s.is_empty() || s == "NA" || s == "#N/A" {
        return CellValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return CellValue::Float(f);
    }
    match s {
        "true" | "TRUE" => CellValue::Bool(true),
        "false" | "FALSE" => CellValue::Bool(false),
        _ => CellValue::String(s.to_string()),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented):
///
/// ```json
/// [
///   { "Cell X Position": 10.5, "Cell Y Position": 3.0, "Phenotype": "CD8+" },
///   ...
/// ]
/// ```
///
/// The column set is the union of keys in first-seen order; absent keys are null.
fn load_json(path: &Path) -> Result<Vec<(String, Vec<CellValue>)>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut names: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            let name = clean_column_name(key);
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    let mut columns: Vec<Vec<CellValue>> = vec![Vec::with_capacity(records.len()); names.len()];
    for rec in records {
        let obj = rec.as_object().context("Expected JSON object")?;
        let cleaned: Vec<(String, &JsonValue)> = obj
            .iter()
            .map(|(k, v)| (clean_column_name(k), v))
            .collect();
        for (col_idx, name) in names.iter().enumerate() {
            let value = cleaned
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| json_to_value(v))
                .unwrap_or(CellValue::Null);
            columns[col_idx].push(value);
        }
    }

    Ok(names.into_iter().zip(columns).collect())
}

fn json_to_value(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => guess_value_type(s),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file whose columns are scalar (string, integer, float, bool).
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Vec<(String, Vec<CellValue>)>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| clean_column_name(f.name()))
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: Vec<Vec<CellValue>> = vec![Vec::new(); names.len()];

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (col_idx, column) in columns.iter_mut().enumerate() {
            let array = batch.column(col_idx);
            column.extend((0..batch.num_rows()).map(|row| extract_value(array, row)));
        }
    }

    Ok(names.into_iter().zip(columns).collect())
}

/// Extract a single value from an Arrow column at a given row.
fn extract_value(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map(|s| guess_value_type(s.value(row)))
            .unwrap_or(CellValue::Null),
        DataType::LargeUtf8 => guess_value_type(col.as_string::<i64>().value(row)),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|a| CellValue::Integer(a.value(row) as i64))
            .unwrap_or(CellValue::Null),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| CellValue::Integer(a.value(row)))
            .unwrap_or(CellValue::Null),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|a| CellValue::Float(a.value(row) as f64))
            .unwrap_or(CellValue::Null),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| CellValue::Float(a.value(row)))
            .unwrap_or(CellValue::Null),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| CellValue::Bool(a.value(row)))
            .unwrap_or(CellValue::Null),
        other => CellValue::String(format!("{other:?}")),
    }
}
