use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Write;

use crate::error::CellError;

// ---------------------------------------------------------------------------
// Column-name conventions of the cell segmentation export
// ---------------------------------------------------------------------------

pub const X_COLUMN: &str = "Cell X Position";
pub const Y_COLUMN: &str = "Cell Y Position";
pub const PHENOTYPE_COLUMN: &str = "Phenotype";
pub const TISSUE_CATEGORY_COLUMN: &str = "Tissue Category";
pub const CELL_ID_COLUMN: &str = "Cell ID";

/// Prefix of the per-marker phenotype columns (`Phenotype CD8`, ...).
pub const MARKER_COLUMN_PREFIX: &str = "Phenotype ";

/// Name of the per-marker column holding the classification of `marker`.
///
/// The marker must carry its trailing sign: `CD8+` and `CD8-` both live in
/// the column `Phenotype CD8`.
pub fn marker_column_name(marker: &str) -> Result<String, CellError> {
    let bare = marker
        .strip_suffix('+')
        .or_else(|| marker.strip_suffix('-'))
        .ok_or_else(|| {
            CellError::Schema(format!(
                "marker '{marker}' must end with '+' or '-' to select a per-marker column"
            ))
        })?;
    Ok(format!("{MARKER_COLUMN_PREFIX}{bare}"))
}

// ---------------------------------------------------------------------------
// CellValue – a single cell of the table
// ---------------------------------------------------------------------------

/// A dynamically-typed table value.
/// Kept `Ord` so distinct values can be collected into a `BTreeSet`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

/// Nulls render as an empty field so written tables read back as nulls.
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Float(v)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Integer(v)
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        CellValue::Bool(v)
    }
}

impl CellValue {
    /// Interpret the value as an `f64` when it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

// ---------------------------------------------------------------------------
// CellTable – one field of segmented cells
// ---------------------------------------------------------------------------

/// A cell segmentation table for a single field, stored column-wise.
///
/// Row order is kept exactly as loaded. It is only used to line derived
/// columns (distances, counts) up with their source rows.
#[derive(Debug, Clone, PartialEq)]
pub struct CellTable {
    /// Centroid X in microns, one per row.
    pub x: Vec<f64>,
    /// Centroid Y in microns, one per row.
    pub y: Vec<f64>,
    /// Every column name in source order (includes the coordinate columns).
    pub column_names: Vec<String>,
    /// Column values by name.
    pub columns: BTreeMap<String, Vec<CellValue>>,
}

impl CellTable {
    /// Build a table from named columns.
    ///
    /// All columns must have the same length, names must be unique, and the
    /// X/Y position columns must be present with a number in every row.
    pub fn from_columns(columns: Vec<(String, Vec<CellValue>)>) -> Result<Self, CellError> {
        let n_rows = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        let mut column_names = Vec::with_capacity(columns.len());
        let mut by_name = BTreeMap::new();

        for (name, values) in columns {
            if values.len() != n_rows {
                return Err(CellError::Validation(format!(
                    "column '{name}' has {} values, expected {n_rows}",
                    values.len()
                )));
            }
            if by_name.contains_key(&name) {
                return Err(CellError::Validation(format!("duplicate column '{name}'")));
            }
            column_names.push(name.clone());
            by_name.insert(name, values);
        }

        let x = coordinate_column(&by_name, X_COLUMN)?;
        let y = coordinate_column(&by_name, Y_COLUMN)?;

        Ok(CellTable {
            x,
            y,
            column_names,
            columns: by_name,
        })
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Whether the table has no cells.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[CellValue]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// The unified phenotype column, if this table uses that schema variant.
    pub fn phenotype_column(&self) -> Option<&[CellValue]> {
        self.column(PHENOTYPE_COLUMN)
    }

    /// Sorted set of non-null values in a column (empty if the column is absent).
    pub fn distinct_values(&self, name: &str) -> BTreeSet<CellValue> {
        self.column(name)
            .map(|vals| vals.iter().filter(|v| !v.is_null()).cloned().collect())
            .unwrap_or_default()
    }

    /// Append a derived column, or replace an existing one of the same name.
    pub fn with_column(mut self, name: &str, values: Vec<CellValue>) -> Result<Self, CellError> {
        if values.len() != self.len() {
            return Err(CellError::Validation(format!(
                "derived column '{name}' has {} values for {} rows",
                values.len(),
                self.len()
            )));
        }
        if !self.columns.contains_key(name) {
            self.column_names.push(name.to_string());
        }
        self.columns.insert(name.to_string(), values);
        Ok(self)
    }

    /// Write the table as CSV, columns in `column_names` order.
    pub fn to_csv_writer<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.column_names)?;
        for row in 0..self.len() {
            let record = self
                .column_names
                .iter()
                .map(|name| self.columns[name][row].to_string());
            wtr.write_record(record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn coordinate_column(
    columns: &BTreeMap<String, Vec<CellValue>>,
    name: &str,
) -> Result<Vec<f64>, CellError> {
    let values = columns
        .get(name)
        .ok_or_else(|| CellError::Schema(format!("missing coordinate column '{name}'")))?;
    values
        .iter()
        .enumerate()
        .map(|(row, v)| {
            v.as_f64().ok_or_else(|| {
                CellError::Schema(format!("'{name}' row {row}: '{v}' is not a number"))
            })
        })
        .collect()
}
