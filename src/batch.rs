use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::data::loader::{SUPPORTED_EXTENSIONS, load_file};
use crate::data::model::CellTable;
use crate::error::CellError;
use crate::select::selector::json_string;
use crate::select::{RuleSet, Selector, resolve_rules, select_rows};
use crate::spatial::{DistanceMatrix, count_within, validate_radii};

// ---------------------------------------------------------------------------
// Job description
// ---------------------------------------------------------------------------

/// An ordered (from, to) phenotype pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhenotypePair {
    pub from: String,
    pub to: String,
}

impl PhenotypePair {
    pub fn new(from: &str, to: &str) -> Self {
        PhenotypePair {
            from: from.trim().to_string(),
            to: to.trim().to_string(),
        }
    }

    /// A pair must be a two-element list of phenotype names.
    pub fn from_json(value: &JsonValue) -> Result<Self, CellError> {
        match value.as_array().map(|v| v.as_slice()) {
            Some([from, to]) => Ok(PhenotypePair::new(
                json_string(from, "pair phenotype")?,
                json_string(to, "pair phenotype")?,
            )),
            _ => Err(CellError::Validation(format!(
                "each pair must be a list of two phenotypes, got {value}"
            ))),
        }
    }

    /// Parse the `pairs` entry of a job: a list of pairs.
    pub fn list_from_json(value: &JsonValue) -> Result<Vec<Self>, CellError> {
        value
            .as_array()
            .ok_or_else(|| CellError::Validation(format!("pairs must be a list, got {value}")))?
            .iter()
            .map(PhenotypePair::from_json)
            .collect()
    }
}

/// Everything needed to count co-occurrence across a batch of fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSpec {
    pub pairs: Vec<PhenotypePair>,
    pub radii: Vec<f64>,
    /// Tissue categories to restrict "from" cells to; empty means unfiltered.
    pub categories: Vec<String>,
    /// Rules for compound phenotypes; other names select themselves.
    pub rules: Option<RuleSet>,
}

impl BatchSpec {
    /// Check the arguments that do not depend on any file.
    pub fn validate(&self) -> Result<(), CellError> {
        if self.pairs.is_empty() {
            return Err(CellError::Validation("no phenotype pairs given".into()));
        }
        validate_radii(&self.radii)
    }

    /// Phenotype names used by the pairs, in first-use order.
    pub fn referenced_phenotypes(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for pair in &self.pairs {
            for name in [&pair.from, &pair.to] {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// Validate and resolve the complete rule set for this job.
    pub fn resolved_rules(&self) -> Result<RuleSet, CellError> {
        self.validate()?;
        resolve_rules(&self.referenced_phenotypes(), self.rules.as_ref())
    }

    fn category_filters(&self) -> Vec<Option<&str>> {
        if self.categories.is_empty() {
            vec![None]
        } else {
            self.categories.iter().map(|c| Some(c.as_str())).collect()
        }
    }
}

// ---------------------------------------------------------------------------
// Result table
// ---------------------------------------------------------------------------

/// One output row: a (source, pair, category, radius) combination.
/// Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRow {
    pub source: String,
    pub pair_from: String,
    pub pair_to: String,
    /// Empty when the counts are not restricted to a category.
    pub category: Option<String>,
    pub radius: f64,
    pub from_count: usize,
    pub to_count: usize,
    pub from_with: usize,
    pub within_mean: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    pub rows: Vec<BatchRow>,
}

impl BatchResult {
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        if self.rows.is_empty() {
            wtr.write_record([
                "source",
                "pair_from",
                "pair_to",
                "category",
                "radius",
                "from_count",
                "to_count",
                "from_with",
                "within_mean",
            ])?;
        }
        for row in &self.rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        self.to_writer(file)
    }
}

// ---------------------------------------------------------------------------
// Loading seam
// ---------------------------------------------------------------------------

/// Where batch tables come from.
pub trait TableSource: Sync {
    fn load(&self, path: &Path) -> Result<CellTable>;
}

/// Loads tables from disk with [`load_file`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl TableSource for FileLoader {
    fn load(&self, path: &Path) -> Result<CellTable> {
        load_file(path)
    }
}

/// Table files in `dir` with a supported extension, sorted by name.
pub fn list_field_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if path.is_file() && supported {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Count within radii for every pair and category of one field.
///
/// Rows come out in pair × category × radius order. `rules` must cover
/// every phenotype of the pairs (see [`BatchSpec::resolved_rules`]).
pub fn count_within_field(
    source: &str,
    table: &CellTable,
    spec: &BatchSpec,
    rules: &RuleSet,
) -> Result<Vec<BatchRow>, CellError> {
    let dm = DistanceMatrix::from_table(table);
    let categories = spec.category_filters();
    let mut rows = Vec::with_capacity(spec.pairs.len() * categories.len() * spec.radii.len());

    for pair in &spec.pairs {
        let from = select_rows(table, rule(rules, &pair.from)?)?;
        let to = select_rows(table, rule(rules, &pair.to)?)?;
        for category in &categories {
            let counts = count_within(table, &from, &to, &spec.radii, *category, Some(&dm))?;
            rows.extend(counts.into_iter().map(|c| BatchRow {
                source: source.to_string(),
                pair_from: pair.from.clone(),
                pair_to: pair.to.clone(),
                category: category.map(str::to_string),
                radius: c.radius,
                from_count: c.from_count,
                to_count: c.to_count,
                from_with: c.from_with,
                within_mean: c.within_mean,
            }));
        }
    }
    Ok(rows)
}

fn rule<'a>(rules: &'a RuleSet, name: &str) -> Result<&'a Selector, CellError> {
    rules
        .get(name)
        .ok_or_else(|| CellError::Configuration(format!("no rule for phenotype '{name}'")))
}

/// Count within radii across many fields.
///
/// Arguments are checked before any file is read. Files are processed in
/// parallel, but rows come back in file × pair × category × radius order.
/// The first file that fails aborts the whole batch.
pub fn count_within_batch<S: TableSource>(
    files: &[PathBuf],
    spec: &BatchSpec,
    source: &S,
) -> Result<BatchResult> {
    let rules = spec.resolved_rules()?;

    let per_file = files
        .par_iter()
        .map(|path| -> Result<Vec<BatchRow>> {
            let label = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let table = source
                .load(path)
                .with_context(|| format!("loading {}", path.display()))?;
            let rows = count_within_field(&label, &table, spec, &rules)
                .with_context(|| format!("processing {}", path.display()))?;
            log::info!("{label}: {} cells, {} rows", table.len(), rows.len());
            Ok(rows)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(BatchResult {
        rows: per_file.into_iter().flatten().collect(),
    })
}
