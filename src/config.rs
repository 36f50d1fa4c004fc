//! Batch job files.
//!
//! ```json
//! {
//!   "pairs": [["CD8+", "CK+"], ["Macrophage", "CK+"]],
//!   "radii": [10, 25, 50],
//!   "categories": ["Tumor", "Stroma"],
//!   "phenotype_rules": { "Macrophage": "CD68+,CD163+" }
//! }
//! ```
//!
//! `categories` and `phenotype_rules` are optional.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::batch::{BatchSpec, PhenotypePair};
use crate::error::CellError;
use crate::select::{RuleEntries, RuleSet};
use crate::select::selector::json_string;

/// Read and validate a batch job file.
pub fn load_batch_config(path: &Path) -> Result<BatchSpec> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading job file {}", path.display()))?;
    batch_spec_from_str(&text).with_context(|| format!("invalid job file {}", path.display()))
}

#[derive(Deserialize)]
struct JobRules {
    #[serde(default)]
    phenotype_rules: Option<RuleEntries>,
}

/// Parse a job document from text.
///
/// Unlike [`batch_spec_from_json`], a name repeated inside
/// `phenotype_rules` is caught here, since it is lost once the text is a
/// `serde_json::Value`.
pub fn batch_spec_from_str(text: &str) -> Result<BatchSpec> {
    let root: JsonValue = serde_json::from_str(text).context("parsing job JSON")?;
    let mut spec = batch_spec_from_json(&root)?;
    if spec.rules.is_some() {
        let raw: JobRules = serde_json::from_str(text).context("parsing phenotype_rules")?;
        spec.rules = raw.phenotype_rules.map(|e| e.to_rules()).transpose()?;
    }
    Ok(spec)
}

/// Build a [`BatchSpec`] from a parsed job document and validate it.
pub fn batch_spec_from_json(root: &JsonValue) -> Result<BatchSpec, CellError> {
    let obj = root
        .as_object()
        .ok_or_else(|| CellError::Validation("job must be a JSON object".into()))?;

    let pairs = obj
        .get("pairs")
        .ok_or_else(|| CellError::Validation("job has no 'pairs'".into()))?;
    let pairs = PhenotypePair::list_from_json(pairs)?;

    let radii = obj
        .get("radii")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| CellError::Validation("'radii' must be a list of numbers".into()))?
        .iter()
        .map(|r| {
            r.as_f64()
                .ok_or_else(|| CellError::Validation(format!("radius {r} is not a number")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let categories = match obj.get("categories") {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|c| json_string(c, "tissue category").map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => {
            return Err(CellError::Validation(format!(
                "'categories' must be a list, got {other}"
            )))
        }
    };

    let rules = match obj.get("phenotype_rules") {
        None | Some(JsonValue::Null) => None,
        Some(value) => Some(RuleSet::from_json(value)?),
    };

    let spec = BatchSpec {
        pairs,
        radii,
        categories,
        rules,
    };
    spec.validate()?;
    Ok(spec)
}
