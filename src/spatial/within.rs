use serde::Serialize;

use crate::data::model::{CellTable, CellValue, TISSUE_CATEGORY_COLUMN};
use crate::error::CellError;

use super::distance::{DistanceMatrix, matrix_for};

/// Summary of "to" cells around "from" cells at one radius.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithinCount {
    pub radius: f64,
    /// Number of "from" cells (after the category filter).
    pub from_count: usize,
    /// Number of "to" cells.
    pub to_count: usize,
    /// "from" cells with at least one other "to" cell within `radius`.
    pub from_with: usize,
    /// Mean number of "to" cells within `radius` of a "from" cell.
    pub within_mean: f64,
}

/// Per-cell counts behind a [`WithinCount`].
#[derive(Debug, Clone, PartialEq)]
pub struct CellWithinCounts {
    /// Row of the "from" cell in the table.
    pub row: usize,
    /// Number of "to" cells within each radius, in radius order.
    pub counts: Vec<usize>,
}

/// Radii must be a non-empty list of positive numbers.
pub fn validate_radii(radii: &[f64]) -> Result<(), CellError> {
    if radii.is_empty() {
        return Err(CellError::Validation("no radii given".into()));
    }
    // written so NaN fails as well
    if let Some(bad) = radii.iter().find(|r| !(**r > 0.0)) {
        return Err(CellError::Validation(format!(
            "radii must be positive, got {bad}"
        )));
    }
    Ok(())
}

/// Count, for every "from" cell, the other "to" cells within each radius.
///
/// `category` keeps only "from" cells in that tissue category; "to" cells
/// are counted wherever they are.
pub fn count_within_detail(
    table: &CellTable,
    from: &[bool],
    to: &[bool],
    radii: &[f64],
    category: Option<&str>,
    distances: Option<&DistanceMatrix>,
) -> Result<Vec<CellWithinCounts>, CellError> {
    validate_radii(radii)?;
    for (label, mask) in [("from", from), ("to", to)] {
        if mask.len() != table.len() {
            return Err(CellError::Validation(format!(
                "{label} mask has {} entries for {} cells",
                mask.len(),
                table.len()
            )));
        }
    }

    let from_rows = from_rows(table, from, category)?;
    let to_rows: Vec<usize> = crate::select::selected_indices(to);
    if from_rows.is_empty() || to_rows.is_empty() {
        return Ok(from_rows
            .into_iter()
            .map(|row| CellWithinCounts {
                row,
                counts: vec![0; radii.len()],
            })
            .collect());
    }

    let mut owned = None;
    let dm = matrix_for(table, distances, &mut owned)?;

    Ok(from_rows
        .into_iter()
        .map(|i| {
            let dists = dm.row(i);
            let counts = radii
                .iter()
                .map(|&r| {
                    to_rows
                        .iter()
                        .filter(|&&j| j != i && dists[j] <= r)
                        .count()
                })
                .collect();
            CellWithinCounts { row: i, counts }
        })
        .collect())
}

/// Summarise "to" cells around "from" cells for each radius.
pub fn count_within(
    table: &CellTable,
    from: &[bool],
    to: &[bool],
    radii: &[f64],
    category: Option<&str>,
    distances: Option<&DistanceMatrix>,
) -> Result<Vec<WithinCount>, CellError> {
    let detail = count_within_detail(table, from, to, radii, category, distances)?;
    let from_count = detail.len();
    let to_count = to.iter().filter(|t| **t).count();

    Ok(radii
        .iter()
        .enumerate()
        .map(|(k, &radius)| {
            let (from_with, total) = detail.iter().fold((0, 0), |(with, total), cell| {
                let c = cell.counts[k];
                (with + usize::from(c > 0), total + c)
            });
            WithinCount {
                radius,
                from_count,
                to_count,
                from_with,
                within_mean: if from_count == 0 {
                    0.0
                } else {
                    total as f64 / from_count as f64
                },
            }
        })
        .collect())
}

fn from_rows(
    table: &CellTable,
    from: &[bool],
    category: Option<&str>,
) -> Result<Vec<usize>, CellError> {
    let Some(category) = category else {
        return Ok(crate::select::selected_indices(from));
    };
    let categories = table.column(TISSUE_CATEGORY_COLUMN).ok_or_else(|| {
        CellError::Schema(format!(
            "category '{category}' requested but the table has no '{TISSUE_CATEGORY_COLUMN}' column"
        ))
    })?;
    if !table
        .distinct_values(TISSUE_CATEGORY_COLUMN)
        .contains(&CellValue::from(category))
    {
        log::warn!("no cells in tissue category '{category}'");
    }
    Ok(from
        .iter()
        .zip(categories)
        .enumerate()
        .filter(|(_, (keep, cat))| **keep && cat.as_str() == Some(category))
        .map(|(i, _)| i)
        .collect())
}
