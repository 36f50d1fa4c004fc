use rayon::prelude::*;

use crate::data::model::{CELL_ID_COLUMN, CellTable, CellValue};
use crate::error::CellError;
use crate::select::{RuleSet, select_rows, selected_indices};

// ---------------------------------------------------------------------------
// DistanceMatrix
// ---------------------------------------------------------------------------

/// Dense pairwise Euclidean distances between the cells of one field.
///
/// Coordinates are field-relative, so a matrix is only meaningful for the
/// table it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DistanceMatrix {
    pub fn from_points(x: &[f64], y: &[f64]) -> Self {
        debug_assert_eq!(x.len(), y.len());
        let n = x.len().min(y.len());
        let mut data = vec![0.0; n * n];
        if n > 0 {
            data.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
                for (j, d) in row.iter_mut().enumerate() {
                    *d = (x[i] - x[j]).hypot(y[i] - y[j]);
                }
            });
        }
        log::debug!("built {n}x{n} distance matrix");
        DistanceMatrix { n, data }
    }

    pub fn from_table(table: &CellTable) -> Self {
        Self::from_points(&table.x, &table.y)
    }

    /// Number of cells (rows and columns).
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    /// Distances from cell `i` to every cell.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// Fail unless the matrix was built for a table with `n_rows` cells.
    pub(crate) fn check_rows(&self, n_rows: usize) -> Result<(), CellError> {
        if self.n != n_rows {
            return Err(CellError::Validation(format!(
                "distance matrix covers {} cells but the table has {n_rows}",
                self.n
            )));
        }
        Ok(())
    }
}

/// Use the caller's matrix when given, otherwise build one for `table`.
pub(crate) fn matrix_for<'a>(
    table: &CellTable,
    supplied: Option<&'a DistanceMatrix>,
    owned: &'a mut Option<DistanceMatrix>,
) -> Result<&'a DistanceMatrix, CellError> {
    match supplied {
        Some(dm) => {
            dm.check_rows(table.len())?;
            Ok(dm)
        }
        None => Ok(owned.insert(DistanceMatrix::from_table(table))),
    }
}

// ---------------------------------------------------------------------------
// Nearest-neighbour distances
// ---------------------------------------------------------------------------

/// Distance from every cell to the closest *other* cell of one phenotype.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestDistance {
    pub phenotype: String,
    /// `None` when no other cell has the phenotype.
    pub distance: Vec<Option<f64>>,
    /// Row index of the nearest matching cell.
    pub nearest_row: Vec<Option<usize>>,
}

/// Nearest-neighbour distances for every rule in `rules`, aligned with the
/// rows of `table`. A cell is never its own nearest neighbour.
pub fn nearest_distances(
    table: &CellTable,
    rules: &RuleSet,
    distances: Option<&DistanceMatrix>,
) -> Result<Vec<NearestDistance>, CellError> {
    let mut owned = None;
    let dm = matrix_for(table, distances, &mut owned)?;

    rules
        .iter()
        .map(|(name, selector)| {
            let mask = select_rows(table, selector)?;
            let targets = selected_indices(&mask);

            let (distance, nearest_row): (Vec<_>, Vec<_>) = (0..table.len())
                .map(|i| {
                    let row = dm.row(i);
                    targets
                        .iter()
                        .filter(|&&j| j != i)
                        .map(|&j| (row[j], j))
                        .min_by(|a, b| a.0.total_cmp(&b.0))
                        .map(|(d, j)| (Some(d), Some(j)))
                        .unwrap_or((None, None))
                })
                .unzip();

            Ok(NearestDistance {
                phenotype: name.to_string(),
                distance,
                nearest_row,
            })
        })
        .collect()
}

/// Append `Distance to <phenotype>` and `Cell ID <phenotype>` columns.
///
/// The cell ID is taken from the `Cell ID` column when the table has one,
/// otherwise it is the 1-based row number. Results computed for a table
/// with a different row count are a validation error.
pub fn with_nearest_columns(
    table: CellTable,
    results: &[NearestDistance],
) -> Result<CellTable, CellError> {
    if let Some(bad) = results.iter().find(|r| {
        r.distance.len() != table.len() || r.nearest_row.len() != table.len()
    }) {
        return Err(CellError::Validation(format!(
            "nearest distances for '{}' cover {} rows, table has {}",
            bad.phenotype,
            bad.distance.len(),
            table.len()
        )));
    }

    let ids: Vec<CellValue> = match table.column(CELL_ID_COLUMN) {
        Some(ids) => ids.to_vec(),
        None => (1..=table.len() as i64).map(CellValue::Integer).collect(),
    };

    let mut table = table;
    for result in results {
        let distance = result
            .distance
            .iter()
            .map(|d| d.map(CellValue::Float).unwrap_or(CellValue::Null))
            .collect();
        let nearest_id = result
            .nearest_row
            .iter()
            .map(|r| r.map(|r| ids[r].clone()).unwrap_or(CellValue::Null))
            .collect();
        table = table
            .with_column(&format!("Distance to {}", result.phenotype), distance)?
            .with_column(&format!("Cell ID {}", result.phenotype), nearest_id)?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{PHENOTYPE_COLUMN, X_COLUMN, Y_COLUMN};
    use crate::select::parse_phenotypes;

    fn table(points: &[(f64, f64, &str)]) -> CellTable {
        CellTable::from_columns(vec![
            (X_COLUMN.into(), points.iter().map(|p| p.0.into()).collect()),
            (Y_COLUMN.into(), points.iter().map(|p| p.1.into()).collect()),
            (PHENOTYPE_COLUMN.into(), points.iter().map(|p| p.2.into()).collect()),
        ])
        .unwrap()
    }

    #[test]
    fn matrix_is_symmetric_with_zero_diagonal() {
        let dm = DistanceMatrix::from_points(&[0.0, 3.0, 0.0], &[0.0, 4.0, 1.0]);
        assert_eq!(dm.len(), 3);
        assert_eq!(dm.get(0, 1), 5.0);
        assert_eq!(dm.get(1, 0), 5.0);
        assert_eq!(dm.get(2, 2), 0.0);
        assert_eq!(dm.row(0), &[0.0, 5.0, 1.0]);
    }

    #[test]
    fn empty_matrix() {
        assert!(DistanceMatrix::from_points(&[], &[]).is_empty());
    }

    #[test]
    fn nearest_excludes_self() {
        let t = table(&[(0.0, 0.0, "A+"), (10.0, 0.0, "A+"), (1.0, 0.0, "B+")]);
        let rules = parse_phenotypes(&["A+", "B+"], None).unwrap();
        let res = nearest_distances(&t, &rules, None).unwrap();

        assert_eq!(res[0].phenotype, "A+");
        assert_eq!(res[0].distance, vec![Some(10.0), Some(10.0), Some(1.0)]);
        assert_eq!(res[0].nearest_row, vec![Some(1), Some(0), Some(0)]);
        // the only B+ cell has no other B+ cell
        assert_eq!(res[1].distance, vec![Some(1.0), Some(9.0), None]);
    }

    #[test]
    fn coincident_cells_give_zero() {
        let t = table(&[(2.0, 2.0, "A+"), (2.0, 2.0, "A+")]);
        let rules = parse_phenotypes(&["A+"], None).unwrap();
        let res = nearest_distances(&t, &rules, None).unwrap();
        assert_eq!(res[0].distance, vec![Some(0.0), Some(0.0)]);
    }

    #[test]
    fn mismatched_matrix_is_rejected() {
        let t = table(&[(0.0, 0.0, "A+")]);
        let dm = DistanceMatrix::from_points(&[0.0, 1.0], &[0.0, 1.0]);
        let rules = parse_phenotypes(&["A+"], None).unwrap();
        assert!(matches!(
            nearest_distances(&t, &rules, Some(&dm)),
            Err(CellError::Validation(_))
        ));
    }

    #[test]
    fn nearest_columns_are_appended() {
        let t = table(&[(0.0, 0.0, "A+"), (3.0, 4.0, "B+")]);
        let rules = parse_phenotypes(&["B+"], None).unwrap();
        let res = nearest_distances(&t, &rules, None).unwrap();
        let out = with_nearest_columns(t, &res).unwrap();

        assert_eq!(
            out.column("Distance to B+").unwrap(),
            &[CellValue::Float(5.0), CellValue::Null]
        );
        assert_eq!(
            out.column("Cell ID B+").unwrap(),
            &[CellValue::Integer(2), CellValue::Null]
        );
    }

    #[test]
    fn nearest_columns_from_another_field_are_rejected() {
        let big = table(&[
            (0.0, 0.0, "A+"),
            (1.0, 0.0, "A+"),
            (2.0, 0.0, "A+"),
            (3.0, 0.0, "A+"),
            (4.0, 0.0, "A+"),
        ]);
        let rules = parse_phenotypes(&["A+"], None).unwrap();
        let res = nearest_distances(&big, &rules, None).unwrap();

        let small = table(&[(0.0, 0.0, "A+"), (1.0, 0.0, "A+")]);
        assert!(matches!(
            with_nearest_columns(small, &res),
            Err(CellError::Validation(_))
        ));
    }
}
