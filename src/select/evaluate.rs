use crate::data::model::{CellTable, CellValue, marker_column_name};
use crate::error::CellError;

use super::selector::{CompareOp, Predicate, Selector};

/// Row mask for `selector`: `true` where the cell is selected.
pub fn select_rows(table: &CellTable, selector: &Selector) -> Result<Vec<bool>, CellError> {
    select_rows_all(table, std::slice::from_ref(selector))
}

/// Conjunction of several selectors.
///
/// Every selector is evaluated, even after the mask has become all-false,
/// so a bad selector late in the list is still reported.
pub fn select_rows_all(table: &CellTable, selectors: &[Selector]) -> Result<Vec<bool>, CellError> {
    let mut mask = vec![true; table.len()];
    for selector in selectors {
        let part = evaluate(table, selector)?;
        and_into(&mut mask, &part);
    }
    Ok(mask)
}

/// Indices of the selected rows.
pub fn selected_indices(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter(|(_, keep)| **keep)
        .map(|(i, _)| i)
        .collect()
}

fn and_into(mask: &mut [bool], other: &[bool]) {
    for (m, o) in mask.iter_mut().zip(other) {
        *m = *m && *o;
    }
}

fn evaluate(table: &CellTable, selector: &Selector) -> Result<Vec<bool>, CellError> {
    match selector {
        Selector::All => Ok(vec![true; table.len()]),
        Selector::AnyOf(names) => any_of(table, names),
        Selector::AllOf(parts) => select_rows_all(table, parts),
        Selector::Predicate(pred) => evaluate_predicate(table, pred),
    }
}

// ---------------------------------------------------------------------------
// Phenotype membership
// ---------------------------------------------------------------------------

fn any_of(table: &CellTable, names: &[String]) -> Result<Vec<bool>, CellError> {
    let mut mask = vec![false; table.len()];

    if let Some(phenotypes) = table.phenotype_column() {
        for (m, value) in mask.iter_mut().zip(phenotypes) {
            *m = value
                .as_str()
                .is_some_and(|p| names.iter().any(|n| n == p));
        }
        return Ok(mask);
    }

    for marker in names {
        let column_name = marker_column_name(marker)?;
        let column = table.column(&column_name).ok_or_else(|| {
            CellError::Schema(format!(
                "no '{column_name}' column to select '{marker}' (and no Phenotype column)"
            ))
        })?;
        let positive = marker.ends_with('+');
        for (m, value) in mask.iter_mut().zip(column) {
            *m = *m || marker_matches(value, marker, positive);
        }
    }
    Ok(mask)
}

/// A per-marker cell holds either the signed marker text or a bool.
fn marker_matches(value: &CellValue, marker: &str, positive: bool) -> bool {
    match value {
        CellValue::String(s) => s == marker,
        CellValue::Bool(b) => *b == positive,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// Evaluate a column expression for every row. Null cells compare false.
pub fn evaluate_predicate(table: &CellTable, pred: &Predicate) -> Result<Vec<bool>, CellError> {
    match pred {
        Predicate::Compare { column, op, value } => {
            let values = table.column(column).ok_or_else(|| {
                CellError::Eval(format!("column '{column}' not found in table"))
            })?;
            Ok(values.iter().map(|v| compare(v, *op, value)).collect())
        }
        Predicate::And(parts) => {
            let mut mask = vec![true; table.len()];
            for p in parts {
                and_into(&mut mask, &evaluate_predicate(table, p)?);
            }
            Ok(mask)
        }
        Predicate::Or(parts) => {
            let mut mask = vec![false; table.len()];
            for p in parts {
                let part = evaluate_predicate(table, p)?;
                for (m, o) in mask.iter_mut().zip(part) {
                    *m = *m || o;
                }
            }
            Ok(mask)
        }
        Predicate::Not(inner) => Ok(evaluate_predicate(table, inner)?
            .into_iter()
            .map(|b| !b)
            .collect()),
    }
}

fn compare(cell: &CellValue, op: CompareOp, literal: &CellValue) -> bool {
    let ord = match (cell, literal) {
        (CellValue::Null, _) | (_, CellValue::Null) => return false,
        (CellValue::String(a), CellValue::String(b)) => a.cmp(b),
        (CellValue::Bool(a), CellValue::Bool(b)) => {
            return matches!(op, CompareOp::Eq | CompareOp::Ne) && op.holds(a.cmp(b));
        }
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => match x.partial_cmp(&y) {
                Some(ord) => ord,
                None => return false,
            },
            _ => return false,
        },
    };
    op.holds(ord)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::data::model::{PHENOTYPE_COLUMN, X_COLUMN, Y_COLUMN};
    use crate::select::parser::parse_selector;

    fn coords(n: usize) -> Vec<(String, Vec<CellValue>)> {
        vec![
            (X_COLUMN.into(), (0..n).map(|i| CellValue::Float(i as f64)).collect()),
            (Y_COLUMN.into(), vec![CellValue::Float(0.0); n]),
        ]
    }

    fn unified_table() -> CellTable {
        let mut cols = coords(5);
        cols.push((
            PHENOTYPE_COLUMN.into(),
            vec!["CD8+".into(), "CK+".into(), "CD68+".into(), CellValue::Null, "CD163+".into()],
        ));
        cols.push((
            "PDL1 Mean".into(),
            vec![5.0.into(), 1.0.into(), CellValue::Integer(3), 7.5.into(), CellValue::Null],
        ));
        CellTable::from_columns(cols).unwrap()
    }

    fn marker_table() -> CellTable {
        let mut cols = coords(4);
        cols.push((
            "Phenotype CD3".into(),
            vec!["CD3+".into(), "CD3+".into(), "CD3-".into(), "CD3-".into()],
        ));
        cols.push((
            "Phenotype CD8".into(),
            vec![true.into(), false.into(), true.into(), false.into()],
        ));
        CellTable::from_columns(cols).unwrap()
    }

    #[test]
    fn unified_any_of() {
        let table = unified_table();
        let mask = select_rows(&table, &parse_selector("CD68+,CD163+").unwrap()).unwrap();
        assert_eq!(mask, vec![false, false, true, false, true]);
    }

    #[test]
    fn total_selects_everything() {
        let table = unified_table();
        assert_eq!(select_rows(&table, &Selector::All).unwrap(), vec![true; 5]);
    }

    #[test]
    fn per_marker_columns() {
        let table = marker_table();
        let cd3 = select_rows(&table, &Selector::phenotype("CD3+")).unwrap();
        let cd8 = select_rows(&table, &Selector::phenotype("CD8+")).unwrap();
        let cd8_neg = select_rows(&table, &Selector::phenotype("CD8-")).unwrap();
        assert_eq!(cd3, vec![true, true, false, false]);
        assert_eq!(cd8, vec![true, false, true, false]);
        assert_eq!(cd8_neg, vec![false, true, false, true]);

        let both = select_rows(&table, &parse_selector("CD3+/CD8+").unwrap()).unwrap();
        let expected: Vec<bool> = cd3.iter().zip(&cd8).map(|(a, b)| *a && *b).collect();
        assert_eq!(both, expected);
    }

    #[test]
    fn per_marker_schema_errors() {
        let table = marker_table();
        assert!(matches!(
            select_rows(&table, &Selector::phenotype("FoxP3+")),
            Err(CellError::Schema(_))
        ));
        assert!(matches!(
            select_rows(&table, &Selector::phenotype("CD3")),
            Err(CellError::Schema(_))
        ));
    }

    #[test]
    fn predicates_skip_nulls_and_compare_numbers() {
        let table = unified_table();
        let mask = select_rows(&table, &Selector::Predicate(Predicate::gt("PDL1 Mean", 2_i64))).unwrap();
        assert_eq!(mask, vec![true, false, true, true, false]);

        let negated = evaluate_predicate(
            &table,
            &Predicate::Not(Box::new(Predicate::gt("PDL1 Mean", 2.0))),
        )
        .unwrap();
        assert_eq!(negated, vec![false, true, false, false, true]);
    }

    #[test]
    fn phenotype_and_predicate_conjunction() {
        let table = unified_table();
        let selectors = vec![
            parse_selector("CD8+,CK+").unwrap(),
            Selector::Predicate(Predicate::gt("PDL1 Mean", 2.0)),
        ];
        let mask = select_rows_all(&table, &selectors).unwrap();
        assert_eq!(mask, vec![true, false, false, false, false]);
        assert_eq!(selected_indices(&mask), vec![0]);
    }

    #[test]
    fn missing_predicate_column_is_reported_after_empty_mask() {
        let table = unified_table();
        let selectors = vec![
            Selector::phenotype("nothing+"),
            Selector::Predicate(Predicate::gt("Missing Column", 1.0)),
        ];
        assert!(matches!(
            select_rows_all(&table, &selectors),
            Err(CellError::Eval(_))
        ));
    }
}
