mod common;

use pretty_assertions::assert_eq;

use cellspace::data::model::{X_COLUMN, Y_COLUMN};
use cellspace::select::{parse_selector, select_rows};
use cellspace::{CellError, CellTable, CellValue, Selector};

use common::ten_cell_field;

/// Per-marker schema: `Phenotype CD3` / `Phenotype CD8` text columns.
fn marker_field() -> CellTable {
    let cd3 = ["CD3+", "CD3+", "CD3-", "CD3+", "CD3-", "CD3-"];
    let cd8 = ["CD8+", "CD8-", "CD8+", "CD8+", "CD8-", "CD8-"];
    CellTable::from_columns(vec![
        (X_COLUMN.to_string(), (0..6).map(|i| CellValue::Float(i as f64)).collect()),
        (Y_COLUMN.to_string(), vec![CellValue::Float(0.0); 6]),
        ("Phenotype CD3".to_string(), cd3.iter().map(|s| CellValue::from(*s)).collect()),
        ("Phenotype CD8".to_string(), cd8.iter().map(|s| CellValue::from(*s)).collect()),
    ])
    .unwrap()
}

#[test]
fn slash_is_and_of_single_phenotypes() {
    let sel = parse_selector("CD3+/CD8+").unwrap();
    assert_eq!(
        sel,
        Selector::AllOf(vec![Selector::phenotype("CD3+"), Selector::phenotype("CD8+")])
    );

    let table = marker_field();
    let cd3 = select_rows(&table, &Selector::phenotype("CD3+")).unwrap();
    let cd8 = select_rows(&table, &Selector::phenotype("CD8+")).unwrap();
    let expected: Vec<bool> = cd3.iter().zip(&cd8).map(|(a, b)| *a && *b).collect();
    assert_eq!(select_rows(&table, &sel).unwrap(), expected);
    assert_eq!(expected, vec![true, false, false, true, false, false]);
}

#[test]
fn comma_is_or_of_phenotypes() {
    let sel = parse_selector("CD68+,CD163+").unwrap();
    assert_eq!(sel, Selector::AnyOf(vec!["CD68+".into(), "CD163+".into()]));

    let table = marker_field();
    // per-marker table without these markers: a schema error, not an empty mask
    assert!(matches!(select_rows(&table, &sel), Err(CellError::Schema(_))));

    let or = select_rows(&table, &parse_selector("CD3-,CD8+").unwrap()).unwrap();
    let a = select_rows(&table, &Selector::phenotype("CD3-")).unwrap();
    let b = select_rows(&table, &Selector::phenotype("CD8+")).unwrap();
    let expected: Vec<bool> = a.iter().zip(&b).map(|(x, y)| *x || *y).collect();
    assert_eq!(or, expected);
}

#[test]
fn total_cells_selects_every_row() {
    let sel = parse_selector("Total Cells").unwrap();
    assert_eq!(sel, Selector::All);
    let table = ten_cell_field();
    assert_eq!(select_rows(&table, &sel).unwrap(), vec![true; 10]);
}

#[test]
fn mixed_separators_fail() {
    match parse_selector("CD3+/CD8+,X") {
        Err(CellError::Parse { description, .. }) => assert_eq!(description, "CD3+/CD8+,X"),
        other => panic!("unexpected {other:?}"),
    }
}
