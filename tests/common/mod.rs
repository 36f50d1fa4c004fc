#![allow(dead_code)]

use cellspace::data::model::{
    PHENOTYPE_COLUMN, TISSUE_CATEGORY_COLUMN, X_COLUMN, Y_COLUMN,
};
use cellspace::{CellTable, CellValue};

/// Ten cells, all within 50 microns of each other, none coincident:
/// four `A`, three `B`, three `other`.
pub fn ten_cell_field() -> CellTable {
    let phenotypes = ["A", "A", "A", "A", "B", "B", "B", "other", "other", "other"];
    let categories = ["Tumor", "Tumor", "Stroma", "Stroma", "Tumor", "Stroma", "Tumor", "Tumor", "Stroma", "Stroma"];
    let x: Vec<CellValue> = (0..10).map(|i| CellValue::Float((i % 5) as f64 * 7.0)).collect();
    let y: Vec<CellValue> = (0..10).map(|i| CellValue::Float((i / 5) as f64 * 9.0 + i as f64)).collect();
    CellTable::from_columns(vec![
        (X_COLUMN.to_string(), x),
        (Y_COLUMN.to_string(), y),
        (PHENOTYPE_COLUMN.to_string(), phenotypes.iter().map(|p| CellValue::from(*p)).collect()),
        (TISSUE_CATEGORY_COLUMN.to_string(), categories.iter().map(|c| CellValue::from(*c)).collect()),
    ])
    .unwrap()
}

/// A tab-delimited cell segmentation export with the given rows of
/// (x, y, category, phenotype).
pub fn export_text(rows: &[(f64, f64, &str, &str)]) -> String {
    let mut out = String::from("Cell ID\tCell X Position\tCell Y Position\tTissue Category\tPhenotype\n");
    for (i, (x, y, cat, ph)) in rows.iter().enumerate() {
        out.push_str(&format!("{}\t{x}\t{y}\t{cat}\t{ph}\n", i + 1));
    }
    out
}
