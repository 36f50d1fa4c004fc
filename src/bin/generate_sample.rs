use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

/// Field size in microns.
const WIDTH: f64 = 1000.0;
const HEIGHT: f64 = 750.0;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

struct Cell {
    x: f64,
    y: f64,
    phenotype: &'static str,
    pdl1: f64,
}

fn generate_cells(rng: &mut SimpleRng) -> Vec<Cell> {
    let mut cells = Vec::new();

    // Tumour nests on the left half of the field
    let nests = [(150.0, 200.0), (300.0, 500.0), (380.0, 180.0)];
    for &(cx, cy) in &nests {
        for _ in 0..120 {
            cells.push(Cell {
                x: rng.gauss(cx, 45.0).clamp(0.0, WIDTH),
                y: rng.gauss(cy, 45.0).clamp(0.0, HEIGHT),
                phenotype: "CK+",
                pdl1: rng.gauss(4.0, 1.5).max(0.0),
            });
        }
    }

    // Immune and stromal cells scattered over the whole field
    let scattered = [("CD8+", 150), ("CD68+", 90), ("CD163+", 40), ("Other", 200)];
    for &(phenotype, n) in &scattered {
        for _ in 0..n {
            cells.push(Cell {
                x: rng.uniform(0.0, WIDTH),
                y: rng.uniform(0.0, HEIGHT),
                phenotype,
                pdl1: rng.gauss(1.0, 0.8).max(0.0),
            });
        }
    }
    cells
}

fn tissue_category(cell: &Cell) -> &'static str {
    if cell.x < WIDTH / 2.0 { "Tumor" } else { "Stroma" }
}

fn write_parquet(cells: &[Cell], output_path: &str) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("Cell ID", DataType::Int64, false),
        Field::new("Cell X Position", DataType::Float64, false),
        Field::new("Cell Y Position", DataType::Float64, false),
        Field::new("Tissue Category", DataType::Utf8, false),
        Field::new("Phenotype", DataType::Utf8, false),
        Field::new("Entire Cell PDL1 Mean", DataType::Float64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from_iter_values(1..=cells.len() as i64)),
            Arc::new(Float64Array::from_iter_values(cells.iter().map(|c| c.x))),
            Arc::new(Float64Array::from_iter_values(cells.iter().map(|c| c.y))),
            Arc::new(StringArray::from_iter_values(cells.iter().map(tissue_category))),
            Arc::new(StringArray::from_iter_values(cells.iter().map(|c| c.phenotype))),
            Arc::new(Float64Array::from_iter_values(cells.iter().map(|c| c.pdl1))),
        ],
    )
    .context("Failed to create RecordBatch")?;

    let file = std::fs::File::create(output_path).context("Failed to create output file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("Failed to create writer")?;
    writer.write(&batch).context("Failed to write batch")?;
    writer.close().context("Failed to close writer")?;
    Ok(())
}

/// Same cells as a tab-delimited export, units annotated the way the
/// segmentation software writes them.
fn write_tsv(cells: &[Cell], output_path: &str) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(output_path)
        .context("Failed to create output file")?;
    wtr.write_record([
        "Cell ID",
        "Cell X Position",
        "Cell Y Position",
        "Tissue Category",
        "Phenotype",
        "Entire Cell PDL1 Mean (Normalized Counts, Total Weighting)",
    ])?;
    for (i, cell) in cells.iter().enumerate() {
        wtr.write_record([
            (i + 1).to_string(),
            format!("{:.2}", cell.x),
            format!("{:.2}", cell.y),
            tissue_category(cell).to_string(),
            cell.phenotype.to_string(),
            format!("{:.3}", cell.pdl1),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let cells = generate_cells(&mut rng);

    write_parquet(&cells, "sample_cells.parquet")?;
    write_tsv(&cells, "sample_cells_cell_seg_data.txt")?;

    println!(
        "Wrote {} cells ({WIDTH}x{HEIGHT} microns) to sample_cells.parquet and sample_cells_cell_seg_data.txt",
        cells.len()
    );
    Ok(())
}
