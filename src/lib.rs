//! Phenotype selection and spatial statistics for cell segmentation tables.
//!
//! ```text
//!   loader ──▶ CellTable ──select──▶ row masks ──spatial──▶ distances / counts
//!                                                    │
//!                               batch: many files ◀──┘
//! ```

pub mod batch;
pub mod config;
pub mod data;
pub mod error;
pub mod select;
pub mod spatial;

pub use batch::{BatchResult, BatchRow, BatchSpec, FileLoader, PhenotypePair, TableSource};
pub use data::model::{CellTable, CellValue};
pub use error::CellError;
pub use select::{RuleSet, Selector};
pub use spatial::{DistanceMatrix, WithinCount};
