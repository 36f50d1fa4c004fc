//! Data layer: core table types and loading.
//!
//! Architecture:
//! ```text
//!  .txt / .csv / .json / .parquet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file, clean headers → columns
//!   └──────────┘
//!        │
//!        ▼
//!   ┌───────────┐
//!   │ CellTable  │  x / y centroids, named columns
//!   └───────────┘
//!        │
//!        ▼
//!   select (row masks) → spatial (distances, counts)
//! ```

pub mod loader;
pub mod model;
