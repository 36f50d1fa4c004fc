//! Spatial statistics over one field: pairwise distances, nearest
//! neighbours and within-radius counts.

pub mod distance;
pub mod within;

pub use distance::{DistanceMatrix, NearestDistance, nearest_distances, with_nearest_columns};
pub use within::{
    CellWithinCounts, WithinCount, count_within, count_within_detail, validate_radii,
};
