//! Tile Grid
//!
//! Pure projection between geographic coordinates and ~1km grid tiles.
//! A tile is identified by an integer index pair derived from floor
//! division of latitude/longitude by a fixed degree-per-kilometer step.

mod grid;

pub use grid::{
    coordinate_to_tile, tile_bounds, tile_center, tile_distance, tiles_in_viewport,
    tiles_within_radius, TileBounds, TileId, KM_TO_DEG_LAT, TILE_SIZE_KM,
};

use thiserror::Error;

/// Tile grid errors
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// Identifier does not match the `T_<int>_<int>` grammar
    #[error("Invalid tile_id format: {0}")]
    InvalidTileId(String),
}
