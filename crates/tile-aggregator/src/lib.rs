//! Tile Aggregator
//!
//! Maintains one rolling statistical summary per tile, recomputed in full
//! from the most recent N events whenever new events land in the tile.
//! Recomputation is idempotent and order-independent for a fixed event
//! set; it is deliberately not incremental.

mod aggregator;

pub use aggregator::{AggregateConfig, TileAggregator};

use thiserror::Error;
use tile_grid::TileId;

/// Aggregation errors
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    /// A concurrent writer won the race twice in a row for the same tile
    #[error("Aggregate recompute kept losing races for tile {tile_id}")]
    RetryExhausted { tile_id: TileId },
}
