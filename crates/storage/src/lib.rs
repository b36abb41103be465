//! Storage Layer
//!
//! Persists write-once Events and derived TileAggregate rows behind a
//! repository pattern. Events are append-only facts; aggregates are
//! disposable views that can always be rebuilt from the event set.

mod aggregate;
mod event;
mod repository;

pub use aggregate::{TileAggregate, WindowPolicy};
pub use event::{CongestionOutputs, DamageOutputs, Event, EventKind};
pub use repository::{Repository, StorageSummary};

use thiserror::Error;
use tile_grid::TileId;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Optimistic staleness check failed: the stored aggregate already
    /// reflects a newer event than the candidate write
    #[error("Stale aggregate write for tile {tile_id}")]
    StaleAggregate { tile_id: TileId },

    #[error("Invalid window policy: {0}")]
    InvalidWindowPolicy(String),
}
