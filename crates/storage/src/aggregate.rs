//! Tile Aggregate Record

use crate::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tile_grid::TileId;

/// Recency window policy an aggregate was computed under.
///
/// Serializes as the string tag `last_{n}` that keys the aggregate row
/// together with the tile id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct WindowPolicy {
    pub last_n: usize,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self { last_n: 20 }
    }
}

impl fmt::Display for WindowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "last_{}", self.last_n)
    }
}

impl From<WindowPolicy> for String {
    fn from(policy: WindowPolicy) -> Self {
        policy.to_string()
    }
}

impl TryFrom<String> for WindowPolicy {
    type Error = StorageError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.strip_prefix("last_")
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .map(|last_n| Self { last_n })
            .ok_or(StorageError::InvalidWindowPolicy(s))
    }
}

/// Rolling statistical summary of one tile, recomputed in full from the
/// most recent N events on every update. Derived and disposable; never a
/// source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileAggregate {
    pub tile_id: TileId,
    pub window: WindowPolicy,

    pub total_events: usize,
    pub pothole_count: usize,
    pub crack_count: usize,
    pub congestion_count: usize,

    pub avg_severity: f64,
    pub max_severity: f64,
    pub avg_confidence: f64,

    /// Derived only from congestion-kind events in the window
    pub avg_congestion_score: f64,
    pub avg_vehicle_count: f64,
    pub max_vehicle_count: u32,

    /// Derived only from damage-kind events in the window
    pub avg_defect_area: f64,
    pub max_defect_area: f64,

    pub center_lat: f64,
    pub center_lon: f64,

    pub last_event_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}
