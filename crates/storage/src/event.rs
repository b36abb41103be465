//! Event Record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tile_grid::TileId;
use uuid::Uuid;

/// Kind of a fused road-condition event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Pothole,
    Crack,
    Congestion,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Pothole => "pothole",
            EventKind::Crack => "crack",
            EventKind::Congestion => "congestion",
        }
    }

    /// Structural-damage kinds, as opposed to congestion
    pub fn is_damage(&self) -> bool {
        matches!(self, EventKind::Pothole | EventKind::Crack)
    }
}

/// One fused, geolocated, timestamped detection of a road condition.
/// Created exactly once by the fusion stage and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: Uuid,
    pub kind: EventKind,
    pub detected_at: DateTime<Utc>,
    pub device_id: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub tile_id: TileId,
    /// Derived severity score in [0,100]
    pub severity: f64,
    /// Model confidence in [0,1]
    pub confidence: f64,
    /// Opaque structured payload carrying the model outputs that
    /// produced this event
    pub model_outputs: serde_json::Value,
    /// References to supporting video frames
    pub frame_refs: Vec<String>,
}

/// Congestion-specific fields read back out of `model_outputs`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CongestionOutputs {
    #[serde(default)]
    pub traffic_density_score: f64,
    #[serde(default)]
    pub vehicle_count: f64,
}

/// Damage-specific fields read back out of `model_outputs`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DamageOutputs {
    #[serde(default)]
    pub total_defect_area: f64,
}

impl Event {
    /// Typed view of the payload for congestion events, defaulting
    /// missing fields to zero.
    pub fn congestion_outputs(&self) -> Option<CongestionOutputs> {
        if self.kind != EventKind::Congestion {
            return None;
        }
        Some(serde_json::from_value(self.model_outputs.clone()).unwrap_or_default())
    }

    /// Typed view of the payload for damage events, defaulting missing
    /// fields to zero.
    pub fn damage_outputs(&self) -> Option<DamageOutputs> {
        if !self.kind.is_damage() {
            return None;
        }
        Some(serde_json::from_value(self.model_outputs.clone()).unwrap_or_default())
    }
}
