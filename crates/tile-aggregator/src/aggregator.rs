//! Aggregator Implementation

use crate::AggregateError;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use storage::{Event, EventKind, Repository, StorageError, TileAggregate, WindowPolicy};
use tile_grid::{tile_center, TileId};
use tracing::{debug, info, warn};

/// Aggregator configuration
#[derive(Debug, Clone)]
pub struct AggregateConfig {
    /// Recency window policy used for every recompute
    pub window: WindowPolicy,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            window: WindowPolicy::default(),
        }
    }
}

/// Maintains per-tile rolling aggregates over an injected repository.
///
/// At most one recompute is in flight per tile at any time; aggregates
/// for different tiles recompute independently and in parallel.
pub struct TileAggregator {
    repository: Arc<Repository>,
    config: AggregateConfig,
    /// Per-tile recompute guards. The outer lock only protects the map;
    /// the inner locks serialize recomputation per tile.
    tile_locks: Mutex<HashMap<TileId, Arc<Mutex<()>>>>,
}

impl TileAggregator {
    /// Create an aggregator over the given repository
    pub fn new(repository: Arc<Repository>, config: AggregateConfig) -> Self {
        info!(window = %config.window, "creating tile aggregator");
        Self {
            repository,
            config,
            tile_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Append events to the store and return the distinct set of tiles
    /// touched. Repeated event ids are no-ops.
    pub fn record_events(&self, events: Vec<Event>) -> Result<BTreeSet<TileId>, AggregateError> {
        let mut touched = BTreeSet::new();
        for event in events {
            let tile_id = event.tile_id;
            if self.repository.insert_event(event)? {
                touched.insert(tile_id);
            }
        }
        Ok(touched)
    }

    /// Record events and recompute every touched tile.
    pub fn record_and_recompute(
        &self,
        events: Vec<Event>,
    ) -> Result<BTreeSet<TileId>, AggregateError> {
        let touched = self.record_events(events)?;
        for tile_id in &touched {
            self.recompute_tile(tile_id)?;
        }
        Ok(touched)
    }

    /// Recompute one tile's aggregate from its most recent N events and
    /// upsert the replacement row.
    ///
    /// A tile with zero events leaves any existing aggregate untouched
    /// and returns `Ok(None)`. A stale-write rejection from the store is
    /// retried once after re-reading the event set.
    pub fn recompute_tile(
        &self,
        tile_id: &TileId,
    ) -> Result<Option<TileAggregate>, AggregateError> {
        let guard = self.lock_for(tile_id);
        let _held = guard.lock().map_err(|e| {
            AggregateError::Storage(StorageError::DatabaseError(format!("Lock error: {}", e)))
        })?;

        match self.recompute_locked(tile_id)? {
            RecomputeOutcome::Written(aggregate) => Ok(Some(aggregate)),
            RecomputeOutcome::Empty => Ok(None),
            RecomputeOutcome::Stale => {
                warn!(%tile_id, "stale aggregate write, retrying recompute");
                match self.recompute_locked(tile_id)? {
                    RecomputeOutcome::Written(aggregate) => Ok(Some(aggregate)),
                    RecomputeOutcome::Empty => Ok(None),
                    RecomputeOutcome::Stale => {
                        Err(AggregateError::RetryExhausted { tile_id: *tile_id })
                    }
                }
            }
        }
    }

    fn recompute_locked(&self, tile_id: &TileId) -> Result<RecomputeOutcome, AggregateError> {
        let events =
            self.repository
                .recent_events(tile_id, self.config.window.last_n, None)?;
        if events.is_empty() {
            debug!(%tile_id, "no events for tile, aggregate left untouched");
            return Ok(RecomputeOutcome::Empty);
        }

        let aggregate = compute_aggregate(tile_id, self.config.window, &events);
        match self.repository.upsert_aggregate(aggregate.clone()) {
            Ok(()) => Ok(RecomputeOutcome::Written(aggregate)),
            Err(StorageError::StaleAggregate { .. }) => Ok(RecomputeOutcome::Stale),
            Err(e) => Err(e.into()),
        }
    }

    fn lock_for(&self, tile_id: &TileId) -> Arc<Mutex<()>> {
        let mut locks = match self.tile_locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks
            .entry(*tile_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

enum RecomputeOutcome {
    Written(TileAggregate),
    Empty,
    Stale,
}

/// Derive the full aggregate for a tile from its last-N event set.
fn compute_aggregate(tile_id: &TileId, window: WindowPolicy, events: &[Event]) -> TileAggregate {
    let total = events.len();
    let mut pothole_count = 0;
    let mut crack_count = 0;
    let mut congestion_count = 0;
    let mut severity_sum = 0.0;
    let mut max_severity = 0.0f64;
    let mut confidence_sum = 0.0;

    let mut congestion_score_sum = 0.0;
    let mut vehicle_count_sum = 0.0;
    let mut max_vehicle_count = 0u32;
    let mut defect_area_sum = 0.0;
    let mut max_defect_area = 0.0f64;
    let mut damage_events = 0usize;

    for event in events {
        match event.kind {
            EventKind::Pothole => pothole_count += 1,
            EventKind::Crack => crack_count += 1,
            EventKind::Congestion => congestion_count += 1,
        }
        severity_sum += event.severity;
        max_severity = max_severity.max(event.severity);
        confidence_sum += event.confidence;

        if let Some(out) = event.congestion_outputs() {
            congestion_score_sum += out.traffic_density_score;
            vehicle_count_sum += out.vehicle_count;
            max_vehicle_count = max_vehicle_count.max(out.vehicle_count as u32);
        }
        if let Some(out) = event.damage_outputs() {
            defect_area_sum += out.total_defect_area;
            max_defect_area = max_defect_area.max(out.total_defect_area);
            damage_events += 1;
        }
    }

    let last_event_at = events
        .iter()
        .map(|e| e.detected_at)
        .max()
        .unwrap_or_else(Utc::now);
    let (center_lat, center_lon) = tile_center(tile_id);

    TileAggregate {
        tile_id: *tile_id,
        window,
        total_events: total,
        pothole_count,
        crack_count,
        congestion_count,
        avg_severity: severity_sum / total as f64,
        max_severity,
        avg_confidence: confidence_sum / total as f64,
        avg_congestion_score: if congestion_count > 0 {
            congestion_score_sum / congestion_count as f64
        } else {
            0.0
        },
        avg_vehicle_count: if congestion_count > 0 {
            vehicle_count_sum / congestion_count as f64
        } else {
            0.0
        },
        max_vehicle_count,
        avg_defect_area: if damage_events > 0 {
            defect_area_sum / damage_events as f64
        } else {
            0.0
        },
        max_defect_area,
        center_lat,
        center_lon,
        last_event_at,
        last_updated: Utc::now(),
    }
}
