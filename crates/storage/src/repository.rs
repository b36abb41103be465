//! Repository Implementation

use crate::{Event, EventKind, StorageError, TileAggregate, WindowPolicy};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tile_grid::TileId;
use tracing::{debug, info};
use uuid::Uuid;

/// Overall totals across the whole event store
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StorageSummary {
    pub total_events: usize,
    pub pothole_count: usize,
    pub crack_count: usize,
    pub congestion_count: usize,
    pub avg_severity: f64,
    pub max_severity: f64,
    pub tiles_with_events: usize,
    pub last_event_at: Option<DateTime<Utc>>,
}

/// Repository for event and aggregate access (in-memory implementation)
pub struct Repository {
    /// Write-once event log
    events: Mutex<Vec<Event>>,
    /// Seen event ids, for idempotent inserts
    event_ids: Mutex<HashSet<Uuid>>,
    /// Aggregates keyed by (tile, window policy)
    aggregates: Mutex<HashMap<(TileId, WindowPolicy), TileAggregate>>,
}

impl Repository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        info!("Creating in-memory repository");
        Self {
            events: Mutex::new(Vec::new()),
            event_ids: Mutex::new(HashSet::new()),
            aggregates: Mutex::new(HashMap::new()),
        }
    }

    /// Insert an event. Repeating an event_id is a no-op and returns
    /// `false`; events are never updated in place.
    pub fn insert_event(&self, event: Event) -> Result<bool, StorageError> {
        let mut ids = self
            .event_ids
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;
        if !ids.insert(event.event_id) {
            debug!(event_id = %event.event_id, "duplicate event, skipping insert");
            return Ok(false);
        }

        let mut events = self
            .events
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;
        events.push(event);
        Ok(true)
    }

    /// All events for a tile, newest first.
    pub fn events_for_tile(&self, tile_id: &TileId) -> Result<Vec<Event>, StorageError> {
        let events = self
            .events
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;
        let mut out: Vec<Event> = events
            .iter()
            .filter(|e| &e.tile_id == tile_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        Ok(out)
    }

    /// The most recent events for a tile, newest first, optionally
    /// filtered by kind.
    pub fn recent_events(
        &self,
        tile_id: &TileId,
        limit: usize,
        kind: Option<EventKind>,
    ) -> Result<Vec<Event>, StorageError> {
        let mut out = self.events_for_tile(tile_id)?;
        if let Some(kind) = kind {
            out.retain(|e| e.kind == kind);
        }
        out.truncate(limit);
        Ok(out)
    }

    /// Create-or-replace an aggregate row keyed by (tile, window).
    ///
    /// Optimistic staleness check: a candidate whose last-event timestamp
    /// is older than the stored row's is rejected with `StaleAggregate`
    /// so the caller can re-read and retry.
    pub fn upsert_aggregate(&self, aggregate: TileAggregate) -> Result<(), StorageError> {
        let mut aggregates = self
            .aggregates
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;

        let key = (aggregate.tile_id, aggregate.window);
        if let Some(existing) = aggregates.get(&key) {
            if existing.last_event_at > aggregate.last_event_at {
                return Err(StorageError::StaleAggregate {
                    tile_id: aggregate.tile_id,
                });
            }
        }
        aggregates.insert(key, aggregate);
        Ok(())
    }

    /// Fetch one aggregate row, if present.
    pub fn aggregate(
        &self,
        tile_id: &TileId,
        window: WindowPolicy,
    ) -> Result<Option<TileAggregate>, StorageError> {
        let aggregates = self
            .aggregates
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;
        Ok(aggregates.get(&(*tile_id, window)).cloned())
    }

    /// Aggregates whose tile centers fall inside a viewport, sorted by
    /// max severity descending.
    pub fn aggregates_in_viewport(
        &self,
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
        min_events: usize,
        window: WindowPolicy,
    ) -> Result<Vec<TileAggregate>, StorageError> {
        let aggregates = self
            .aggregates
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;

        let mut out: Vec<TileAggregate> = aggregates
            .values()
            .filter(|a| a.window == window)
            .filter(|a| a.center_lat >= min_lat && a.center_lat <= max_lat)
            .filter(|a| a.center_lon >= min_lon && a.center_lon <= max_lon)
            .filter(|a| a.total_events >= min_events)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.max_severity
                .partial_cmp(&a.max_severity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(out)
    }

    /// All non-empty aggregates, most recently active first.
    pub fn all_aggregates(
        &self,
        limit: usize,
        window: WindowPolicy,
    ) -> Result<Vec<TileAggregate>, StorageError> {
        let aggregates = self
            .aggregates
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;

        let mut out: Vec<TileAggregate> = aggregates
            .values()
            .filter(|a| a.window == window && a.total_events > 0)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.last_event_at.cmp(&a.last_event_at));
        out.truncate(limit);
        Ok(out)
    }

    /// Totals across the whole event store.
    pub fn summary(&self) -> Result<StorageSummary, StorageError> {
        let events = self
            .events
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;

        let mut summary = StorageSummary::default();
        let mut tiles = HashSet::new();
        let mut severity_sum = 0.0;
        for event in events.iter() {
            summary.total_events += 1;
            match event.kind {
                EventKind::Pothole => summary.pothole_count += 1,
                EventKind::Crack => summary.crack_count += 1,
                EventKind::Congestion => summary.congestion_count += 1,
            }
            severity_sum += event.severity;
            summary.max_severity = summary.max_severity.max(event.severity);
            tiles.insert(event.tile_id);
            summary.last_event_at = match summary.last_event_at {
                Some(t) if t >= event.detected_at => Some(t),
                _ => Some(event.detected_at),
            };
        }
        if summary.total_events > 0 {
            summary.avg_severity = severity_sum / summary.total_events as f64;
        }
        summary.tiles_with_events = tiles.len();
        Ok(summary)
    }

    /// Total event count
    pub fn event_count(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Number of aggregate rows
    pub fn aggregate_count(&self) -> usize {
        self.aggregates.lock().map(|a| a.len()).unwrap_or(0)
    }

    /// Clear all data (for testing)
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
        if let Ok(mut ids) = self.event_ids.lock() {
            ids.clear();
        }
        if let Ok(mut aggregates) = self.aggregates.lock() {
            aggregates.clear();
        }
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 29, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn event(id: Uuid, kind: EventKind, secs: i64, severity: f64) -> Event {
        Event {
            event_id: id,
            kind,
            detected_at: at(secs),
            device_id: Some("dev-1".to_string()),
            lat: 30.7333,
            lon: 76.7794,
            tile_id: tile_grid::coordinate_to_tile(30.7333, 76.7794),
            severity,
            confidence: 0.8,
            model_outputs: json!({}),
            frame_refs: vec![],
        }
    }

    #[test]
    fn test_insert_is_idempotent_per_event_id() {
        let repo = Repository::new();
        let id = Uuid::new_v4();
        assert!(repo.insert_event(event(id, EventKind::Pothole, 0, 60.0)).unwrap());
        assert!(!repo.insert_event(event(id, EventKind::Pothole, 0, 60.0)).unwrap());
        assert_eq!(repo.event_count(), 1);
    }

    #[test]
    fn test_recent_events_ordered_and_limited() {
        let repo = Repository::new();
        let tile = tile_grid::coordinate_to_tile(30.7333, 76.7794);
        for i in 0..5 {
            repo.insert_event(event(Uuid::new_v4(), EventKind::Pothole, i, 50.0))
                .unwrap();
        }
        let recent = repo.recent_events(&tile, 3, None).unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent[0].detected_at > recent[1].detected_at);
        assert!(recent[1].detected_at > recent[2].detected_at);
    }

    #[test]
    fn test_recent_events_kind_filter() {
        let repo = Repository::new();
        let tile = tile_grid::coordinate_to_tile(30.7333, 76.7794);
        repo.insert_event(event(Uuid::new_v4(), EventKind::Pothole, 0, 50.0)).unwrap();
        repo.insert_event(event(Uuid::new_v4(), EventKind::Congestion, 1, 30.0)).unwrap();
        let congestion = repo
            .recent_events(&tile, 10, Some(EventKind::Congestion))
            .unwrap();
        assert_eq!(congestion.len(), 1);
        assert_eq!(congestion[0].kind, EventKind::Congestion);
    }

    fn aggregate_at(last_event_secs: i64) -> TileAggregate {
        TileAggregate {
            tile_id: tile_grid::coordinate_to_tile(30.7333, 76.7794),
            window: WindowPolicy::default(),
            total_events: 1,
            pothole_count: 1,
            crack_count: 0,
            congestion_count: 0,
            avg_severity: 50.0,
            max_severity: 50.0,
            avg_confidence: 0.8,
            avg_congestion_score: 0.0,
            avg_vehicle_count: 0.0,
            max_vehicle_count: 0,
            avg_defect_area: 0.0,
            max_defect_area: 0.0,
            center_lat: 30.73,
            center_lon: 76.78,
            last_event_at: at(last_event_secs),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_upsert_rejects_stale_aggregate() {
        let repo = Repository::new();
        repo.upsert_aggregate(aggregate_at(100)).unwrap();
        let err = repo.upsert_aggregate(aggregate_at(50)).unwrap_err();
        assert!(matches!(err, StorageError::StaleAggregate { .. }));
        // Equal timestamp is a legal overwrite (idempotent recompute)
        repo.upsert_aggregate(aggregate_at(100)).unwrap();
    }

    #[test]
    fn test_viewport_filters_by_center_and_min_events() {
        let repo = Repository::new();
        repo.upsert_aggregate(aggregate_at(0)).unwrap();
        let hits = repo
            .aggregates_in_viewport(30.0, 31.0, 76.0, 77.0, 1, WindowPolicy::default())
            .unwrap();
        assert_eq!(hits.len(), 1);
        let misses = repo
            .aggregates_in_viewport(40.0, 41.0, 76.0, 77.0, 1, WindowPolicy::default())
            .unwrap();
        assert!(misses.is_empty());
        let below_min = repo
            .aggregates_in_viewport(30.0, 31.0, 76.0, 77.0, 2, WindowPolicy::default())
            .unwrap();
        assert!(below_min.is_empty());
    }

    #[test]
    fn test_summary_totals() {
        let repo = Repository::new();
        repo.insert_event(event(Uuid::new_v4(), EventKind::Pothole, 0, 40.0)).unwrap();
        repo.insert_event(event(Uuid::new_v4(), EventKind::Congestion, 5, 60.0)).unwrap();
        let summary = repo.summary().unwrap();
        assert_eq!(summary.total_events, 2);
        assert_eq!(summary.pothole_count, 1);
        assert_eq!(summary.congestion_count, 1);
        assert_eq!(summary.avg_severity, 50.0);
        assert_eq!(summary.max_severity, 60.0);
        assert_eq!(summary.tiles_with_events, 1);
        assert_eq!(summary.last_event_at, Some(at(5)));
    }
}
