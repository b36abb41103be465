//! Job Runner

use crate::detector::{Detector, FrameDetections, FrameRef};
use crate::PipelineError;
use chrono::{DateTime, Duration, Utc};
use event_detector::{
    detect_windows, DetectionPayload, DetectionRecord, SensorSample, WindowConfig, WindowSummary,
    TRAFFIC_DENSITY_GAIN,
};
use gps_interp::{interpolate_for_frame, GpsPoint};
use severity::{congestion_severity, structural_severity, DamageKind, StructuralInput};
use std::collections::BTreeSet;
use std::sync::Arc;
use storage::{Event, EventKind};
use tile_aggregator::TileAggregator;
use tile_grid::{coordinate_to_tile, TileId};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Frame sampling rate the detector ran at
    pub frames_per_second: f64,
    /// Minimum vehicles in a frame to emit a congestion event
    pub congestion_min_vehicles: u32,
    /// Minimum vehicle coverage fraction to emit a congestion event
    pub congestion_min_coverage: f64,
    /// Fixed confidence assigned to congestion events
    pub congestion_confidence: f64,
    pub window: WindowConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frames_per_second: 4.0,
            congestion_min_vehicles: 3,
            congestion_min_coverage: 0.15,
            congestion_confidence: 0.85,
            window: WindowConfig::default(),
        }
    }
}

/// One recorded drive submitted for processing
#[derive(Debug, Clone)]
pub struct VideoJob {
    pub job_id: Uuid,
    pub device_id: Option<String>,
    /// Wall-clock time of frame zero
    pub started_at: DateTime<Utc>,
    pub total_frames: usize,
    /// Ordered GPS track covering the drive; may be empty
    pub track: Vec<GpsPoint>,
    /// Inertial sensor stream recorded alongside the video
    pub samples: Vec<SensorSample>,
}

/// Outcome of one processed job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub events_recorded: usize,
    pub tiles_touched: BTreeSet<TileId>,
    pub frames_skipped: usize,
    pub windows_detected: usize,
}

/// Runs video jobs against an injected detector and aggregator.
pub struct Pipeline {
    detector: Box<dyn Detector>,
    aggregator: Arc<TileAggregator>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        detector: Box<dyn Detector>,
        aggregator: Arc<TileAggregator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            detector,
            aggregator,
            config,
        }
    }

    /// Process one job: detect on every frame, fuse, score, geolocate,
    /// and record the resulting events.
    ///
    /// Per-frame detector failures and unlocatable frames are skipped;
    /// only storage-level failures abort the job.
    pub fn run_job(&self, job: &VideoJob) -> Result<JobReport, PipelineError> {
        info!(
            job_id = %job.job_id,
            total_frames = job.total_frames,
            track_points = job.track.len(),
            sensor_samples = job.samples.len(),
            "processing job"
        );

        let mut events: Vec<Event> = Vec::new();
        let mut records: Vec<DetectionRecord> = Vec::new();
        let mut frames_skipped = 0usize;

        for frame_idx in 0..job.total_frames {
            let frame = FrameRef { frame_idx };
            let detections = match self.detector.detect(&frame) {
                Ok(d) => d,
                Err(e) => {
                    warn!(job_id = %job.job_id, error = %e, "skipping frame");
                    frames_skipped += 1;
                    continue;
                }
            };

            let timestamp = self.frame_time(job.started_at, frame_idx);
            self.collect_records(&detections, timestamp, &mut records);

            let estimate = interpolate_for_frame(&job.track, frame_idx, job.total_frames);
            if estimate.is_unlocatable() {
                debug!(frame_idx, "frame has no usable geolocation, dropping");
                frames_skipped += 1;
                continue;
            }

            self.frame_events(job, &frame, &detections, timestamp, &estimate, &mut events)?;
        }

        let summaries = detect_windows(&job.samples, &records, &self.config.window);
        let windows_detected = summaries.len();
        for summary in &summaries {
            if let Some(event) = self.window_event(job, summary)? {
                events.push(event);
            }
        }

        events.sort_by_key(|e| e.detected_at);
        let events_recorded = events.len();
        let tiles_touched = self.aggregator.record_and_recompute(events)?;

        info!(
            job_id = %job.job_id,
            events_recorded,
            tiles = tiles_touched.len(),
            frames_skipped,
            windows_detected,
            "job complete"
        );
        Ok(JobReport {
            events_recorded,
            tiles_touched,
            frames_skipped,
            windows_detected,
        })
    }

    fn frame_time(&self, started_at: DateTime<Utc>, frame_idx: usize) -> DateTime<Utc> {
        let offset_ms = (frame_idx as f64 / self.config.frames_per_second * 1000.0).round() as i64;
        started_at + Duration::milliseconds(offset_ms)
    }

    fn collect_records(
        &self,
        detections: &FrameDetections,
        timestamp: DateTime<Utc>,
        records: &mut Vec<DetectionRecord>,
    ) {
        if let Some(damage) = &detections.damage {
            records.push(DetectionRecord {
                timestamp,
                payload: DetectionPayload::Damage(damage.clone()),
            });
        }
        if let Some(congestion) = &detections.congestion {
            records.push(DetectionRecord {
                timestamp,
                payload: DetectionPayload::Congestion(congestion.clone()),
            });
        }
    }

    fn frame_events(
        &self,
        job: &VideoJob,
        frame: &FrameRef,
        detections: &FrameDetections,
        timestamp: DateTime<Utc>,
        estimate: &GpsPoint,
        events: &mut Vec<Event>,
    ) -> Result<(), PipelineError> {
        if let Some(damage) = &detections.damage {
            if damage.has_damage() {
                let (kind, damage_kind, needle) = if damage.potholes > 0 {
                    (EventKind::Pothole, DamageKind::Pothole, "pothole")
                } else {
                    (EventKind::Crack, DamageKind::Crack, "crack")
                };
                let mut confidence = damage.max_confidence_for(needle);
                if confidence == 0.0 {
                    confidence = damage
                        .detections
                        .iter()
                        .fold(0.0, |acc, d| acc.max(d.confidence));
                }
                let severity = structural_severity(&StructuralInput {
                    components: None,
                    confidence,
                    defect_area: damage.total_defect_area,
                    kind: damage_kind,
                });
                events.push(self.build_event(
                    job,
                    kind,
                    timestamp,
                    estimate.lat,
                    estimate.lon,
                    severity,
                    confidence,
                    to_outputs(damage)?,
                    vec![frame.name()],
                ));
            }
        }

        if let Some(congestion) = &detections.congestion {
            let count = congestion.vehicle_count();
            let coverage = congestion.total_vehicle_coverage;
            if count >= self.config.congestion_min_vehicles
                || coverage >= self.config.congestion_min_coverage
            {
                let mut outputs = to_outputs(congestion)?;
                if let Some(map) = outputs.as_object_mut() {
                    map.insert(
                        "traffic_density_score".to_string(),
                        (coverage * TRAFFIC_DENSITY_GAIN).into(),
                    );
                    map.insert("vehicle_count".to_string(), count.into());
                }
                events.push(self.build_event(
                    job,
                    EventKind::Congestion,
                    timestamp,
                    estimate.lat,
                    estimate.lon,
                    congestion_severity(coverage, count),
                    self.config.congestion_confidence,
                    outputs,
                    vec![frame.name()],
                ));
            }
        }
        Ok(())
    }

    /// Build an event from one trigger-window summary. The summary's
    /// validation score becomes the severity and its damage persistence
    /// the confidence; windows centered at (0, 0) are dropped.
    fn window_event(
        &self,
        job: &VideoJob,
        summary: &WindowSummary,
    ) -> Result<Option<Event>, PipelineError> {
        if summary.lat_center == 0.0 && summary.lon_center == 0.0 {
            debug!(started_at = %summary.started_at, "window has no geolocation, dropping");
            return Ok(None);
        }
        let mut outputs = to_outputs(summary)?;
        if let Some(map) = outputs.as_object_mut() {
            map.insert(
                "total_defect_area".to_string(),
                serde_json::json!(summary.max_defect_area),
            );
        }
        Ok(Some(self.build_event(
            job,
            EventKind::Pothole,
            summary.started_at,
            summary.lat_center,
            summary.lon_center,
            summary.validation_score,
            summary.damage_persistence,
            outputs,
            vec![],
        )))
    }

    #[allow(clippy::too_many_arguments)]
    fn build_event(
        &self,
        job: &VideoJob,
        kind: EventKind,
        detected_at: DateTime<Utc>,
        lat: f64,
        lon: f64,
        severity: f64,
        confidence: f64,
        model_outputs: serde_json::Value,
        frame_refs: Vec<String>,
    ) -> Event {
        Event {
            event_id: Uuid::new_v4(),
            kind,
            detected_at,
            device_id: job.device_id.clone(),
            lat,
            lon,
            tile_id: coordinate_to_tile(lat, lon),
            severity,
            confidence,
            model_outputs,
            frame_refs,
        }
    }
}

fn to_outputs<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, PipelineError> {
    serde_json::to_value(value).map_err(|e| PipelineError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DetectError;
    use chrono::TimeZone;
    use event_detector::{CongestionDetection, DamageDetection, Detection, SensorKind};
    use std::collections::HashMap;
    use storage::Repository;
    use tile_aggregator::AggregateConfig;

    /// Scripted detector: frame index to canned output or failure
    struct StubDetector {
        frames: HashMap<usize, Result<FrameDetections, String>>,
    }

    impl Detector for StubDetector {
        fn detect(&self, frame: &FrameRef) -> Result<FrameDetections, DetectError> {
            match self.frames.get(&frame.frame_idx) {
                Some(Ok(d)) => Ok(d.clone()),
                Some(Err(reason)) => Err(DetectError {
                    frame_idx: frame.frame_idx,
                    reason: reason.clone(),
                }),
                None => Ok(FrameDetections::default()),
            }
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 29, 12, 0, 0).unwrap()
    }

    fn track() -> Vec<GpsPoint> {
        vec![
            GpsPoint { lat: 30.7333, lon: 76.7794, velocity: 10.0, gyro_magnitude: 0.0 },
            GpsPoint { lat: 30.7400, lon: 76.7850, velocity: 12.0, gyro_magnitude: 0.0 },
        ]
    }

    fn pothole_frame(confidence: f64, area: f64) -> FrameDetections {
        FrameDetections {
            damage: Some(DamageDetection {
                potholes: 1,
                total_defect_area: area,
                detections: vec![Detection {
                    class: "pothole".to_string(),
                    confidence,
                    bbox: [0.0, 0.0, 10.0, 10.0],
                }],
                ..Default::default()
            }),
            congestion: None,
        }
    }

    fn congestion_frame(cars: u32, coverage: f64) -> FrameDetections {
        let mut det = CongestionDetection::default();
        det.class_counts.insert("car".to_string(), cars);
        det.total_vehicle_coverage = coverage;
        FrameDetections {
            damage: None,
            congestion: Some(det),
        }
    }

    fn harness(
        frames: HashMap<usize, Result<FrameDetections, String>>,
    ) -> (Pipeline, Arc<Repository>) {
        let repository = Arc::new(Repository::new());
        let aggregator = Arc::new(TileAggregator::new(
            repository.clone(),
            AggregateConfig::default(),
        ));
        let pipeline = Pipeline::new(
            Box::new(StubDetector { frames }),
            aggregator,
            PipelineConfig::default(),
        );
        (pipeline, repository)
    }

    fn job(total_frames: usize, track: Vec<GpsPoint>) -> VideoJob {
        VideoJob {
            job_id: Uuid::new_v4(),
            device_id: Some("device-7".to_string()),
            started_at: start(),
            total_frames,
            track,
            samples: vec![],
        }
    }

    #[test]
    fn test_damage_frame_produces_pothole_event() {
        let mut frames = HashMap::new();
        frames.insert(0usize, Ok(pothole_frame(0.8, 0.002)));
        let (pipeline, repository) = harness(frames);

        let report = pipeline.run_job(&job(4, track())).unwrap();
        assert_eq!(report.events_recorded, 1);
        assert_eq!(report.frames_skipped, 0);
        assert_eq!(report.tiles_touched.len(), 1);

        let tile = *report.tiles_touched.iter().next().unwrap();
        let events = repository.events_for_tile(&tile).unwrap();
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.kind, EventKind::Pothole);
        assert_eq!(e.confidence, 0.8);
        // confidence 0.8 -> 40, area 0.002 -> 10, pothole bonus 20
        assert!((e.severity - 70.0).abs() < 1e-9);
        assert_eq!(e.frame_refs, vec!["frame_00000".to_string()]);
        assert_eq!(e.device_id.as_deref(), Some("device-7"));
        assert!((e.damage_outputs().unwrap().total_defect_area - 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_congestion_thresholds_gate_events() {
        let mut frames = HashMap::new();
        // Below both thresholds: no event
        frames.insert(0usize, Ok(congestion_frame(2, 0.10)));
        // Count threshold alone
        frames.insert(1usize, Ok(congestion_frame(3, 0.01)));
        // Coverage threshold alone
        frames.insert(2usize, Ok(congestion_frame(1, 0.15)));
        let (pipeline, repository) = harness(frames);

        let report = pipeline.run_job(&job(4, track())).unwrap();
        assert_eq!(report.events_recorded, 2);

        let mut all = Vec::new();
        for tile in &report.tiles_touched {
            all.extend(repository.events_for_tile(tile).unwrap());
        }
        assert!(all.iter().all(|e| e.kind == EventKind::Congestion));
        assert!(all.iter().all(|e| e.confidence == 0.85));
        let out = all[0].congestion_outputs().unwrap();
        assert!(out.vehicle_count > 0.0 || out.traffic_density_score > 0.0);
    }

    #[test]
    fn test_detector_failure_skips_frame_only() {
        let mut frames = HashMap::new();
        frames.insert(0usize, Err("decode error".to_string()));
        frames.insert(1usize, Ok(pothole_frame(0.9, 0.001)));
        let (pipeline, _) = harness(frames);

        let report = pipeline.run_job(&job(2, track())).unwrap();
        assert_eq!(report.frames_skipped, 1);
        assert_eq!(report.events_recorded, 1);
    }

    #[test]
    fn test_unlocatable_frames_are_dropped() {
        let mut frames = HashMap::new();
        frames.insert(0usize, Ok(pothole_frame(0.9, 0.001)));
        let (pipeline, _) = harness(frames);

        let null_track = vec![GpsPoint { lat: 0.0, lon: 0.0, velocity: 0.0, gyro_magnitude: 0.0 }];
        let report = pipeline.run_job(&job(1, null_track)).unwrap();
        assert_eq!(report.events_recorded, 0);
        assert_eq!(report.frames_skipped, 1);
    }

    #[test]
    fn test_empty_track_uses_fallback_location() {
        let mut frames = HashMap::new();
        frames.insert(0usize, Ok(pothole_frame(0.9, 0.001)));
        let (pipeline, repository) = harness(frames);

        let report = pipeline.run_job(&job(1, vec![])).unwrap();
        assert_eq!(report.events_recorded, 1);
        let tile = *report.tiles_touched.iter().next().unwrap();
        let e = &repository.events_for_tile(&tile).unwrap()[0];
        assert_eq!(e.lat, gps_interp::FALLBACK_LAT);
        assert_eq!(e.lon, gps_interp::FALLBACK_LON);
    }

    #[test]
    fn test_trigger_window_produces_validation_event() {
        let (pipeline, repository) = harness(HashMap::new());

        let mut j = job(0, vec![]);
        // z spread wide enough that roughness * 5 clears zero
        j.samples = vec![
            SensorSample {
                timestamp: start(),
                kind: SensorKind::Accelerometer,
                x: 0.0,
                y: 0.0,
                z: 9.8,
                trigger: true,
                lat: 30.7333,
                lon: 76.7794,
            },
            SensorSample {
                timestamp: start() + Duration::seconds(1),
                kind: SensorKind::Accelerometer,
                x: 0.0,
                y: 0.0,
                z: 14.0,
                trigger: true,
                lat: 30.7333,
                lon: 76.7794,
            },
        ];
        let report = pipeline.run_job(&j).unwrap();
        assert_eq!(report.windows_detected, 1);
        assert_eq!(report.events_recorded, 1);

        let tile = *report.tiles_touched.iter().next().unwrap();
        let e = &repository.events_for_tile(&tile).unwrap()[0];
        assert_eq!(e.kind, EventKind::Pothole);
        assert_eq!(e.detected_at, start());
        assert!(e.severity > 0.0);
        // no vision frames: persistence, and so confidence, is zero
        assert_eq!(e.confidence, 0.0);
        assert!(e.frame_refs.is_empty());
    }

    #[test]
    fn test_window_at_null_island_is_dropped() {
        let (pipeline, _) = harness(HashMap::new());
        let mut j = job(0, vec![]);
        j.samples = vec![SensorSample {
            timestamp: start(),
            kind: SensorKind::Accelerometer,
            x: 0.0,
            y: 0.0,
            z: 9.8,
            trigger: true,
            lat: 0.0,
            lon: 0.0,
        }];
        let report = pipeline.run_job(&j).unwrap();
        assert_eq!(report.windows_detected, 1);
        assert_eq!(report.events_recorded, 0);
    }

    #[test]
    fn test_events_recorded_in_time_order() {
        let mut frames = HashMap::new();
        frames.insert(3usize, Ok(pothole_frame(0.7, 0.001)));
        frames.insert(0usize, Ok(congestion_frame(5, 0.2)));
        let (pipeline, repository) = harness(frames);

        let report = pipeline.run_job(&job(4, vec![])).unwrap();
        assert_eq!(report.events_recorded, 2);
        let tile = *report.tiles_touched.iter().next().unwrap();
        // newest-first read-back: the damage frame at t+0.75s comes first
        let events = repository.events_for_tile(&tile).unwrap();
        assert_eq!(events[0].kind, EventKind::Pothole);
        assert_eq!(events[1].kind, EventKind::Congestion);
    }

    #[test]
    fn test_aggregate_written_for_touched_tile() {
        let mut frames = HashMap::new();
        frames.insert(0usize, Ok(congestion_frame(6, 0.3)));
        let (pipeline, repository) = harness(frames);

        let report = pipeline.run_job(&job(1, track())).unwrap();
        let tile = *report.tiles_touched.iter().next().unwrap();
        let aggregate = repository
            .aggregate(&tile, storage::WindowPolicy::default())
            .unwrap()
            .expect("aggregate written");
        assert_eq!(aggregate.total_events, 1);
        assert_eq!(aggregate.congestion_count, 1);
        // Density score flows through with the same gain the window
        // summary uses: coverage 0.3 * 20
        assert!((aggregate.avg_congestion_score - 0.3 * TRAFFIC_DENSITY_GAIN).abs() < 1e-9);
        assert!((aggregate.avg_congestion_score - 6.0).abs() < 1e-9);
    }
}
