//! Sliding-Window Trigger Correlator
//!
//! Scans a time-ordered sensor stream for rising edges of the trigger
//! flag. Each edge opens one fixed-duration window; sensor samples and
//! vision detections overlapping the window are aggregated into a single
//! summary. Re-triggering while the flag is still high does not open a
//! second window.

use crate::stats::{max_abs, mean, sample_std_dev, span};
use crate::types::{DetectionRecord, SensorKind, SensorSample};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Traffic density score per unit of mean vehicle coverage. Shared by
/// the window summary and the per-frame congestion event path.
pub const TRAFFIC_DENSITY_GAIN: f64 = 20.0;

/// Window detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Window length after the trigger edge, in seconds
    pub window_secs: i64,
    /// Look-back before the edge when pulling vision frames, tolerating
    /// clock skew between the sensor and video streams
    pub lookback_secs: i64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_secs: 5,
            lookback_secs: 1,
        }
    }
}

/// Qualitative traffic level derived from the density score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficLevel {
    Light,
    Moderate,
    Heavy,
}

impl TrafficLevel {
    /// Thresholds 5 and 10 on the traffic density score
    pub fn from_score(score: f64) -> Self {
        if score > 10.0 {
            TrafficLevel::Heavy
        } else if score > 5.0 {
            TrafficLevel::Moderate
        } else {
            TrafficLevel::Light
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficLevel::Light => "light",
            TrafficLevel::Moderate => "moderate",
            TrafficLevel::Heavy => "heavy",
        }
    }
}

/// Aggregated summary of one trigger window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    /// Trigger edge time (window start)
    pub started_at: DateTime<Utc>,
    pub window_secs: i64,

    /// Mean GPS position across all window samples
    pub lat_center: f64,
    pub lon_center: f64,
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,

    pub validation_score: f64,
    pub roughness_index: f64,
    pub impact_intensity: f64,
    pub traffic_level: TrafficLevel,
    pub needs_attention: bool,

    /// Per-axis accelerometer mean and sample std-dev [x, y, z]
    pub accel_mean: [f64; 3],
    pub accel_std: [f64; 3],
    /// Peak-to-peak span on the vertical axis
    pub vertical_span: f64,

    /// Per-axis gyroscope mean [x, y, z]
    pub gyro_mean: [f64; 3],
    /// Mean magnitude of the gyroscope vector
    pub gyro_intensity: f64,

    pub frames_with_damage: usize,
    pub total_frames: usize,
    /// Fraction of frames in the window with a positive damage count
    pub damage_persistence: f64,
    pub avg_defect_area: f64,
    pub max_defect_area: f64,

    pub avg_vehicles_per_frame: f64,
    pub peak_vehicle_count: u32,
    pub avg_vehicle_coverage: f64,
    pub peak_vehicle_coverage: f64,
    pub traffic_density_score: f64,
}

/// Scan the sensor stream and emit one summary per rising trigger edge.
///
/// Samples and detections may arrive in any order; both are sorted by
/// timestamp before the scan. Within one call summaries come out in
/// non-decreasing trigger-time order.
pub fn detect_windows(
    samples: &[SensorSample],
    detections: &[DetectionRecord],
    config: &WindowConfig,
) -> Vec<WindowSummary> {
    let mut samples: Vec<SensorSample> = samples.to_vec();
    samples.sort_by_key(|s| s.timestamp);
    let mut detections: Vec<&DetectionRecord> = detections.iter().collect();
    detections.sort_by_key(|d| d.timestamp);

    let mut summaries = Vec::new();
    let mut prev_trigger = false;

    for i in 0..samples.len() {
        let current = samples[i].trigger;
        if !prev_trigger && current {
            if let Some(summary) = summarize_window(&samples, &detections, samples[i].timestamp, config)
            {
                summaries.push(summary);
            }
        }
        prev_trigger = current;
    }

    debug!(windows = summaries.len(), "trigger scan complete");
    summaries
}

fn summarize_window(
    samples: &[SensorSample],
    detections: &[&DetectionRecord],
    start: DateTime<Utc>,
    config: &WindowConfig,
) -> Option<WindowSummary> {
    let end = start + Duration::seconds(config.window_secs);
    let vision_start = start - Duration::seconds(config.lookback_secs);

    let window: Vec<&SensorSample> = samples
        .iter()
        .filter(|s| s.timestamp >= start && s.timestamp <= end)
        .collect();
    if window.is_empty() {
        return None;
    }

    let damage_frames: Vec<_> = detections
        .iter()
        .filter(|d| d.timestamp >= vision_start && d.timestamp <= end)
        .filter_map(|d| d.damage())
        .collect();
    let congestion_frames: Vec<_> = detections
        .iter()
        .filter(|d| d.timestamp >= vision_start && d.timestamp <= end)
        .filter_map(|d| d.congestion())
        .collect();

    let accel: Vec<&&SensorSample> = window
        .iter()
        .filter(|s| s.kind == SensorKind::Accelerometer)
        .collect();
    let gyro: Vec<&&SensorSample> = window
        .iter()
        .filter(|s| s.kind == SensorKind::Gyroscope)
        .collect();

    let ax: Vec<f64> = accel.iter().map(|s| s.x).collect();
    let ay: Vec<f64> = accel.iter().map(|s| s.y).collect();
    let az: Vec<f64> = accel.iter().map(|s| s.z).collect();
    let gx: Vec<f64> = gyro.iter().map(|s| s.x).collect();
    let gy: Vec<f64> = gyro.iter().map(|s| s.y).collect();
    let gz: Vec<f64> = gyro.iter().map(|s| s.z).collect();
    let gyro_mags: Vec<f64> = gyro.iter().map(|s| s.magnitude()).collect();

    let lats: Vec<f64> = window.iter().map(|s| s.lat).collect();
    let lons: Vec<f64> = window.iter().map(|s| s.lon).collect();

    // Vision aggregates: damage path
    let defect_areas: Vec<f64> = damage_frames.iter().map(|d| d.total_defect_area).collect();
    let frames_with_damage = damage_frames
        .iter()
        .filter(|d| d.potholes > 0 || d.road_cracks > 0)
        .count();
    // Total-frame estimate comes from the congestion stream when present,
    // since it reports every frame rather than only positive ones.
    let total_frames = if !congestion_frames.is_empty() {
        congestion_frames.len()
    } else if !damage_frames.is_empty() {
        damage_frames.len()
    } else {
        1
    };
    let damage_persistence = frames_with_damage as f64 / total_frames as f64;

    // Vision aggregates: congestion path
    let vehicle_counts: Vec<f64> = congestion_frames
        .iter()
        .map(|c| c.vehicle_count() as f64)
        .collect();
    let coverages: Vec<f64> = congestion_frames
        .iter()
        .map(|c| c.total_vehicle_coverage)
        .collect();

    let roughness_index = sample_std_dev(&az) * 10.0;
    let impact_intensity = max_abs(&az);
    let avg_vehicle_coverage = mean(&coverages);
    let traffic_density_score = avg_vehicle_coverage * TRAFFIC_DENSITY_GAIN;
    let validation_score = (damage_persistence * 50.0 + roughness_index * 5.0).min(100.0);

    Some(WindowSummary {
        started_at: start,
        window_secs: config.window_secs,
        lat_center: mean(&lats),
        lon_center: mean(&lons),
        lat_min: lats.iter().cloned().fold(f64::MAX, f64::min),
        lat_max: lats.iter().cloned().fold(f64::MIN, f64::max),
        lon_min: lons.iter().cloned().fold(f64::MAX, f64::min),
        lon_max: lons.iter().cloned().fold(f64::MIN, f64::max),
        validation_score,
        roughness_index,
        impact_intensity,
        traffic_level: TrafficLevel::from_score(traffic_density_score),
        needs_attention: validation_score > 50.0,
        accel_mean: [mean(&ax), mean(&ay), mean(&az)],
        accel_std: [sample_std_dev(&ax), sample_std_dev(&ay), sample_std_dev(&az)],
        vertical_span: span(&az),
        gyro_mean: [mean(&gx), mean(&gy), mean(&gz)],
        gyro_intensity: mean(&gyro_mags),
        frames_with_damage,
        total_frames,
        damage_persistence,
        avg_defect_area: mean(&defect_areas),
        max_defect_area: defect_areas.iter().cloned().fold(0.0, f64::max),
        avg_vehicles_per_frame: mean(&vehicle_counts),
        peak_vehicle_count: vehicle_counts.iter().cloned().fold(0.0, f64::max) as u32,
        avg_vehicle_coverage,
        peak_vehicle_coverage: coverages.iter().cloned().fold(0.0, f64::max),
        traffic_density_score,
    })
}
