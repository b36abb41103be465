//! Event Detector
//!
//! Correlates data from two asynchronous streams:
//! - inertial/GPS sensor samples carrying a boolean trigger flag
//! - per-frame vision detections (road damage, traffic congestion)
//!
//! A rising edge of the trigger flag opens a fixed-duration window over
//! which both streams are aggregated into one window summary.

mod keys;
mod stats;
mod types;
mod window;

pub use keys::{classify_key, KeyKind};
pub use stats::{max_abs, mean, sample_std_dev, span};
pub use types::{
    CongestionDetection, DamageDetection, Detection, DetectionPayload, DetectionRecord,
    SensorKind, SensorSample,
};
pub use window::{
    detect_windows, TrafficLevel, WindowConfig, WindowSummary, TRAFFIC_DENSITY_GAIN,
};
