//! Sensor and Detection Data Model

use crate::keys::{classify_key, KeyKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Channel a sensor sample was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
}

/// One inertial/GPS reading. Immutable once read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub timestamp: DateTime<Utc>,
    pub kind: SensorKind,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Boolean condition signal, e.g. "possible impact"
    pub trigger: bool,
    pub lat: f64,
    pub lon: f64,
}

impl SensorSample {
    /// Magnitude of the 3-axis vector
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// One sub-detection reported by a vision model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: String,
    /// Model confidence in [0,1]
    pub confidence: f64,
    /// Bounding box as [x1, y1, x2, y2] in pixels
    pub bbox: [f64; 4],
}

/// Per-frame road damage output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DamageDetection {
    pub potholes: u32,
    pub road_cracks: u32,
    pub barricades: u32,
    pub bad_road: u32,
    /// Union of defect areas as a fraction of the frame, in [0,1]
    pub total_defect_area: f64,
    pub detections: Vec<Detection>,
    /// Unclassified detector output carried through untouched
    #[serde(default)]
    pub extra: BTreeMap<String, f64>,
}

impl DamageDetection {
    /// Frame shows structural damage worth an event
    pub fn has_damage(&self) -> bool {
        self.potholes > 0 || self.road_cracks > 0
    }

    /// Highest confidence among sub-detections whose class contains `needle`
    pub fn max_confidence_for(&self, needle: &str) -> f64 {
        self.detections
            .iter()
            .filter(|d| d.class.to_lowercase().contains(needle))
            .fold(0.0, |acc, d| acc.max(d.confidence))
    }
}

/// Per-frame congestion output with counts and coverages kept apart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CongestionDetection {
    /// Object count per detected class
    pub class_counts: BTreeMap<String, u32>,
    /// Area-coverage fraction per class, in [0,1]
    pub class_coverage: BTreeMap<String, f64>,
    /// Union coverage of all vehicle classes, in [0,1]
    pub total_vehicle_coverage: f64,
    /// Unclassified detector output carried through untouched
    #[serde(default)]
    pub extra: BTreeMap<String, f64>,
}

impl CongestionDetection {
    /// Total vehicles in the frame: the sum over count-kind keys only.
    pub fn vehicle_count(&self) -> u32 {
        self.class_counts.values().sum()
    }

    /// Build from a flat detector map, routing each key through the
    /// explicit count/coverage classification.
    pub fn from_raw(raw: &BTreeMap<String, f64>) -> Self {
        let mut out = Self::default();
        for (key, &value) in raw {
            match classify_key(key) {
                KeyKind::Coverage if key == crate::keys::TOTAL_COVERAGE_KEY => {
                    out.total_vehicle_coverage = value;
                }
                KeyKind::Coverage => {
                    out.class_coverage.insert(key.clone(), value);
                }
                KeyKind::Count => {
                    if value.fract() == 0.0 && value >= 0.0 {
                        out.class_counts.insert(key.clone(), value as u32);
                    } else {
                        out.extra.insert(key.clone(), value);
                    }
                }
            }
        }
        out
    }
}

/// Vision output for one frame, tagged by detector kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionPayload {
    Damage(DamageDetection),
    Congestion(CongestionDetection),
}

/// One per-frame vision-model output, keyed by a frame timestamp.
/// Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub timestamp: DateTime<Utc>,
    pub payload: DetectionPayload,
}

impl DetectionRecord {
    pub fn damage(&self) -> Option<&DamageDetection> {
        match &self.payload {
            DetectionPayload::Damage(d) => Some(d),
            _ => None,
        }
    }

    pub fn congestion(&self) -> Option<&CongestionDetection> {
        match &self.payload {
            DetectionPayload::Congestion(c) => Some(c),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_count_ignores_coverage_keys() {
        let mut raw = BTreeMap::new();
        raw.insert("car".to_string(), 4.0);
        raw.insert("truck".to_string(), 2.0);
        raw.insert("car_coverage".to_string(), 0.21);
        raw.insert("total_vehicle_coverage".to_string(), 0.35);

        let det = CongestionDetection::from_raw(&raw);
        assert_eq!(det.vehicle_count(), 6);
        assert_eq!(det.total_vehicle_coverage, 0.35);
        assert_eq!(det.class_coverage.get("car_coverage"), Some(&0.21));
    }

    #[test]
    fn test_from_raw_routes_fractional_counts_to_extra() {
        let mut raw = BTreeMap::new();
        raw.insert("car".to_string(), 3.0);
        raw.insert("blur_score".to_string(), 0.7);

        let det = CongestionDetection::from_raw(&raw);
        assert_eq!(det.vehicle_count(), 3);
        assert_eq!(det.extra.get("blur_score"), Some(&0.7));
    }

    #[test]
    fn test_damage_flags_and_confidence() {
        let damage = DamageDetection {
            potholes: 1,
            detections: vec![
                Detection {
                    class: "pothole".to_string(),
                    confidence: 0.6,
                    bbox: [0.0, 0.0, 10.0, 10.0],
                },
                Detection {
                    class: "Pothole".to_string(),
                    confidence: 0.8,
                    bbox: [5.0, 5.0, 20.0, 20.0],
                },
            ],
            ..Default::default()
        };
        assert!(damage.has_damage());
        assert_eq!(damage.max_confidence_for("pothole"), 0.8);
        assert_eq!(damage.max_confidence_for("crack"), 0.0);
    }

    #[test]
    fn test_payload_accessors() {
        let record = DetectionRecord {
            timestamp: Utc::now(),
            payload: DetectionPayload::Damage(DamageDetection::default()),
        };
        assert!(record.damage().is_some());
        assert!(record.congestion().is_none());
    }
}
