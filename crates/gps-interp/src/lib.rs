//! GPS Interpolator
//!
//! Maps a frame position within a video linearly onto a sparse ordered
//! GPS track, interpolating latitude, longitude, velocity and angular
//! rate between the two bracketing samples.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fallback position when a job carries no GPS track at all.
///
/// Callers must treat estimates at the fallback as "no reliable
/// geolocation" and may discard resulting events.
pub const FALLBACK_LAT: f64 = 30.7333;
pub const FALLBACK_LON: f64 = 76.7794;

/// One point of a GPS track, ordered by time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub lat: f64,
    pub lon: f64,
    /// Ground speed, unit as recorded by the device
    pub velocity: f64,
    /// Magnitude of the gyroscope vector at this point
    pub gyro_magnitude: f64,
}

impl GpsPoint {
    /// A (0,0) estimate means the frame cannot be located and the event
    /// candidate for it is dropped.
    pub fn is_unlocatable(&self) -> bool {
        self.lat == 0.0 && self.lon == 0.0
    }

    fn lerp(&self, other: &GpsPoint, t: f64) -> GpsPoint {
        GpsPoint {
            lat: self.lat * (1.0 - t) + other.lat * t,
            lon: self.lon * (1.0 - t) + other.lon * t,
            velocity: self.velocity * (1.0 - t) + other.velocity * t,
            gyro_magnitude: self.gyro_magnitude * (1.0 - t) + other.gyro_magnitude * t,
        }
    }
}

/// Interpolate the GPS estimate for one frame.
///
/// `frame_idx / (total_frames - 1)` is mapped onto the track's index
/// range, then the two bracketing points are linearly interpolated. An
/// empty track yields the fixed fallback location with zero velocity and
/// angular rate.
pub fn interpolate_for_frame(track: &[GpsPoint], frame_idx: usize, total_frames: usize) -> GpsPoint {
    if track.is_empty() {
        debug!(frame_idx, "no GPS track, using fallback location");
        return GpsPoint {
            lat: FALLBACK_LAT,
            lon: FALLBACK_LON,
            velocity: 0.0,
            gyro_magnitude: 0.0,
        };
    }

    let denom = total_frames.saturating_sub(1).max(1) as f64;
    let span = (track.len() - 1) as f64;
    let position = ((frame_idx as f64 / denom) * span).clamp(0.0, span);
    let idx_low = position.floor() as usize;
    let idx_high = (idx_low + 1).min(track.len() - 1);

    if idx_low == idx_high {
        return track[idx_low];
    }

    let t = position - idx_low as f64;
    track[idx_low].lerp(&track[idx_high], t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn point(lat: f64, lon: f64, velocity: f64) -> GpsPoint {
        GpsPoint { lat, lon, velocity, gyro_magnitude: 0.0 }
    }

    #[test]
    fn test_empty_track_returns_fallback() {
        let est = interpolate_for_frame(&[], 3, 10);
        assert_eq!(est.lat, FALLBACK_LAT);
        assert_eq!(est.lon, FALLBACK_LON);
        assert_eq!(est.velocity, 0.0);
        assert_eq!(est.gyro_magnitude, 0.0);
    }

    #[test]
    fn test_first_frame_maps_to_first_point() {
        let track = vec![point(10.0, 20.0, 5.0), point(11.0, 21.0, 7.0)];
        let est = interpolate_for_frame(&track, 0, 100);
        assert_eq!(est, track[0]);
    }

    #[test]
    fn test_last_frame_maps_to_last_point() {
        let track = vec![point(10.0, 20.0, 5.0), point(11.0, 21.0, 7.0)];
        let est = interpolate_for_frame(&track, 99, 100);
        assert!((est.lat - 11.0).abs() < 1e-9);
        assert!((est.lon - 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_midpoint_interpolates_linearly() {
        let track = vec![point(10.0, 20.0, 0.0), point(12.0, 22.0, 10.0)];
        // frame 50 of 101 sits exactly halfway
        let est = interpolate_for_frame(&track, 50, 101);
        assert!((est.lat - 11.0).abs() < 1e-9);
        assert!((est.lon - 21.0).abs() < 1e-9);
        assert!((est.velocity - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_point_track_is_constant() {
        let track = vec![point(30.0, 76.0, 3.0)];
        for idx in [0usize, 5, 9] {
            assert_eq!(interpolate_for_frame(&track, idx, 10), track[0]);
        }
    }

    #[test]
    fn test_single_frame_video_uses_first_point() {
        let track = vec![point(10.0, 20.0, 1.0), point(11.0, 21.0, 2.0)];
        let est = interpolate_for_frame(&track, 0, 1);
        assert_eq!(est, track[0]);
    }

    #[test]
    fn test_unlocatable_flag() {
        assert!(point(0.0, 0.0, 0.0).is_unlocatable());
        assert!(!point(0.0, 1.0, 0.0).is_unlocatable());
    }

    proptest! {
        #[test]
        fn prop_estimate_within_track_extremes(
            frame_idx in 0usize..200,
            total in 1usize..200,
        ) {
            let track = vec![point(10.0, 20.0, 0.0), point(12.0, 24.0, 8.0)];
            let est = interpolate_for_frame(&track, frame_idx.min(total - 1), total);
            prop_assert!(est.lat >= 10.0 && est.lat <= 12.0);
            prop_assert!(est.lon >= 20.0 && est.lon <= 24.0);
            prop_assert!(est.velocity >= 0.0 && est.velocity <= 8.0);
        }
    }
}
