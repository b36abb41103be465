//! GPS Track Reader

use crate::IngestError;
use gps_interp::GpsPoint;
use std::collections::HashMap;
use std::io::Read;
use tracing::{info, warn};

/// Result of one GPS track read
#[derive(Debug, Clone)]
pub struct TrackReport {
    pub points: Vec<GpsPoint>,
    /// Rows dropped for bad numerics or a (0, 0) fix
    pub skipped_rows: usize,
}

/// Accepted header names per logical column. Matching is exact after a
/// trim and lowercase; the first listed column present wins.
const COLUMN_ALIASES: &[(&str, &[&str])] = &[
    ("lat", &["lat", "latitude"]),
    ("lon", &["lon", "longitude"]),
    ("velocity", &["velocity", "speed"]),
    ("gyro_x", &["gyro_x", "gyrox"]),
    ("gyro_y", &["gyro_y", "gyroy"]),
    ("gyro_z", &["gyro_z", "gyroz"]),
];

/// Read a GPS track CSV into ordered points.
///
/// Latitude and longitude are required; velocity and gyroscope columns
/// are optional and default to zero. Rows carrying a (0, 0) fix are
/// dropped so interpolation never snaps to the null island.
pub fn read_gps_track<R: Read>(reader: R) -> Result<TrackReport, IngestError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let mut columns: HashMap<&'static str, usize> = HashMap::new();
    for (logical, aliases) in COLUMN_ALIASES {
        for (idx, header) in headers.iter().enumerate() {
            if aliases.contains(&header.trim().to_lowercase().as_str()) {
                columns.insert(logical, idx);
                break;
            }
        }
    }
    if !columns.contains_key("lat") || !columns.contains_key("lon") {
        return Err(IngestError::UnknownSchema(
            headers.iter().map(|h| h.to_string()).collect(),
        ));
    }

    let mut points = Vec::new();
    let mut skipped_rows = 0usize;

    for (row_idx, record) in csv_reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!(row = row_idx, error = %e, "malformed track row, skipping");
                skipped_rows += 1;
                continue;
            }
        };
        let number = |logical: &str| -> Option<f64> {
            columns
                .get(logical)
                .and_then(|&i| record.get(i))
                .and_then(|v| v.trim().parse().ok())
        };

        let (lat, lon) = match (number("lat"), number("lon")) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                warn!(row = row_idx, "unparseable coordinates, skipping");
                skipped_rows += 1;
                continue;
            }
        };
        let gyro_x = number("gyro_x").unwrap_or(0.0);
        let gyro_y = number("gyro_y").unwrap_or(0.0);
        let gyro_z = number("gyro_z").unwrap_or(0.0);
        let point = GpsPoint {
            lat,
            lon,
            velocity: number("velocity").unwrap_or(0.0),
            gyro_magnitude: (gyro_x * gyro_x + gyro_y * gyro_y + gyro_z * gyro_z).sqrt(),
        };
        if point.is_unlocatable() {
            skipped_rows += 1;
            continue;
        }
        points.push(point);
    }

    info!(
        points = points.len(),
        skipped_rows,
        "GPS track read complete"
    );
    Ok(TrackReport {
        points,
        skipped_rows,
    })
}
