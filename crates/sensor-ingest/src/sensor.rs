//! Sensor Stream Reader

use crate::schema::SensorCsvSchema;
use crate::IngestError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use csv::StringRecord;
use event_detector::{SensorKind, SensorSample};
use std::collections::HashMap;
use std::io::Read;
use tracing::{info, warn};

/// Result of one sensor CSV read
#[derive(Debug, Clone)]
pub struct SensorReport {
    pub schema: SensorCsvSchema,
    pub samples: Vec<SensorSample>,
    /// Rows dropped for bad numeric fields or wrong column counts
    pub skipped_rows: usize,
}

/// Read a sensor CSV into logical samples.
///
/// The header is classified first; the wide legacy shape yields two
/// logical samples per row. `date` supplies the calendar day for the
/// time-of-day timestamps the devices record.
pub fn read_sensor_csv<R: Read>(reader: R, date: NaiveDate) -> Result<SensorReport, IngestError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let schema = SensorCsvSchema::detect(&headers)?;
    let columns: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_string(), i))
        .collect();

    let mut samples = Vec::new();
    let mut skipped_rows = 0usize;

    for (row_idx, record) in csv_reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!(row = row_idx, error = %e, "malformed CSV row, skipping");
                skipped_rows += 1;
                continue;
            }
        };
        match parse_row(schema, &columns, &record, date) {
            Some(mut row_samples) => samples.append(&mut row_samples),
            None => {
                warn!(row = row_idx, "unparseable sensor row, skipping");
                skipped_rows += 1;
            }
        }
    }

    info!(
        ?schema,
        samples = samples.len(),
        skipped_rows,
        "sensor CSV read complete"
    );
    Ok(SensorReport {
        schema,
        samples,
        skipped_rows,
    })
}

fn parse_row(
    schema: SensorCsvSchema,
    columns: &HashMap<String, usize>,
    record: &StringRecord,
    date: NaiveDate,
) -> Option<Vec<SensorSample>> {
    let field = |name: &str| -> Option<&str> {
        columns.get(name).and_then(|&i| record.get(i)).map(str::trim)
    };
    let number = |name: &str| -> Option<f64> { field(name)?.parse().ok() };

    let timestamp = parse_timestamp(field("Time")?, date)?;
    let trigger = field("Pothole")
        .and_then(|v| v.parse::<i64>().ok())
        .map(|v| v != 0)
        .unwrap_or(false);
    let lat = number("Latitude").unwrap_or(0.0);
    let lon = number("Longitude").unwrap_or(0.0);

    match schema {
        SensorCsvSchema::PerSensorRow => {
            let kind = match field("SensorType")?.to_lowercase().as_str() {
                "accelerometer" => SensorKind::Accelerometer,
                "gyroscope" => SensorKind::Gyroscope,
                _ => return None,
            };
            Some(vec![SensorSample {
                timestamp,
                kind,
                x: number("Value1")?,
                y: number("Value2")?,
                z: number("Value3")?,
                trigger,
                lat,
                lon,
            }])
        }
        SensorCsvSchema::WideRow => {
            // One physical row carries both channels; split it
            let accel = SensorSample {
                timestamp,
                kind: SensorKind::Accelerometer,
                x: number("AccX")?,
                y: number("AccY")?,
                z: number("AccZ")?,
                trigger,
                lat,
                lon,
            };
            let gyro = SensorSample {
                timestamp,
                kind: SensorKind::Gyroscope,
                x: number("GyroX")?,
                y: number("GyroY")?,
                z: number("GyroZ")?,
                trigger,
                lat,
                lon,
            };
            Some(vec![accel, gyro])
        }
    }
}

/// Device clocks record time-of-day with optional milliseconds.
fn parse_timestamp(time: &str, date: NaiveDate) -> Option<DateTime<Utc>> {
    let time = NaiveTime::parse_from_str(time, "%H:%M:%S%.f").ok()?;
    Some(date.and_time(time).and_utc())
}
