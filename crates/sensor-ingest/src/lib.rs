//! Sensor Ingest
//!
//! Reads the two supported sensor CSV shapes and the GPS track shape
//! into typed samples. The header is classified against an enumerated
//! set of known schemas up front; nothing probes field-by-field at read
//! time. Rows that fail to parse are skipped and counted, never fatal.

mod schema;
mod sensor;
mod track;

pub use schema::SensorCsvSchema;
pub use sensor::{read_sensor_csv, SensorReport};
pub use track::{read_gps_track, TrackReport};

use thiserror::Error;

/// Ingestion errors. Only structural failures surface; per-row damage
/// is recovered by skipping.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Header matches none of the known shapes
    #[error("CSV header matches no known schema: {0:?}")]
    UnknownSchema(Vec<String>),

    #[error("CSV read error: {0}")]
    Csv(#[from] csv::Error),
}
