//! Sensor CSV Schema Detection

use crate::IngestError;
use csv::StringRecord;

/// The enumerated set of sensor CSV shapes this system accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCsvSchema {
    /// One row per logical sample with an explicit `SensorType` column:
    /// `Time,SensorType,Value1,Value2,Value3,Latitude,Longitude,Pothole`
    PerSensorRow,
    /// Legacy wide shape carrying both channels on one row, split into
    /// two logical samples:
    /// `Time,AccX,AccY,AccZ,GyroX,GyroY,GyroZ,Latitude,Longitude,Pothole`
    WideRow,
}

impl SensorCsvSchema {
    /// Classify a header row against the known shapes, failing clearly
    /// when none match.
    pub fn detect(headers: &StringRecord) -> Result<Self, IngestError> {
        let has = |name: &str| headers.iter().any(|h| h.trim() == name);

        if has("SensorType") {
            return Ok(SensorCsvSchema::PerSensorRow);
        }
        if has("AccX") && has("GyroX") {
            return Ok(SensorCsvSchema::WideRow);
        }
        Err(IngestError::UnknownSchema(
            headers.iter().map(|h| h.to_string()).collect(),
        ))
    }
}
