//! Detection Key Classification
//!
//! Raw congestion detectors report a flat map of class-name keys. Some
//! keys are per-class counts ("car", "truck"), some are area-coverage
//! fractions ("car_coverage", "total_vehicle_coverage"). Summing vehicle
//! counts must only touch count-kind keys.

/// Classification of one raw detection key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Per-class object count, contributes to the vehicle count
    Count,
    /// Area-coverage fraction in [0,1], never counted
    Coverage,
}

/// Key under which detectors report the union coverage of all vehicles
pub const TOTAL_COVERAGE_KEY: &str = "total_vehicle_coverage";

const COVERAGE_SUFFIX: &str = "_coverage";

/// Classify a raw detection key as count-kind or coverage-kind.
pub fn classify_key(key: &str) -> KeyKind {
    if key == TOTAL_COVERAGE_KEY || key.ends_with(COVERAGE_SUFFIX) {
        KeyKind::Coverage
    } else {
        KeyKind::Count
    }
}
