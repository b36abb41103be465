//! Processing Pipeline
//!
//! Drives one recorded video job end to end: runs the injected detector
//! over every frame, geolocates each detection against the job's GPS
//! track, fuses the sensor stream through the trigger correlator, scores
//! severities, and hands the resulting events to the tile aggregator.

mod detector;
mod job;

pub use detector::{Detector, FrameDetections, FrameRef};
pub use job::{JobReport, Pipeline, PipelineConfig, VideoJob};

use thiserror::Error;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Aggregation error: {0}")]
    Aggregate(#[from] tile_aggregator::AggregateError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failure reported by a detector for a single frame. The pipeline
/// recovers by skipping the frame.
#[derive(Debug, Error)]
#[error("Detector failed on frame {frame_idx}: {reason}")]
pub struct DetectError {
    pub frame_idx: usize,
    pub reason: String,
}
