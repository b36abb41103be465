//! Detector Capability

use crate::DetectError;
use event_detector::{CongestionDetection, DamageDetection};
use serde::{Deserialize, Serialize};

/// One frame of a video job, addressed by its position in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRef {
    pub frame_idx: usize,
}

impl FrameRef {
    /// Stable string form used for event frame references
    pub fn name(&self) -> String {
        format!("frame_{:05}", self.frame_idx)
    }
}

/// Vision output for one frame. Either channel may be absent when the
/// corresponding model produced nothing for the frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDetections {
    pub damage: Option<DamageDetection>,
    pub congestion: Option<CongestionDetection>,
}

/// Vision model capability, injected into the pipeline.
///
/// A per-frame failure is recoverable: the pipeline skips the frame and
/// continues the job.
pub trait Detector: Send + Sync {
    fn detect(&self, frame: &FrameRef) -> Result<FrameDetections, DetectError>;
}
