//! Plain data records exchanged with the tracker and the crossing counter

use crate::bbox::Bbox;
use serde::{Deserialize, Serialize};

/// Identity of a track. Assigned from 1 upwards and never reused.
pub type TrackId = u64;

/// One detector output for a single frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: Bbox,
    pub confidence: f32,
    #[serde(default)]
    pub class_id: Option<u32>,
}

impl Detection {
    pub fn new(bbox: Bbox, confidence: f32) -> Self {
        Self {
            bbox,
            confidence,
            class_id: None,
        }
    }

    pub fn with_class(mut self, class_id: u32) -> Self {
        self.class_id = Some(class_id);
        self
    }
}

/// A confirmed track as exposed to consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedObject {
    pub id: TrackId,
    pub bbox: Bbox,
    /// Frames since the last matched detection (0 = matched this frame)
    pub time_since_update: u32,
    /// Class of the most recently matched detection
    pub class_id: Option<u32>,
}

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Absolute pixel row of a line placed at `ratio` of the frame height
    pub fn line_row(&self, ratio: f64) -> f32 {
        (self.height as f64 * ratio).floor() as f32
    }
}
