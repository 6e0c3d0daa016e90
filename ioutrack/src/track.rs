//! A single tracked object: motion model plus lifecycle bookkeeping

use crate::bbox::Bbox;
use crate::config::TrackerConfig;
use crate::error::Result;
use crate::motion::MotionModel;
use crate::types::{TrackId, TrackedObject};

/// Track maturity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    /// Not yet matched on enough consecutive frames to be exposed
    Tentative,
    /// Exposed to consumers until it dies
    Confirmed,
    /// Unmatched for longer than `max_age`; removed in the same step
    Dead,
}

#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    motion: MotionModel,
    status: TrackStatus,
    /// number of frames since creation
    pub age: u32,
    /// total number of frames with a matching detection
    pub hits: u32,
    /// number of consecutive frames with a matching detection
    pub hit_streak: u32,
    /// number of consecutive frames predicted without a detection
    pub time_since_update: u32,
    /// class of the last matched detection
    pub class_id: Option<u32>,
    bbox: Bbox,
}

impl Track {
    /// Create a tentative track seeded from an unmatched detection
    pub fn new(id: TrackId, bbox: Bbox, class_id: Option<u32>, config: &TrackerConfig) -> Self {
        let mut track = Self {
            id,
            motion: MotionModel::new(&bbox, config.measurement_noise, config.process_noise),
            status: TrackStatus::Tentative,
            age: 0,
            hits: 1,
            hit_streak: 1,
            time_since_update: 0,
            class_id,
            bbox,
        };
        track.promote(config.min_hits);
        track
    }

    pub fn status(&self) -> TrackStatus {
        self.status
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == TrackStatus::Confirmed
    }

    /// Current box estimate: the corrected box after a match, the prediction otherwise
    pub fn bbox(&self) -> Bbox {
        self.bbox
    }

    /// Advance the motion model by one frame
    pub fn predict(&mut self) -> Bbox {
        self.age += 1;
        self.bbox = self.motion.predict();
        self.bbox
    }

    /// Apply a matched detection
    pub fn update(
        &mut self,
        bbox: &Bbox,
        class_id: Option<u32>,
        min_hits: u32,
    ) -> Result<()> {
        self.motion.correct(bbox)?;
        self.bbox = self.motion.bbox();

        self.time_since_update = 0;
        self.hits += 1;
        self.hit_streak += 1;
        if class_id.is_some() {
            self.class_id = class_id;
        }
        self.promote(min_hits);
        Ok(())
    }

    /// Record a frame without a matching detection. Any miss breaks the streak.
    pub fn mark_missed(&mut self) {
        self.time_since_update += 1;
        self.hit_streak = 0;
    }

    /// Transition to Dead if unmatched for longer than `max_age`.
    /// Returns true when the track is dead.
    pub fn expire(&mut self, max_age: u32) -> bool {
        if self.time_since_update > max_age {
            self.status = TrackStatus::Dead;
        }
        self.status == TrackStatus::Dead
    }

    /// Force the Dead state, e.g. after the motion model degenerated
    pub fn kill(&mut self) {
        self.status = TrackStatus::Dead;
    }

    pub fn to_object(&self) -> TrackedObject {
        TrackedObject {
            id: self.id,
            bbox: self.bbox,
            time_since_update: self.time_since_update,
            class_id: self.class_id,
        }
    }

    fn promote(&mut self, min_hits: u32) {
        if self.status == TrackStatus::Tentative && self.hit_streak >= min_hits {
            self.status = TrackStatus::Confirmed;
            log::debug!("track {} confirmed after {} frames", self.id, self.age + 1);
        }
    }
}
