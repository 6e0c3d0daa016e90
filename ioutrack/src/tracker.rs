//! SORT (Simple Online Real-time Tracking) multi-object tracker

use crate::bbox::{ious, Bbox};
use crate::config::TrackerConfig;
use crate::error::Result;
use crate::hungarian::HungarianSolver;
use crate::track::Track;
use crate::types::{Detection, TrackId, TrackedObject};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Output of one tracker step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameTracks {
    /// Confirmed tracks, ascending by identity
    pub confirmed: Vec<TrackedObject>,
    /// Identities removed during this step; none of them will be issued again
    pub retired: Vec<TrackId>,
}

#[derive(Debug, Clone)]
pub struct SortTracker {
    config: TrackerConfig,
    next_track_id: TrackId,
    tracks: BTreeMap<TrackId, Track>,
    n_steps: u64,
}

impl SortTracker {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        log::info!(
            "Creating SortTracker: max_age={}, min_hits={}, iou_threshold={:.3}",
            config.max_age,
            config.min_hits,
            config.iou_threshold
        );
        Ok(Self {
            config,
            next_track_id: 1,
            tracks: BTreeMap::new(),
            n_steps: 0,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Live tracks of any status
    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn num_confirmed(&self) -> usize {
        self.tracks.values().filter(|t| t.is_confirmed()).count()
    }

    pub fn step_count(&self) -> u64 {
        self.n_steps
    }

    /// Process one frame of detections.
    ///
    /// Detections with malformed boxes are skipped. The returned confirmed
    /// list includes tracks that missed this frame but are still within
    /// `max_age`, reported at their predicted position.
    pub fn step(&mut self, detections: &[Detection]) -> FrameTracks {
        self.n_steps += 1;
        let mut retired = Vec::new();

        let detections: Vec<&Detection> = detections
            .iter()
            .filter(|d| {
                let ok = d.bbox.is_valid();
                if !ok {
                    log::debug!("Skipping malformed detection {}", d.bbox);
                }
                ok
            })
            .collect();

        // Step 1: predict every track; all predictions finish before assignment
        let (track_ids, predicted) = self.predict_all(&mut retired);

        // Step 2: associate on IoU
        let det_boxes: Vec<Bbox> = detections.iter().map(|d| d.bbox).collect();
        let iou_matrix = ious(&predicted, &det_boxes);
        let assignment = HungarianSolver::solve_iou(iou_matrix.view(), self.config.iou_threshold);

        // Step 3: correct matched tracks
        for &(track_idx, det_idx) in &assignment.matches {
            let det = detections[det_idx];
            if let Some(track) = self.tracks.get_mut(&track_ids[track_idx]) {
                if let Err(e) = track.update(&det.bbox, det.class_id, self.config.min_hits) {
                    log::warn!("Track {} correction failed: {}", track.id, e);
                    track.kill();
                }
            }
        }

        // Step 4: unmatched tracks coast on their prediction
        for &track_idx in &assignment.unmatched_tracks {
            if let Some(track) = self.tracks.get_mut(&track_ids[track_idx]) {
                track.mark_missed();
            }
        }

        // Step 5: every unmatched detection starts a new hypothesis
        for &det_idx in &assignment.unmatched_detections {
            self.spawn(detections[det_idx]);
        }

        // Step 6: evict stale and failed tracks
        let max_age = self.config.max_age;
        self.tracks.retain(|id, track| {
            if track.expire(max_age) {
                log::debug!("Track {} retired after {} frames", id, track.age);
                retired.push(*id);
                false
            } else {
                true
            }
        });
        retired.sort_unstable();

        // Step 7: expose confirmed tracks only
        let confirmed = self
            .tracks
            .values()
            .filter(|t| t.is_confirmed())
            .map(Track::to_object)
            .collect();

        FrameTracks { confirmed, retired }
    }

    /// Predict all tracks in parallel. Tracks whose prediction degenerates
    /// are retired immediately; the rest are returned in identity order.
    fn predict_all(&mut self, retired: &mut Vec<TrackId>) -> (Vec<TrackId>, Vec<Bbox>) {
        let predictions: Vec<(TrackId, Bbox)> = self
            .tracks
            .par_iter_mut()
            .map(|(id, track)| (*id, track.predict()))
            .collect();

        let mut track_ids = Vec::with_capacity(predictions.len());
        let mut boxes = Vec::with_capacity(predictions.len());
        for (id, bbox) in predictions {
            if bbox.is_valid() {
                track_ids.push(id);
                boxes.push(bbox);
            } else {
                log::debug!("Track {} retired: degenerate prediction {}", id, bbox);
                self.tracks.remove(&id);
                retired.push(id);
            }
        }
        (track_ids, boxes)
    }

    fn spawn(&mut self, detection: &Detection) {
        let id = self.next_track_id;
        let Some(next) = id.checked_add(1) else {
            log::error!("Track identities exhausted, not spawning at {}", detection.bbox);
            return;
        };
        self.next_track_id = next;
        log::debug!("Track {} born at {}", id, detection.bbox);
        self.tracks.insert(
            id,
            Track::new(id, detection.bbox, detection.class_id, &self.config),
        );
    }
}
