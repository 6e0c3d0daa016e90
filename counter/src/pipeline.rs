//! Per-frame driver: filter, track, count

use crate::config::AppConfig;
use crate::error::{CounterError, Result};
use crate::filter::{DetectionFilter, Rejected};
use crate::telemetry::CounterUpdate;
use chrono::{DateTime, Local};
use ioutrack::{
    CrossingCounter, CrossingEvent, CrossingTotals, Detection, FrameGeometry, SortTracker,
    TrackedObject,
};
use serde::{Deserialize, Serialize};

/// One recorded frame of detector output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub detections: Vec<Detection>,
    /// Operator requested a counter reset before this frame
    #[serde(default)]
    pub reset: bool,
}

impl FrameInput {
    pub fn new(width: u32, height: u32, detections: Vec<Detection>) -> Self {
        Self {
            width,
            height,
            detections,
            reset: false,
        }
    }

    pub fn geometry(&self) -> Result<FrameGeometry> {
        if self.width == 0 || self.height == 0 {
            return Err(CounterError::invalid_input(format!(
                "frame has zero size {}x{}",
                self.width, self.height
            )));
        }
        Ok(FrameGeometry::new(self.width, self.height))
    }
}

/// Everything that happened while processing one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    /// 1-based index of the processed frame
    pub frame_index: u64,
    /// Totals right after an operator reset applied before this frame
    pub reset: Option<CrossingTotals>,
    pub tracks: Vec<TrackedObject>,
    pub events: Vec<CrossingEvent>,
    pub rejected: Vec<Rejected>,
    pub totals: CrossingTotals,
}

impl FrameReport {
    /// Counter updates this frame should publish: the post-reset totals if
    /// the frame carried a reset, then the running totals if anything crossed.
    pub fn counter_updates(&self, at: DateTime<Local>) -> Vec<CounterUpdate> {
        let mut updates = Vec::new();
        if let Some(totals) = self.reset {
            updates.push(CounterUpdate::new(totals, at));
        }
        if !self.events.is_empty() {
            updates.push(CounterUpdate::new(self.totals, at));
        }
        updates
    }
}

pub struct CountingPipeline {
    filter: DetectionFilter,
    tracker: SortTracker,
    counter: CrossingCounter,
    frame_index: u64,
}

impl CountingPipeline {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            filter: config.filter.clone(),
            tracker: SortTracker::new(config.tracker.clone())?,
            counter: CrossingCounter::new(config.counting.clone())?,
            frame_index: 0,
        })
    }

    pub fn totals(&self) -> CrossingTotals {
        self.counter.totals()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frame_index
    }

    pub fn tracker(&self) -> &SortTracker {
        &self.tracker
    }

    pub fn counter(&self) -> &CrossingCounter {
        &self.counter
    }

    /// Zero the counts. Live tracks keep their identities.
    pub fn reset(&mut self) -> CrossingTotals {
        self.counter.reset();
        self.counter.totals()
    }

    pub fn process_frame(
        &mut self,
        input: &FrameInput,
        timestamp: DateTime<Local>,
    ) -> Result<FrameReport> {
        let frame = input.geometry()?;
        self.frame_index += 1;

        let reset = if input.reset {
            log::info!("Counter reset requested at frame {}", self.frame_index);
            Some(self.reset())
        } else {
            None
        };

        let (accepted, rejected) = self.filter.apply(frame, &input.detections);
        let tracks = self.tracker.step(&accepted);
        self.counter.retire(&tracks.retired);
        let events = self.counter.update(frame, &tracks.confirmed, timestamp);

        log::debug!(
            "Frame {}: {} detections ({} rejected), {} confirmed tracks, {} crossings",
            self.frame_index,
            input.detections.len(),
            rejected.len(),
            tracks.confirmed.len(),
            events.len()
        );

        Ok(FrameReport {
            frame_index: self.frame_index,
            reset,
            tracks: tracks.confirmed,
            events,
            rejected,
            totals: self.counter.totals(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ioutrack::{Bbox, CountingMode, Direction};

    fn car(cy: f32) -> Detection {
        Detection::new(Bbox::new(300.0, cy - 20.0, 340.0, cy + 20.0), 0.9).with_class(2)
    }

    fn frame(detections: Vec<Detection>) -> FrameInput {
        FrameInput::new(640, 600, detections)
    }

    #[test]
    fn test_car_crossing_both_default_lines() {
        let mut pipeline = CountingPipeline::new(&AppConfig::default()).unwrap();
        let mut events = Vec::new();
        for i in 0..40 {
            let report = pipeline
                .process_frame(&frame(vec![car(30.0 + 4.0 * i as f32)]), Local::now())
                .unwrap();
            assert_eq!(report.frame_index, i + 1);
            events.extend(report.events);
        }
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.direction == Direction::Down));
        assert_eq!(pipeline.totals().down, 2);
    }

    #[test]
    fn test_filtered_detections_never_reach_tracker() {
        let mut pipeline = CountingPipeline::new(&AppConfig::default()).unwrap();
        let bird = Detection::new(Bbox::new(10.0, 10.0, 50.0, 50.0), 0.9).with_class(14);
        let faint = Detection::new(Bbox::new(100.0, 10.0, 150.0, 50.0), 0.2).with_class(2);
        for _ in 0..5 {
            let report = pipeline
                .process_frame(&frame(vec![bird.clone(), faint.clone()]), Local::now())
                .unwrap();
            assert_eq!(report.rejected.len(), 2);
            assert!(report.tracks.is_empty());
        }
        assert_eq!(pipeline.tracker().num_tracks(), 0);
    }

    #[test]
    fn test_reset_flag_zeroes_counts_before_frame() {
        let mut pipeline = CountingPipeline::new(&AppConfig::default()).unwrap();
        for i in 0..40 {
            pipeline
                .process_frame(&frame(vec![car(30.0 + 4.0 * i as f32)]), Local::now())
                .unwrap();
        }
        assert_eq!(pipeline.totals().total(), 2);

        let mut input = frame(vec![car(190.0)]);
        input.reset = true;
        let report = pipeline.process_frame(&input, Local::now()).unwrap();
        assert_eq!(report.reset, Some(CrossingTotals::default()));
        assert_eq!(report.totals.total(), 0);
        assert_eq!(report.tracks.len(), 1);
        assert_eq!(pipeline.counter().epoch(), 1);
    }

    #[test]
    fn test_zero_sized_frame_is_an_error() {
        let mut pipeline = CountingPipeline::new(&AppConfig::default()).unwrap();
        let result = pipeline.process_frame(&FrameInput::new(0, 480, vec![]), Local::now());
        assert!(matches!(result, Err(CounterError::InvalidInput(_))));
        assert_eq!(pipeline.frames_processed(), 0);
    }

    #[test]
    fn test_frame_input_json() {
        let input: FrameInput = serde_json::from_str(
            r#"{"width": 640, "height": 480,
                "detections": [{"bbox": {"xmin": 1, "ymin": 2, "xmax": 30, "ymax": 40},
                                "confidence": 0.8, "class_id": 2}]}"#,
        )
        .unwrap();
        assert!(!input.reset);
        assert_eq!(input.detections.len(), 1);
        assert_eq!(input.detections[0].class_id, Some(2));
    }

    #[test]
    fn test_counter_updates_follow_events() {
        let mut pipeline = CountingPipeline::new(&AppConfig::default()).unwrap();
        let at = Local.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let mut published = Vec::new();
        for i in 0..40 {
            let report = pipeline
                .process_frame(&frame(vec![car(30.0 + 4.0 * i as f32)]), at)
                .unwrap();
            published.extend(report.counter_updates(at));
        }
        let counts: Vec<(u64, u64)> = published
            .iter()
            .map(|u| (u.count_up, u.count_down))
            .collect();
        assert_eq!(counts, vec![(0, 1), (0, 2)]);
    }

    #[test]
    fn test_reset_update_is_zero_even_if_frame_counts() {
        let mut config = AppConfig::default();
        config.counting.mode = CountingMode::Legacy;
        let mut pipeline = CountingPipeline::new(&config).unwrap();

        // Parked above the first line: legacy credits Up once confirmed
        for _ in 0..5 {
            pipeline
                .process_frame(&frame(vec![car(30.0)]), Local::now())
                .unwrap();
        }
        assert_eq!(pipeline.totals().up, 1);

        let mut input = frame(vec![car(30.0)]);
        input.reset = true;
        let at = Local::now();
        let report = pipeline.process_frame(&input, at).unwrap();

        // The same identity is credited again within the reset frame
        assert_eq!(report.events.len(), 1);
        let updates = report.counter_updates(at);
        assert_eq!(updates.len(), 2);
        assert_eq!((updates[0].count_up, updates[0].count_down), (0, 0));
        assert_eq!((updates[1].count_up, updates[1].count_down), (1, 0));
    }
}
