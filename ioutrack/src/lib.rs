//! IoU-based multi-object tracking and line-crossing counting
//!
//! The crate is pure: it consumes per-frame detections and produces
//! confirmed tracks plus crossing events. Acquisition, detection, rendering
//! and delivery of results live with the caller.
//!
//! ```rust,ignore
//! use ioutrack::{Bbox, CountingConfig, CrossingCounter, Detection, FrameGeometry, SortTracker, TrackerConfig};
//!
//! let mut tracker = SortTracker::new(TrackerConfig::default())?;
//! let mut counter = CrossingCounter::new(CountingConfig::default())?;
//!
//! let frame = FrameGeometry::new(640, 480);
//! let detections = vec![Detection::new(Bbox::new(10.0, 10.0, 50.0, 50.0), 0.9)];
//! let tracks = tracker.step(&detections);
//! counter.retire(&tracks.retired);
//! let events = counter.update(frame, &tracks.confirmed, chrono::Local::now());
//! ```

pub mod bbox;
pub mod config;
pub mod crossing;
pub mod error;
pub mod hungarian; // Hungarian algorithm for optimal assignment
pub mod kalman;
pub mod motion;
pub mod track;
pub mod tracker;
pub mod types;

pub use bbox::Bbox;
pub use config::{CountingConfig, CountingMode, LineConfig, TrackerConfig};
pub use crossing::{CrossingCounter, CrossingEvent, CrossingTotals, Direction};
pub use error::{Result, TrackError};
pub use hungarian::{AssignmentResult, HungarianSolver};
pub use track::{Track, TrackStatus};
pub use tracker::{FrameTracks, SortTracker};
pub use types::{Detection, FrameGeometry, TrackId, TrackedObject};
