//! Vehicle counting on top of the `ioutrack` tracker
//!
//! Feeds recorded per-frame detections through a boundary filter, the SORT
//! tracker and the line-crossing counter, then fans the results out as
//! counter updates and periodic window summaries.

pub mod config;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod summary;
pub mod telemetry;

pub use config::{AppConfig, SummaryConfig, TelemetryConfig};
pub use error::{CounterError, Result};
pub use filter::{class_name, DetectionFilter, RejectReason, Rejected};
pub use pipeline::{CountingPipeline, FrameInput, FrameReport};
pub use summary::{SummaryLog, WindowAggregator, WindowSummary};
pub use telemetry::{
    CounterUpdate, HttpSink, JsonLinesSink, LogSink, TelemetryDispatcher, TelemetrySink,
};
