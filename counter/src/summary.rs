//! Periodic activity summaries over fixed wall-clock windows

use crate::error::Result;
use chrono::{DateTime, Duration, Local};
use ioutrack::CrossingTotals;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Activity over one window. Counts are the cumulative totals at window end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowSummary {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub duration_secs: f64,
    /// "WIDTHxHEIGHT" of the last frame in the window
    pub resolution: String,
    pub frames: u64,
    pub fps: f64,
    pub up: u64,
    pub down: u64,
    pub total: u64,
    /// Estimated raw RGB volume processed during the window
    pub image_kb: u64,
}

#[derive(Debug, Clone)]
pub struct WindowAggregator {
    window: Duration,
    start: Option<DateTime<Local>>,
    frames: u64,
    raw_bytes: u64,
    resolution: (u32, u32),
    totals: CrossingTotals,
}

impl WindowAggregator {
    pub fn new(window_secs: u64) -> Self {
        Self {
            window: Duration::seconds(window_secs.max(1) as i64),
            start: None,
            frames: 0,
            raw_bytes: 0,
            resolution: (0, 0),
            totals: CrossingTotals::default(),
        }
    }

    pub fn frames_in_window(&self) -> u64 {
        self.frames
    }

    /// Account for one processed frame. Returns the finished summary when
    /// the window has elapsed; the next window starts at `now`.
    pub fn record_frame(
        &mut self,
        now: DateTime<Local>,
        width: u32,
        height: u32,
        totals: CrossingTotals,
    ) -> Option<WindowSummary> {
        let start = *self.start.get_or_insert(now);
        self.frames += 1;
        self.raw_bytes += width as u64 * height as u64 * 3;
        self.resolution = (width, height);
        self.totals = totals;

        if now - start >= self.window {
            let summary = self.summarize(start, now);
            self.restart(now);
            Some(summary)
        } else {
            None
        }
    }

    /// Flush a partially filled window, if it saw any frames
    pub fn finish(&mut self, now: DateTime<Local>) -> Option<WindowSummary> {
        let start = self.start?;
        if self.frames == 0 {
            return None;
        }
        let summary = self.summarize(start, now);
        self.start = None;
        self.frames = 0;
        self.raw_bytes = 0;
        Some(summary)
    }

    fn restart(&mut self, now: DateTime<Local>) {
        self.start = Some(now);
        self.frames = 0;
        self.raw_bytes = 0;
    }

    fn summarize(&self, start: DateTime<Local>, end: DateTime<Local>) -> WindowSummary {
        let duration_secs = (end - start).num_milliseconds().max(0) as f64 / 1000.0;
        let fps = if duration_secs > 0.0 {
            (self.frames as f64 / duration_secs * 100.0).round() / 100.0
        } else {
            0.0
        };
        WindowSummary {
            start,
            end,
            duration_secs,
            resolution: format!("{}x{}", self.resolution.0, self.resolution.1),
            frames: self.frames,
            fps,
            up: self.totals.up,
            down: self.totals.down,
            total: self.totals.total(),
            image_kb: self.raw_bytes / 1024,
        }
    }
}

/// Persists summaries as JSON lines
pub struct SummaryLog<W: Write> {
    writer: W,
    written: usize,
}

impl SummaryLog<BufWriter<File>> {
    /// Append to `path`, creating it if needed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        log::info!("Writing window summaries to {}", path.as_ref().display());
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> SummaryLog<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn append(&mut self, summary: &WindowSummary) -> Result<()> {
        serde_json::to_writer(&mut self.writer, summary)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.written += 1;
        log::info!(
            "Summary saved: UP={}, DOWN={}, Total={}, FPS={:.2}",
            summary.up,
            summary.down,
            summary.total,
            summary.fps
        );
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
