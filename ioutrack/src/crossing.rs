//! Line-crossing counter over confirmed tracks
//!
//! Each (identity, line) pair remembers the last side the box centre was
//! observed on and whether it has already been credited in the current
//! epoch. A crossing needs an observed side change, so an identity first
//! seen next to a line never counts, and jitter around a line after the
//! first crossing never counts again until an explicit reset.

use crate::config::{CountingConfig, CountingMode};
use crate::error::Result;
use crate::types::{FrameGeometry, TrackId, TrackedObject};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Which side of a horizontal line a point lies on. Image rows grow downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Above,
    Below,
}

impl Side {
    fn of(center_y: f32, row: f32) -> Self {
        if center_y < row {
            Side::Above
        } else {
            Side::Below
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Below -> Above
    Up,
    /// Above -> Below
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossingEvent {
    pub track_id: TrackId,
    /// Index into the configured lines
    pub line: usize,
    pub line_name: String,
    pub direction: Direction,
    pub timestamp: DateTime<Local>,
}

/// Cumulative directional counts for the current epoch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrossingTotals {
    pub up: u64,
    pub down: u64,
}

impl CrossingTotals {
    pub fn total(&self) -> u64 {
        self.up + self.down
    }

    fn record(&mut self, direction: Direction) {
        match direction {
            Direction::Up => self.up += 1,
            Direction::Down => self.down += 1,
        }
    }
}

/// Per-identity state, one slot per configured line
#[derive(Debug, Clone)]
struct IdentityState {
    sides: Vec<Option<Side>>,
    credited: Vec<bool>,
}

impl IdentityState {
    fn new(num_lines: usize) -> Self {
        Self {
            sides: vec![None; num_lines],
            credited: vec![false; num_lines],
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrossingCounter {
    config: CountingConfig,
    states: HashMap<TrackId, IdentityState>,
    totals: CrossingTotals,
    line_totals: Vec<CrossingTotals>,
    epoch: u64,
}

impl CrossingCounter {
    pub fn new(config: CountingConfig) -> Result<Self> {
        config.validate()?;
        let num_lines = config.lines.len();
        Ok(Self {
            config,
            states: HashMap::new(),
            totals: CrossingTotals::default(),
            line_totals: vec![CrossingTotals::default(); num_lines],
            epoch: 0,
        })
    }

    pub fn config(&self) -> &CountingConfig {
        &self.config
    }

    pub fn totals(&self) -> CrossingTotals {
        self.totals
    }

    /// Totals per configured line, in configuration order
    pub fn line_totals(&self) -> &[CrossingTotals] {
        &self.line_totals
    }

    /// Number of resets so far
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Identities with crossing state
    pub fn num_identities(&self) -> usize {
        self.states.len()
    }

    /// Observe this frame's confirmed tracks and return the crossings they made
    pub fn update(
        &mut self,
        frame: FrameGeometry,
        objects: &[TrackedObject],
        timestamp: DateTime<Local>,
    ) -> Vec<CrossingEvent> {
        let rows: Vec<f32> = self
            .config
            .lines
            .iter()
            .map(|line| frame.line_row(line.ratio))
            .collect();

        let mut crossings = Vec::new();
        for object in objects {
            let center_y = object.bbox.center_y();
            let state = self
                .states
                .entry(object.id)
                .or_insert_with(|| IdentityState::new(rows.len()));

            match self.config.mode {
                CountingMode::Directional => {
                    Self::directional(state, center_y, &rows, object.id, &mut crossings)
                }
                CountingMode::Legacy => {
                    Self::legacy(state, center_y, &rows, object.id, &mut crossings)
                }
            }
        }

        let mut events = Vec::with_capacity(crossings.len());
        for (track_id, line, direction) in crossings {
            self.totals.record(direction);
            self.line_totals[line].record(direction);
            let line_name = self.config.lines[line].name.clone();
            log::info!(
                "Vehicle {} on line '{}': ID {}, total UP={} DOWN={}",
                direction,
                line_name,
                track_id,
                self.totals.up,
                self.totals.down
            );
            events.push(CrossingEvent {
                track_id,
                line,
                line_name,
                direction,
                timestamp,
            });
        }
        events
    }

    fn directional(
        state: &mut IdentityState,
        center_y: f32,
        rows: &[f32],
        track_id: TrackId,
        crossings: &mut Vec<(TrackId, usize, Direction)>,
    ) {
        for (line, &row) in rows.iter().enumerate() {
            let side = Side::of(center_y, row);
            if let Some(previous) = state.sides[line] {
                if previous != side && !state.credited[line] {
                    let direction = match side {
                        Side::Above => Direction::Up,
                        Side::Below => Direction::Down,
                    };
                    state.credited[line] = true;
                    crossings.push((track_id, line, direction));
                }
            }
            state.sides[line] = Some(side);
        }
    }

    /// Line 0 credits Up while the centre is above it, otherwise line 1
    /// credits Down while the centre is below it. Each at most once per epoch.
    fn legacy(
        state: &mut IdentityState,
        center_y: f32,
        rows: &[f32],
        track_id: TrackId,
        crossings: &mut Vec<(TrackId, usize, Direction)>,
    ) {
        let (up_row, down_row) = (rows[0], rows[1]);
        if !state.credited[0] && center_y < up_row {
            state.credited[0] = true;
            crossings.push((track_id, 0, Direction::Up));
        } else if !state.credited[1] && center_y > down_row {
            state.credited[1] = true;
            crossings.push((track_id, 1, Direction::Down));
        }
        state.sides[0] = Some(Side::of(center_y, up_row));
        state.sides[1] = Some(Side::of(center_y, down_row));
    }

    /// Discard state for identities the tracker has retired
    pub fn retire(&mut self, ids: &[TrackId]) {
        for id in ids {
            self.states.remove(id);
        }
    }

    /// Operator reset: zero the totals and forget all per-identity state.
    /// Live identities keep their ids; they start over as Unknown.
    pub fn reset(&mut self) {
        self.states.clear();
        self.totals = CrossingTotals::default();
        self.line_totals.fill(CrossingTotals::default());
        self.epoch += 1;
        log::info!("Crossing counters reset (epoch {})", self.epoch);
    }
}
