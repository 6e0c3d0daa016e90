//! Hungarian algorithm implementation for optimal assignment
//!
//! Rows of every matrix handed to the solver are tracks, columns are
//! detections. The solver minimises total cost over a dense matrix of any
//! shape; rectangular inputs are padded to square with a constant, which
//! leaves the optimum over the real cells unchanged.
use ndarray::ArrayView2;
use pathfinding::prelude::{kuhn_munkres, Matrix};

/// Fixed-point scale used to hand f32 costs to the integer solver
const COST_SCALE: f64 = 1_000_000.0;

/// Cost assigned to NaN/infinite cells so they are only used when unavoidable
const MAX_COST: f32 = 1.0e6;

/// Result of Hungarian assignment algorithm
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentResult {
    /// Assignments as (track_idx, detection_idx) pairs, ascending by track index
    pub matches: Vec<(usize, usize)>,
    /// Indices of tracks left without a detection, ascending
    pub unmatched_tracks: Vec<usize>,
    /// Indices of detections left without a track, ascending
    pub unmatched_detections: Vec<usize>,
    /// Sum of the costs of `matches`
    pub total_cost: f32,
}

impl AssignmentResult {
    fn all_unmatched(num_tracks: usize, num_detections: usize) -> Self {
        Self {
            matches: Vec::new(),
            unmatched_tracks: (0..num_tracks).collect(),
            unmatched_detections: (0..num_detections).collect(),
            total_cost: 0.0,
        }
    }

    fn from_matches(
        matches: Vec<(usize, usize)>,
        cost_matrix: ArrayView2<f32>,
    ) -> AssignmentResult {
        let (num_tracks, num_detections) = cost_matrix.dim();

        let mut track_used = vec![false; num_tracks];
        let mut detection_used = vec![false; num_detections];
        for &(t, d) in &matches {
            track_used[t] = true;
            detection_used[d] = true;
        }

        let total_cost = matches.iter().map(|&(t, d)| cost_matrix[[t, d]]).sum();

        AssignmentResult {
            unmatched_tracks: (0..num_tracks).filter(|&t| !track_used[t]).collect(),
            unmatched_detections: (0..num_detections)
                .filter(|&d| !detection_used[d])
                .collect(),
            matches,
            total_cost,
        }
    }
}

/// Hungarian assignment solver
pub struct HungarianSolver;

impl HungarianSolver {
    /// Minimum-cost assignment over a dense cost matrix.
    ///
    /// Every row is paired with a column when `rows <= cols` (and vice versa),
    /// no matter how large the cost. Identical inputs always produce identical
    /// pairings.
    pub fn solve(cost_matrix: ArrayView2<f32>) -> AssignmentResult {
        let (num_tracks, num_detections) = cost_matrix.dim();

        if num_tracks == 0 || num_detections == 0 {
            return AssignmentResult::all_unmatched(num_tracks, num_detections);
        }

        // kuhn_munkres maximises and needs rows <= columns, so negate the
        // costs and pad to a square matrix with a constant.
        let size = num_tracks.max(num_detections);
        let mut weights = Matrix::new(size, size, 0i64);
        for ((t, d), &cost) in cost_matrix.indexed_iter() {
            weights[(t, d)] = -Self::fixed_point(cost);
        }

        let (_, column_for_row) = kuhn_munkres(&weights);

        let matches: Vec<(usize, usize)> = column_for_row
            .into_iter()
            .enumerate()
            .filter(|&(t, d)| t < num_tracks && d < num_detections)
            .collect();

        AssignmentResult::from_matches(matches, cost_matrix)
    }

    /// Solve with cost = 1 - IoU, then reject pairs whose IoU is below
    /// `iou_threshold`, returning their track and detection to the
    /// unmatched sets.
    ///
    /// # Arguments
    /// * `iou_matrix` - IoU between track i (row) and detection j (column)
    /// * `iou_threshold` - Minimum IoU for a valid assignment
    pub fn solve_iou(iou_matrix: ArrayView2<f32>, iou_threshold: f32) -> AssignmentResult {
        let cost_matrix = iou_matrix.mapv(|iou| 1.0 - iou);
        let raw = Self::solve(cost_matrix.view());

        let matches = raw
            .matches
            .into_iter()
            .filter(|&(t, d)| iou_matrix[[t, d]] >= iou_threshold)
            .collect();

        AssignmentResult::from_matches(matches, cost_matrix.view())
    }

    fn fixed_point(cost: f32) -> i64 {
        let cost = if cost.is_finite() {
            cost.clamp(-MAX_COST, MAX_COST)
        } else {
            MAX_COST
        };
        (cost as f64 * COST_SCALE).round() as i64
    }
}
