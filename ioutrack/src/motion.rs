//! Constant-velocity motion model for a single bounding box

use crate::bbox::Bbox;
use crate::error::Result;
use crate::kalman::{KalmanFilter, KalmanFilterParams};
use nalgebra::{DMatrix, DVector};

const DIM_X: usize = 7;
const DIM_Z: usize = 4;

// State layout: [center_x, center_y, area, aspect_ratio, vel_x, vel_y, vel_area]
const AREA: usize = 2;
const VEL_AREA: usize = 6;

/// Kalman-filtered box state. Position, area and their velocities evolve
/// linearly; the aspect ratio is held constant.
#[derive(Debug, Clone)]
pub struct MotionModel {
    kf: KalmanFilter,
}

impl MotionModel {
    /// Seed the model from an initial box with zero velocity.
    ///
    /// # Arguments
    /// * `bbox` - Initial box; callers reject boxes failing [`Bbox::is_valid`]
    /// * `meas_var` - Diagonal of the measurement noise covariance
    /// * `proc_var` - Diagonal of the process noise covariance
    pub fn new(bbox: &Bbox, meas_var: [f32; 4], proc_var: [f32; 7]) -> Self {
        let z = bbox.to_z();
        let x = DVector::from_vec(vec![z[0], z[1], z[2], z[3], 0.0, 0.0, 0.0]);

        // Velocities are unobserved at birth, hence the large prior variance.
        let p = DMatrix::from_diagonal(&DVector::from_vec(vec![
            10.0, 10.0, 10.0, 10.0, 10000.0, 10000.0, 10000.0,
        ]));

        let mut f = DMatrix::<f32>::identity(DIM_X, DIM_X);
        for i in 0..3 {
            f[(i, i + 4)] = 1.0;
        }

        let mut h = DMatrix::<f32>::zeros(DIM_Z, DIM_X);
        for i in 0..DIM_Z {
            h[(i, i)] = 1.0;
        }

        let kf = KalmanFilter::new(KalmanFilterParams {
            x,
            p,
            f,
            h,
            r: DMatrix::from_diagonal(&DVector::from_row_slice(&meas_var)),
            q: DMatrix::from_diagonal(&DVector::from_row_slice(&proc_var)),
        });

        Self { kf }
    }

    /// Advance one frame and return the predicted box
    pub fn predict(&mut self) -> Bbox {
        // Keep the area from being extrapolated through zero.
        let state = self.kf.state_mut();
        if state[AREA] + state[VEL_AREA] <= 0.0 {
            state[VEL_AREA] = 0.0;
        }

        self.kf.predict();
        self.bbox()
    }

    /// Fuse an observed box into the state
    pub fn correct(&mut self, bbox: &Bbox) -> Result<()> {
        let z = DVector::from_row_slice(&bbox.to_z());
        self.kf.update(&z)
    }

    /// Current box estimate
    pub fn bbox(&self) -> Bbox {
        let s = self.kf.state();
        Bbox::from_z(&[s[0], s[1], s[2], s[3]])
    }

    /// Estimated centre velocity in pixels per frame
    pub fn velocity(&self) -> (f32, f32) {
        let s = self.kf.state();
        (s[4], s[5])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use approx::assert_abs_diff_eq;

    fn model(bbox: &Bbox) -> MotionModel {
        let config = TrackerConfig::default();
        MotionModel::new(bbox, config.measurement_noise, config.process_noise)
    }

    #[test]
    fn test_new_has_zero_velocity() {
        let bbox = Bbox::new(10.0, 20.0, 30.0, 60.0);
        let mut m = model(&bbox);
        assert_eq!(m.velocity(), (0.0, 0.0));

        let predicted = m.predict();
        assert_abs_diff_eq!(predicted.center_x(), bbox.center_x(), epsilon = 1e-3);
        assert_abs_diff_eq!(predicted.center_y(), bbox.center_y(), epsilon = 1e-3);
        assert_abs_diff_eq!(predicted.area(), bbox.area(), epsilon = 1e-2);
    }

    #[test]
    fn test_learns_constant_velocity() {
        let mut m = model(&Bbox::new(0.0, 0.0, 20.0, 20.0));
        for step in 1..=15 {
            m.predict();
            let dx = 5.0 * step as f32;
            m.correct(&Bbox::new(dx, 0.0, dx + 20.0, 20.0)).unwrap();
        }

        let (vx, vy) = m.velocity();
        assert_abs_diff_eq!(vx, 5.0, epsilon = 0.5);
        assert_abs_diff_eq!(vy, 0.0, epsilon = 0.5);

        let predicted = m.predict();
        assert_abs_diff_eq!(predicted.center_x(), 5.0 * 16.0 + 10.0, epsilon = 2.0);
    }

    #[test]
    fn test_predict_only_steps_stay_finite() {
        let mut m = model(&Bbox::new(100.0, 100.0, 140.0, 180.0));
        for step in 1..=5 {
            m.predict();
            let dy = 3.0 * step as f32;
            m.correct(&Bbox::new(100.0, 100.0 + dy, 140.0, 180.0 + dy))
                .unwrap();
        }
        for _ in 0..20 {
            let b = m.predict();
            assert!(b.to_bounds().iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_shrinking_area_never_goes_negative() {
        let mut m = model(&Bbox::new(0.0, 0.0, 40.0, 40.0));
        m.predict();
        m.correct(&Bbox::new(10.0, 10.0, 30.0, 30.0)).unwrap();
        for _ in 0..50 {
            let b = m.predict();
            assert!(b.is_valid(), "degenerate prediction {}", b);
        }
    }
}
