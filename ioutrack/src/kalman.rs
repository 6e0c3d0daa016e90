//! Linear Kalman filter over dynamically sized nalgebra matrices

use crate::error::{Result, TrackError};
use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone)]
pub struct KalmanFilterParams {
    pub x: DVector<f32>, // Initial state
    pub p: DMatrix<f32>, // Initial state covariance
    pub f: DMatrix<f32>, // State transition matrix
    pub h: DMatrix<f32>, // Observation matrix
    pub r: DMatrix<f32>, // Observation noise covariance
    pub q: DMatrix<f32>, // Process noise covariance
}

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    x: DVector<f32>,
    p: DMatrix<f32>,
    f: DMatrix<f32>,
    h: DMatrix<f32>,
    r: DMatrix<f32>,
    q: DMatrix<f32>,
}

impl KalmanFilter {
    pub fn new(params: KalmanFilterParams) -> Self {
        let dim_x = params.x.len();
        let dim_z = params.h.nrows();
        debug_assert_eq!(params.p.shape(), (dim_x, dim_x));
        debug_assert_eq!(params.f.shape(), (dim_x, dim_x));
        debug_assert_eq!(params.h.shape(), (dim_z, dim_x));
        debug_assert_eq!(params.r.shape(), (dim_z, dim_z));
        debug_assert_eq!(params.q.shape(), (dim_x, dim_x));

        Self {
            x: params.x,
            p: params.p,
            f: params.f,
            h: params.h,
            r: params.r,
            q: params.q,
        }
    }

    /// x = F x, P = F P F^T + Q
    pub fn predict(&mut self) {
        self.x = &self.f * &self.x;
        self.p = &self.f * &self.p * self.f.transpose() + &self.q;
    }

    /// Fuse observation `z`.
    ///
    /// The covariance uses the Joseph form so it stays symmetric positive
    /// definite across long runs. On error the filter is left untouched.
    pub fn update(&mut self, z: &DVector<f32>) -> Result<()> {
        let y = z - &self.h * &self.x;
        let ht = self.h.transpose();
        let s = &self.h * &self.p * &ht + &self.r;

        let s_inv = s
            .cholesky()
            .ok_or(TrackError::SingularInnovation)?
            .inverse();
        let k = &self.p * &ht * s_inv;

        self.x = &self.x + &k * y;

        let i_kh = DMatrix::<f32>::identity(self.x.len(), self.x.len()) - &k * &self.h;
        self.p = &i_kh * &self.p * i_kh.transpose() + &k * &self.r * k.transpose();

        Ok(())
    }

    pub fn state(&self) -> &DVector<f32> {
        &self.x
    }

    pub fn state_mut(&mut self) -> &mut DVector<f32> {
        &mut self.x
    }

    pub fn covariance(&self) -> &DMatrix<f32> {
        &self.p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn constant_velocity_1d() -> KalmanFilter {
        KalmanFilter::new(KalmanFilterParams {
            x: DVector::from_vec(vec![0.0, 1.0]), // position=0, velocity=1
            p: DMatrix::from_diagonal(&DVector::from_vec(vec![1000.0, 1000.0])),
            f: DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]),
            h: DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
            r: DMatrix::from_element(1, 1, 0.1),
            q: DMatrix::from_diagonal(&DVector::from_vec(vec![0.01, 0.01])),
        })
    }

    #[test]
    fn test_predict_then_update() {
        let mut kf = constant_velocity_1d();

        kf.predict();
        assert_abs_diff_eq!(kf.state()[0], 1.0, epsilon = 0.001);

        kf.update(&DVector::from_vec(vec![0.9])).unwrap();
        assert!(kf.state()[0] > 0.8 && kf.state()[0] < 1.0);
    }

    #[test]
    fn test_update_shrinks_uncertainty() {
        let mut kf = constant_velocity_1d();
        kf.predict();
        let before = kf.covariance()[(0, 0)];
        kf.update(&DVector::from_vec(vec![1.0])).unwrap();
        let after = kf.covariance()[(0, 0)];
        assert!(after < before);
        assert_abs_diff_eq!(kf.covariance()[(0, 1)], kf.covariance()[(1, 0)], epsilon = 1e-3);
    }

    #[test]
    fn test_indefinite_innovation_is_rejected() {
        let mut kf = KalmanFilter::new(KalmanFilterParams {
            x: DVector::from_vec(vec![0.0]),
            p: DMatrix::zeros(1, 1),
            f: DMatrix::identity(1, 1),
            h: DMatrix::identity(1, 1),
            r: DMatrix::from_element(1, 1, -1.0),
            q: DMatrix::zeros(1, 1),
        });
        assert_eq!(
            kf.update(&DVector::from_vec(vec![1.0])),
            Err(TrackError::SingularInnovation)
        );
        assert_eq!(kf.state()[0], 0.0);
    }
}
