// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Constant-velocity Kalman filter over `[cx, cy, aspect, h]` boxes.

use nalgebra::{SMatrix, SVector};

use crate::error::{PipelineError, Result};

/// Box measurement `[cx, cy, aspect, h]`.
pub type Measurement = SVector<f32, 4>;
/// State `[cx, cy, aspect, h, vx, vy, va, vh]`.
pub type StateMean = SVector<f32, 8>;
/// State covariance.
pub type StateCov = SMatrix<f32, 8, 8>;

/// Position noise relative to box height.
const STD_WEIGHT_POSITION: f32 = 1.0 / 20.0;
/// Velocity noise relative to box height.
const STD_WEIGHT_VELOCITY: f32 = 1.0 / 160.0;

/// Kalman filter shared by all tracks.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    std_weight_position: f32,
    std_weight_velocity: f32,
    motion_mat: SMatrix<f32, 8, 8>,
    update_mat: SMatrix<f32, 4, 8>,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new(STD_WEIGHT_POSITION, STD_WEIGHT_VELOCITY)
    }
}

impl KalmanFilter {
    /// Create a filter with the given noise weights.
    #[must_use]
    pub fn new(std_weight_position: f32, std_weight_velocity: f32) -> Self {
        let mut motion_mat = SMatrix::<f32, 8, 8>::identity();
        for i in 0..4 {
            motion_mat[(i, i + 4)] = 1.0;
        }
        let update_mat = SMatrix::<f32, 4, 8>::identity();

        Self {
            std_weight_position,
            std_weight_velocity,
            motion_mat,
            update_mat,
        }
    }

    /// Start a state from a first measurement, with zero velocity.
    #[must_use]
    pub fn initiate(&self, measurement: &Measurement) -> (StateMean, StateCov) {
        let mut mean = StateMean::zeros();
        mean.fixed_rows_mut::<4>(0).copy_from(measurement);

        let h = measurement[3];
        let std = StateMean::from_column_slice(&[
            2.0 * self.std_weight_position * h,
            2.0 * self.std_weight_position * h,
            1e-2,
            2.0 * self.std_weight_position * h,
            10.0 * self.std_weight_velocity * h,
            10.0 * self.std_weight_velocity * h,
            1e-5,
            10.0 * self.std_weight_velocity * h,
        ]);
        let covariance = StateCov::from_diagonal(&std.component_mul(&std));
        (mean, covariance)
    }

    /// Advance the state by one frame.
    pub fn predict(&self, mean: &mut StateMean, covariance: &mut StateCov) {
        let h = mean[3];
        let std = StateMean::from_column_slice(&[
            self.std_weight_position * h,
            self.std_weight_position * h,
            1e-2,
            self.std_weight_position * h,
            self.std_weight_velocity * h,
            self.std_weight_velocity * h,
            1e-5,
            self.std_weight_velocity * h,
        ]);
        let motion_cov = StateCov::from_diagonal(&std.component_mul(&std));

        *mean = self.motion_mat * *mean;
        *covariance = self.motion_mat * *covariance * self.motion_mat.transpose() + motion_cov;
    }

    /// Project the state into measurement space.
    #[must_use]
    pub fn project(
        &self,
        mean: &StateMean,
        covariance: &StateCov,
    ) -> (Measurement, SMatrix<f32, 4, 4>) {
        let h = mean[3];
        let std = Measurement::new(
            self.std_weight_position * h,
            self.std_weight_position * h,
            1e-1,
            self.std_weight_position * h,
        );
        let innovation_cov = SMatrix::<f32, 4, 4>::from_diagonal(&std.component_mul(&std));

        let projected_mean = self.update_mat * mean;
        let projected_cov = self.update_mat * covariance * self.update_mat.transpose() + innovation_cov;
        (projected_mean, projected_cov)
    }

    /// Correct the state with a measurement.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::TrackingError`] if the projected covariance is
    /// not positive definite.
    pub fn update(
        &self,
        mean: &mut StateMean,
        covariance: &mut StateCov,
        measurement: &Measurement,
    ) -> Result<()> {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        let cholesky = projected_cov.cholesky().ok_or_else(|| {
            PipelineError::TrackingError("projected covariance is not positive definite".to_string())
        })?;

        // K^T = S^-1 (P H^T)^T
        let pht = *covariance * self.update_mat.transpose();
        let kalman_gain = cholesky.solve(&pht.transpose()).transpose();

        let innovation = measurement - projected_mean;
        *mean += kalman_gain * innovation;
        *covariance -= kalman_gain * projected_cov * kalman_gain.transpose();
        Ok(())
    }
}
