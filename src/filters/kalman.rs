use serde::{Deserialize, Serialize};

use super::{accel_tilt, FilterInput};
use crate::types::Orientation;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    pub process_noise: f64,
    pub measurement_noise: f64,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            process_noise: 0.01,
            measurement_noise: 0.1,
        }
    }
}

impl KalmanConfig {
    /// Static scalar gain. No covariance is propagated between steps.
    pub fn gain(&self) -> f64 {
        self.process_noise / (self.process_noise + self.measurement_noise)
    }
}

/// Gyro prediction corrected towards the accel tilt by a fixed gain.
/// Yaw keeps the prediction only.
pub fn estimate(
    config: &KalmanConfig,
    input: &FilterInput,
    previous: Option<&Orientation>,
) -> Orientation {
    let (accel_roll, accel_pitch) = accel_tilt(&input.accel);

    let Some(prev) = previous else {
        return Orientation::new(accel_roll, accel_pitch, 0.0);
    };

    let dt = input.delta_time;
    let predicted_roll = prev.x + input.gyro.x * dt;
    let predicted_pitch = prev.y + input.gyro.y * dt;
    let predicted_yaw = prev.z + input.gyro.z * dt;

    let k = config.gain();
    Orientation::new(
        predicted_roll + k * (accel_roll - predicted_roll),
        predicted_pitch + k * (accel_pitch - predicted_pitch),
        predicted_yaw,
    )
}
