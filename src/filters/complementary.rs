use serde::{Deserialize, Serialize};

use super::{accel_tilt, FilterInput};
use crate::types::Orientation;

pub const DEFAULT_ALPHA: f64 = 0.98;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplementaryConfig {
    /// Weight of the gyro-integrated angle; `1 - alpha` goes to the accel tilt.
    pub alpha: f64,
}

impl Default for ComplementaryConfig {
    fn default() -> Self {
        Self { alpha: DEFAULT_ALPHA }
    }
}

/// Fixed-weight blend of gyro integration and accelerometer tilt.
///
/// Without a previous orientation the accel tilt is returned as-is with yaw 0.
/// Yaw is gyro-only: there is no absolute heading reference.
pub fn estimate(
    config: &ComplementaryConfig,
    input: &FilterInput,
    previous: Option<&Orientation>,
) -> Orientation {
    let (accel_roll, accel_pitch) = accel_tilt(&input.accel);

    let Some(prev) = previous else {
        return Orientation::new(accel_roll, accel_pitch, 0.0);
    };

    let dt = input.delta_time;
    let alpha = config.alpha;
    Orientation::new(
        alpha * (prev.x + input.gyro.x * dt) + (1.0 - alpha) * accel_roll,
        alpha * (prev.y + input.gyro.y * dt) + (1.0 - alpha) * accel_pitch,
        prev.z + input.gyro.z * dt,
    )
}
