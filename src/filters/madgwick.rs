//! Madgwick gradient-descent AHRS.
//!
//! State is a single orientation quaternion `q` (sensor frame relative to the
//! earth frame), mutated in place by every update. Each step integrates the
//! gyro rate and nudges the result along the negative, normalized gradient of
//! the gravity (and optionally magnetic-field) alignment error:
//!
//! ```text
//! q_dot = 0.5 * q ⊗ (0, ω) - β * ∇f / |∇f|
//! q     = normalize(q + q_dot * dt)
//! ```
//!
//! Single forward-Euler step, no outlier rejection, no covariance.

use nalgebra::{Matrix3x4, Matrix6x4, Quaternion, Vector3, Vector6};
use serde::{Deserialize, Serialize};

use crate::types::{Orientation, Quat};

pub const DEFAULT_BETA: f64 = 0.1;
pub const DEFAULT_SAMPLE_FREQ: f64 = 100.0;

/// Per-component quaternion overwrite; `None` components take the identity value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuaternionPatch {
    #[serde(rename = "qW")]
    pub w: Option<f64>,
    #[serde(rename = "qX")]
    pub x: Option<f64>,
    #[serde(rename = "qY")]
    pub y: Option<f64>,
    #[serde(rename = "qZ")]
    pub z: Option<f64>,
}

impl From<Quat> for QuaternionPatch {
    fn from(q: Quat) -> Self {
        Self { w: Some(q.w), x: Some(q.x), y: Some(q.y), z: Some(q.z) }
    }
}

#[derive(Clone, Debug)]
pub struct MadgwickAhrs {
    q: Quaternion<f64>,
    beta: f64,
    sample_freq: f64,
}

impl Default for MadgwickAhrs {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_FREQ, DEFAULT_BETA)
    }
}

impl MadgwickAhrs {
    pub fn new(sample_freq: f64, beta: f64) -> Self {
        Self {
            q: Quaternion::identity(),
            beta,
            sample_freq,
        }
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Higher beta trusts the accelerometer more: faster drift correction but
    /// more sensitive to linear acceleration.
    pub fn set_beta(&mut self, beta: f64) {
        self.beta = beta;
    }

    pub fn sample_freq(&self) -> f64 {
        self.sample_freq
    }

    pub fn set_sample_freq(&mut self, sample_freq: f64) {
        self.sample_freq = sample_freq;
    }

    /// IMU update, gyro in deg/s, accel in any unit (only its direction is used),
    /// `delta_time` in seconds.
    ///
    /// A zero accelerometer vector skips the correction and leaves pure gyro
    /// integration for this step.
    pub fn update_imu(&mut self, gyro: &Vector3<f64>, accel: &Vector3<f64>, delta_time: f64) {
        let mut q_dot = self.rate_of_change(gyro);

        if let Some(a) = unit_or_none(accel) {
            let (w, x, y, z) = (self.q.w, self.q.i, self.q.j, self.q.k);

            let f = Vector3::new(
                2.0 * (x * z - w * y) - a.x,
                2.0 * (w * x + y * z) - a.y,
                2.0 * (0.5 - x * x - y * y) - a.z,
            );
            #[rustfmt::skip]
            let jacobian = Matrix3x4::new(
                -2.0 * y,  2.0 * z, -2.0 * w, 2.0 * x,
                 2.0 * x,  2.0 * w,  2.0 * z, 2.0 * y,
                 0.0,     -4.0 * x, -4.0 * y, 0.0,
            );
            let s = jacobian.transpose() * f;
            self.apply_correction(&mut q_dot, Quaternion::new(s[0], s[1], s[2], s[3]));
        }

        self.integrate(q_dot, delta_time);
    }

    /// IMU update integrated over the nominal sample period `1 / sample_freq`.
    pub fn update_imu_nominal(&mut self, gyro: &Vector3<f64>, accel: &Vector3<f64>) {
        let dt = self.sample_period();
        self.update_imu(gyro, accel, dt);
    }

    /// Full AHRS update with magnetometer heading correction.
    ///
    /// A zero magnetometer vector falls back to [`Self::update_imu`].
    pub fn update(
        &mut self,
        gyro: &Vector3<f64>,
        accel: &Vector3<f64>,
        mag: &Vector3<f64>,
        delta_time: f64,
    ) {
        let Some(m) = unit_or_none(mag) else {
            self.update_imu(gyro, accel, delta_time);
            return;
        };

        let mut q_dot = self.rate_of_change(gyro);

        if let Some(a) = unit_or_none(accel) {
            // Earth-frame field direction, horizontal part collapsed onto x
            let h = (self.q * Quaternion::from_imag(m) * self.q.conjugate()).imag();
            let bx = (h.x * h.x + h.y * h.y).sqrt();
            let bz = h.z;

            let (w, x, y, z) = (self.q.w, self.q.i, self.q.j, self.q.k);

            let f = Vector6::new(
                2.0 * (x * z - w * y) - a.x,
                2.0 * (w * x + y * z) - a.y,
                2.0 * (0.5 - x * x - y * y) - a.z,
                2.0 * bx * (0.5 - y * y - z * z) + 2.0 * bz * (x * z - w * y) - m.x,
                2.0 * bx * (x * y - w * z) + 2.0 * bz * (w * x + y * z) - m.y,
                2.0 * bx * (w * y + x * z) + 2.0 * bz * (0.5 - x * x - y * y) - m.z,
            );
            #[rustfmt::skip]
            let jacobian = Matrix6x4::new(
                -2.0 * y, 2.0 * z, -2.0 * w, 2.0 * x,
                2.0 * x, 2.0 * w, 2.0 * z, 2.0 * y,
                0.0, -4.0 * x, -4.0 * y, 0.0,
                -2.0 * bz * y, 2.0 * bz * z, -4.0 * bx * y - 2.0 * bz * w, -4.0 * bx * z + 2.0 * bz * x,
                -2.0 * bx * z + 2.0 * bz * x, 2.0 * bx * y + 2.0 * bz * w, 2.0 * bx * x + 2.0 * bz * z, -2.0 * bx * w + 2.0 * bz * y,
                2.0 * bx * y, 2.0 * bx * z - 4.0 * bz * x, 2.0 * bx * w - 4.0 * bz * y, 2.0 * bx * x,
            );
            let s = jacobian.transpose() * f;
            self.apply_correction(&mut q_dot, Quaternion::new(s[0], s[1], s[2], s[3]));
        }

        self.integrate(q_dot, delta_time);
    }

    pub fn euler_angles(&self) -> Orientation {
        self.quaternion().to_euler()
    }

    pub fn quaternion(&self) -> Quat {
        Quat::from(self.q)
    }

    /// Overwrite the state. Missing components default to the identity's and
    /// the result is re-normalized; a degenerate result resets to identity.
    pub fn set_quaternion(&mut self, patch: impl Into<QuaternionPatch>) {
        let patch = patch.into();
        let candidate = Quat::new(
            patch.w.unwrap_or(1.0),
            patch.x.unwrap_or(0.0),
            patch.y.unwrap_or(0.0),
            patch.z.unwrap_or(0.0),
        );
        self.q = candidate
            .normalized()
            .map(|q| q.to_nalgebra())
            .unwrap_or_else(Quaternion::identity);
    }

    pub fn reset(&mut self) {
        self.q = Quaternion::identity();
    }

    fn sample_period(&self) -> f64 {
        if self.sample_freq > 0.0 {
            1.0 / self.sample_freq
        } else {
            1.0 / DEFAULT_SAMPLE_FREQ
        }
    }

    fn rate_of_change(&self, gyro_deg: &Vector3<f64>) -> Quaternion<f64> {
        let omega = gyro_deg.map(f64::to_radians);
        self.q * Quaternion::from_imag(omega) * 0.5
    }

    fn apply_correction(&self, q_dot: &mut Quaternion<f64>, gradient: Quaternion<f64>) {
        // Zero gradient means the estimate already matches the measurement
        let norm = gradient.norm();
        if norm > 0.0 && norm.is_finite() {
            *q_dot -= gradient * (self.beta / norm);
        }
    }

    fn integrate(&mut self, q_dot: Quaternion<f64>, delta_time: f64) {
        let next = self.q + q_dot * delta_time;
        let norm = next.norm();
        if norm > 0.0 && norm.is_finite() {
            self.q = next / norm;
        }
    }
}

fn unit_or_none(v: &Vector3<f64>) -> Option<Vector3<f64>> {
    if v.x == 0.0 && v.y == 0.0 && v.z == 0.0 {
        return None;
    }
    let norm = v.norm();
    if !norm.is_finite() {
        return None;
    }
    Some(*v / norm)
}
