//! Attitude representations shared by the filter bank and the dataset store.
//!
//! Public angles are degrees, quaternions are scalar-first `(w, x, y, z)`.
//! Euler angles follow the aerospace ZYX sequence: `x` = roll, `y` = pitch,
//! `z` = yaw.

use nalgebra::Quaternion;
use serde::{Deserialize, Serialize};

/// Roll/pitch/yaw in degrees, each kept in `(-180, 180]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Orientation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Orientation {
    pub const ZERO: Orientation = Orientation { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { x: roll, y: pitch, z: yaw }
    }

    pub fn roll(&self) -> f64 {
        self.x
    }

    pub fn pitch(&self) -> f64 {
        self.y
    }

    pub fn yaw(&self) -> f64 {
        self.z
    }

    /// Wrap every axis into `(-180, 180]`.
    pub fn normalized(&self) -> Self {
        Self {
            x: normalize_angle(self.x),
            y: normalize_angle(self.y),
            z: normalize_angle(self.z),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Orientation quaternion as exchanged with telemetry sources (`qW/qX/qY/qZ`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    #[serde(rename = "qW")]
    pub w: f64,
    #[serde(rename = "qX")]
    pub x: f64,
    #[serde(rename = "qY")]
    pub y: f64,
    #[serde(rename = "qZ")]
    pub z: f64,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    pub const IDENTITY: Quat = Quat { w: 1.0, x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    pub fn norm_squared(&self) -> f64 {
        self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Unit-length copy, or `None` when the norm is zero or not finite.
    pub fn normalized(&self) -> Option<Self> {
        let norm_sq = self.norm_squared();
        if !norm_sq.is_finite() || norm_sq <= 0.0 {
            return None;
        }
        let recip_norm = 1.0 / norm_sq.sqrt();
        Some(Self {
            w: self.w * recip_norm,
            x: self.x * recip_norm,
            y: self.y * recip_norm,
            z: self.z * recip_norm,
        })
    }

    /// Roll/pitch/yaw in degrees.
    ///
    /// Pitch saturates at ±90° once `2(wy - zx)` reaches ±1, which keeps the
    /// gimbal-lock case finite instead of feeding `asin` an out-of-domain value.
    pub fn to_euler(&self) -> Orientation {
        let (w, x, y, z) = (self.w, self.x, self.y, self.z);

        let sinr_cosp = 2.0 * (w * x + y * z);
        let cosr_cosp = 1.0 - 2.0 * (x * x + y * y);
        let roll = sinr_cosp.atan2(cosr_cosp).to_degrees();

        let sinp = 2.0 * (w * y - z * x);
        let pitch = if sinp.abs() >= 1.0 {
            90.0_f64.copysign(sinp)
        } else {
            sinp.asin().to_degrees()
        };

        let siny_cosp = 2.0 * (w * z + x * y);
        let cosy_cosp = 1.0 - 2.0 * (y * y + z * z);
        let yaw = siny_cosp.atan2(cosy_cosp).to_degrees();

        Orientation::new(roll, pitch, yaw)
    }

    /// Quaternion for a ZYX roll/pitch/yaw triple given in degrees.
    pub fn from_euler(orientation: &Orientation) -> Self {
        let half_roll = orientation.x.to_radians() * 0.5;
        let half_pitch = orientation.y.to_radians() * 0.5;
        let half_yaw = orientation.z.to_radians() * 0.5;

        let (sr, cr) = half_roll.sin_cos();
        let (sp, cp) = half_pitch.sin_cos();
        let (sy, cy) = half_yaw.sin_cos();

        Self {
            w: cr * cp * cy + sr * sp * sy,
            x: sr * cp * cy - cr * sp * sy,
            y: cr * sp * cy + sr * cp * sy,
            z: cr * cp * sy - sr * sp * cy,
        }
    }

    pub fn to_nalgebra(&self) -> Quaternion<f64> {
        Quaternion::new(self.w, self.x, self.y, self.z)
    }
}

impl From<Quaternion<f64>> for Quat {
    fn from(q: Quaternion<f64>) -> Self {
        Self { w: q.w, x: q.i, y: q.j, z: q.k }
    }
}

/// Orientation estimate produced for one record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Attitude {
    pub orientation: Orientation,
    pub quaternion: Quat,
}

impl Attitude {
    pub const LEVEL: Attitude = Attitude {
        orientation: Orientation::ZERO,
        quaternion: Quat::IDENTITY,
    };

    /// Attitude taken verbatim from a quaternion.
    pub fn from_quaternion(quaternion: Quat) -> Self {
        Self {
            orientation: quaternion.to_euler().normalized(),
            quaternion,
        }
    }

    /// Attitude from Euler angles, with the quaternion synthesized from them.
    pub fn from_euler(orientation: Orientation) -> Self {
        let orientation = orientation.normalized();
        Self {
            orientation,
            quaternion: Quat::from_euler(&orientation),
        }
    }
}

/// Wrap an angle in degrees into `(-180, 180]`. Non-finite input maps to 0.
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = angle % 360.0;
    if wrapped > 180.0 {
        wrapped - 360.0
    } else if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}
