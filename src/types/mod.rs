pub mod attitude;

pub use attitude::*;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPERATURE_C: f64 = 20.0;
pub const DEFAULT_BATTERY_VOLTAGE: f64 = 4.2;
pub const DEFAULT_ROCKET_STATE: &str = "Unknown";

/// Three-axis sensor sample (accel in g, gyro in deg/s).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Axes {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Axes {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sensors {
    pub accel: Axes,
    pub gyro: Axes,
    /// meters
    pub altitude: f64,
    /// °C
    pub temperature: f64,
}

impl Default for Sensors {
    fn default() -> Self {
        Self {
            accel: Axes::default(),
            gyro: Axes::default(),
            altitude: 0.0,
            temperature: DEFAULT_TEMPERATURE_C,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemInfo {
    pub battery_voltage: f64,
    #[serde(rename = "rocketState")]
    pub rocket_state: String,
    pub millis: f64,
    pub free_heap: f64,
    pub free_space: f64,
    pub total_space: f64,
    pub wifi_strength: f64,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            battery_voltage: DEFAULT_BATTERY_VOLTAGE,
            rocket_state: DEFAULT_ROCKET_STATE.to_string(),
            millis: 0.0,
            free_heap: 0.0,
            free_space: 0.0,
            total_space: 1.0,
            wifi_strength: 0.0,
        }
    }
}

/// Ground-station simulation values some recordings carry alongside telemetry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Simulation {
    pub altitude: f64,
    pub velocity: f64,
}

/// One canonical telemetry sample.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TelemetryRecord {
    /// milliseconds
    pub timestamp: f64,
    /// seconds since the previous record, 0 for the first one
    pub delta_time: f64,
    pub sensors: Sensors,
    pub system: SystemInfo,
    pub simulation: Simulation,
    pub orientation: Orientation,
    /// Quaternion reported by the flight computer itself.
    pub quaternion: Option<Quat>,
    pub calculated_quaternion: Option<Quat>,
}

impl TelemetryRecord {
    pub fn has_device_quaternion(&self) -> bool {
        self.quaternion.is_some()
    }

    /// Current derived attitude, falling back to identity when no quaternion
    /// has been computed yet.
    pub fn attitude(&self) -> Attitude {
        Attitude {
            orientation: self.orientation,
            quaternion: self.calculated_quaternion.unwrap_or(Quat::IDENTITY),
        }
    }

    pub fn set_attitude(&mut self, attitude: Attitude) {
        self.orientation = attitude.orientation;
        self.calculated_quaternion = Some(attitude.quaternion);
    }
}
