//! Orientation filter bank.
//!
//! Three interchangeable strategies share one contract:
//! `(accel, gyro, delta_time, previous orientation) -> attitude`.
//! Only the Madgwick engine carries state between calls; it is owned by the
//! [`FilterBank`] and handed to the dispatch by `&mut`.

pub mod complementary;
pub mod kalman;
pub mod madgwick;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TelemetryError};
use crate::types::{Attitude, Axes, Orientation, TelemetryRecord};
use complementary::ComplementaryConfig;
use kalman::KalmanConfig;
use madgwick::{MadgwickAhrs, DEFAULT_BETA, DEFAULT_SAMPLE_FREQ};

pub const DEFAULT_MAX_STEP_SECS: f64 = 0.1;

// ─── Filter kinds ────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    #[default]
    Complementary,
    Kalman,
    Madgwick,
    /// Alias of `Madgwick` kept for full-quaternion mode selection.
    FullMadgwick,
}

impl FilterKind {
    pub const ALL: [FilterKind; 4] = [
        FilterKind::Complementary,
        FilterKind::Kalman,
        FilterKind::Madgwick,
        FilterKind::FullMadgwick,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Complementary => "complementary",
            FilterKind::Kalman => "kalman",
            FilterKind::Madgwick => "madgwick",
            FilterKind::FullMadgwick => "fullmadgwick",
        }
    }

    pub fn is_madgwick(&self) -> bool {
        matches!(self, FilterKind::Madgwick | FilterKind::FullMadgwick)
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterKind {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        FilterKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| TelemetryError::UnknownFilterKind(s.to_string()))
    }
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MadgwickConfig {
    pub beta: f64,
    pub sample_freq: f64,
}

impl Default for MadgwickConfig {
    fn default() -> Self {
        Self {
            beta: DEFAULT_BETA,
            sample_freq: DEFAULT_SAMPLE_FREQ,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub complementary: ComplementaryConfig,
    pub kalman: KalmanConfig,
    pub madgwick: MadgwickConfig,
    /// Upper bound on the live time step fed to the complementary, Kalman and
    /// accel-only paths. `None` passes delta time through unchanged.
    pub max_step_secs: Option<f64>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            complementary: ComplementaryConfig::default(),
            kalman: KalmanConfig::default(),
            madgwick: MadgwickConfig::default(),
            max_step_secs: Some(DEFAULT_MAX_STEP_SECS),
        }
    }
}

/// Partial parameter update for one filter kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParamPatch {
    pub alpha: Option<f64>,
    pub process_noise: Option<f64>,
    pub measurement_noise: Option<f64>,
    pub beta: Option<f64>,
    pub sample_freq: Option<f64>,
    pub max_step_secs: Option<f64>,
}

impl FilterConfig {
    /// Apply the fields of `patch` that belong to `kind`, plus `max_step_secs`.
    /// Nothing changes unless the patched configuration is valid.
    pub fn apply(&mut self, kind: FilterKind, patch: &FilterParamPatch) -> Result<()> {
        let mut next = self.clone();

        match kind {
            FilterKind::Complementary => {
                if let Some(alpha) = patch.alpha {
                    next.complementary.alpha = alpha;
                }
            }
            FilterKind::Kalman => {
                if let Some(p) = patch.process_noise {
                    next.kalman.process_noise = p;
                }
                if let Some(m) = patch.measurement_noise {
                    next.kalman.measurement_noise = m;
                }
            }
            FilterKind::Madgwick | FilterKind::FullMadgwick => {
                if let Some(beta) = patch.beta {
                    next.madgwick.beta = beta;
                }
                if let Some(freq) = patch.sample_freq {
                    next.madgwick.sample_freq = freq;
                }
            }
        }
        if let Some(step) = patch.max_step_secs {
            next.max_step_secs = Some(step);
        }

        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Check every parameter. Configurations loaded from files go through
    /// here as well as patches.
    pub fn validate(&self) -> Result<()> {
        let alpha = self.complementary.alpha;
        if !(0.0..=1.0).contains(&alpha) {
            return Err(TelemetryError::InvalidParameter { name: "alpha", value: alpha });
        }

        let KalmanConfig { process_noise, measurement_noise } = self.kalman;
        if !process_noise.is_finite() || process_noise < 0.0 {
            return Err(TelemetryError::InvalidParameter {
                name: "process_noise",
                value: process_noise,
            });
        }
        if !measurement_noise.is_finite()
            || measurement_noise < 0.0
            || process_noise + measurement_noise <= 0.0
        {
            return Err(TelemetryError::InvalidParameter {
                name: "measurement_noise",
                value: measurement_noise,
            });
        }

        let beta = self.madgwick.beta;
        if !beta.is_finite() || beta < 0.0 {
            return Err(TelemetryError::InvalidParameter { name: "beta", value: beta });
        }
        let freq = self.madgwick.sample_freq;
        if !freq.is_finite() || freq <= 0.0 {
            return Err(TelemetryError::InvalidParameter { name: "sample_freq", value: freq });
        }

        if let Some(step) = self.max_step_secs {
            if !step.is_finite() || step <= 0.0 {
                return Err(TelemetryError::InvalidParameter { name: "max_step_secs", value: step });
            }
        }
        Ok(())
    }

    fn step(&self, delta_time: f64, policy: StepPolicy) -> f64 {
        match (policy, self.max_step_secs) {
            (StepPolicy::Clamped, Some(max)) => delta_time.min(max),
            _ => delta_time,
        }
    }
}

/// How the complementary, Kalman and accel-only paths treat delta time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StepPolicy {
    /// Bounded by `max_step_secs`. Used while ingesting live samples.
    #[default]
    Clamped,
    /// The stored delta time as recorded. Used when recomputing a dataset.
    Recorded,
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

/// Sensor inputs a filter step consumes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FilterInput {
    pub accel: Axes,
    pub gyro: Axes,
    pub delta_time: f64,
}

impl FilterInput {
    pub fn from_record(record: &TelemetryRecord) -> Self {
        Self {
            accel: record.sensors.accel,
            gyro: record.sensors.gyro,
            delta_time: record.delta_time,
        }
    }
}

/// Roll and pitch in degrees implied by the gravity direction.
pub fn accel_tilt(accel: &Axes) -> (f64, f64) {
    let roll = accel.y.atan2(accel.z).to_degrees();
    let pitch = (-accel.x).atan2((accel.y * accel.y + accel.z * accel.z).sqrt()).to_degrees();
    (roll, pitch)
}

/// One step of `kind`. The caller guarantees `input.delta_time > 0`.
pub fn run_filter(
    kind: FilterKind,
    config: &FilterConfig,
    engine: &mut MadgwickAhrs,
    input: &FilterInput,
    previous: Option<&Orientation>,
    policy: StepPolicy,
) -> Attitude {
    match kind {
        FilterKind::Complementary => {
            let stepped = FilterInput { delta_time: config.step(input.delta_time, policy), ..*input };
            Attitude::from_euler(complementary::estimate(&config.complementary, &stepped, previous))
        }
        FilterKind::Kalman => {
            let stepped = FilterInput { delta_time: config.step(input.delta_time, policy), ..*input };
            Attitude::from_euler(kalman::estimate(&config.kalman, &stepped, previous))
        }
        FilterKind::Madgwick | FilterKind::FullMadgwick => {
            engine.update_imu(&input.gyro.to_vector(), &input.accel.to_vector(), input.delta_time);
            Attitude {
                orientation: engine.euler_angles().normalized(),
                quaternion: engine.quaternion(),
            }
        }
    }
}

/// Tilt from the accelerometer, yaw integrated from the gyro. Used when
/// filtering is switched off. A non-positive delta time only freezes yaw.
fn accel_only(
    config: &FilterConfig,
    input: &FilterInput,
    previous: Option<&Orientation>,
    policy: StepPolicy,
) -> Attitude {
    let (roll, pitch) = accel_tilt(&input.accel);
    let prev_yaw = previous.map(|p| p.z).unwrap_or(0.0);
    let yaw = prev_yaw + input.gyro.z * config.step(input.delta_time.max(0.0), policy);
    Attitude::from_euler(Orientation::new(roll, pitch, yaw))
}

// ─── Filter bank ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct FilterBank {
    kind: FilterKind,
    enabled: bool,
    use_device_quaternion: bool,
    config: FilterConfig,
    madgwick: MadgwickAhrs,
}

impl Default for FilterBank {
    fn default() -> Self {
        Self::new(FilterKind::default(), FilterConfig::default())
    }
}

impl FilterBank {
    pub fn new(kind: FilterKind, config: FilterConfig) -> Self {
        let madgwick = MadgwickAhrs::new(config.madgwick.sample_freq, config.madgwick.beta);
        Self {
            kind,
            enabled: true,
            use_device_quaternion: false,
            config,
            madgwick,
        }
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Select a filter kind. The Madgwick state is reset even when the kind
    /// is unchanged.
    pub fn set_kind(&mut self, kind: FilterKind) {
        if kind != self.kind {
            log::info!("filter kind set to {}", kind);
        }
        self.kind = kind;
        self.madgwick.reset();
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn use_device_quaternion(&self) -> bool {
        self.use_device_quaternion
    }

    pub fn set_use_device_quaternion(&mut self, enabled: bool) {
        if enabled != self.use_device_quaternion {
            log::info!("device quaternion passthrough {}", if enabled { "on" } else { "off" });
        }
        self.use_device_quaternion = enabled;
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn configure(&mut self, kind: FilterKind, patch: &FilterParamPatch) -> Result<()> {
        self.config.apply(kind, patch)?;
        self.madgwick.set_beta(self.config.madgwick.beta);
        self.madgwick.set_sample_freq(self.config.madgwick.sample_freq);
        log::info!("{} parameters updated: {:?}", kind, patch);
        Ok(())
    }

    pub fn madgwick(&self) -> &MadgwickAhrs {
        &self.madgwick
    }

    /// Restore the Madgwick quaternion to identity.
    pub fn reset(&mut self) {
        self.madgwick.reset();
    }

    /// Attitude for the first record of a sequence: the device quaternion in
    /// passthrough mode, level otherwise.
    pub fn seed(&self, record: &TelemetryRecord) -> Attitude {
        match record.quaternion {
            Some(q) if self.use_device_quaternion => Attitude::from_quaternion(q),
            _ => Attitude::LEVEL,
        }
    }

    /// Estimate the attitude of a live `record` following `previous`, with
    /// the time step clamped.
    ///
    /// `None` means the step was a no-op (`delta_time <= 0` with filtering
    /// enabled) and the caller keeps the prior attitude.
    pub fn estimate(&mut self, record: &TelemetryRecord, previous: Option<&Orientation>) -> Option<Attitude> {
        self.estimate_with(record, previous, StepPolicy::Clamped)
    }

    pub fn estimate_with(
        &mut self,
        record: &TelemetryRecord,
        previous: Option<&Orientation>,
        policy: StepPolicy,
    ) -> Option<Attitude> {
        if self.use_device_quaternion {
            if let Some(q) = record.quaternion {
                return Some(Attitude::from_quaternion(q));
            }
        }

        let input = FilterInput::from_record(record);
        if !self.enabled {
            return Some(accel_only(&self.config, &input, previous, policy));
        }

        if !(input.delta_time > 0.0) {
            return None;
        }

        Some(run_filter(self.kind, &self.config, &mut self.madgwick, &input, previous, policy))
    }
}
