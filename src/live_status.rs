use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::dataset::SamplingRates;
use crate::pipeline::TelemetryPipeline;
use crate::types::{Orientation, Quat};

/// Snapshot of the live ingest loop, written periodically for dashboards.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub uptime_seconds: u64,
    pub records_received: u64,
    pub lines_rejected: u64,
    pub filter: String,
    pub filter_enabled: bool,
    pub use_device_quaternion: bool,
    // Latest record
    pub telemetry_timestamp_ms: Option<f64>,
    pub orientation: Option<Orientation>,
    pub quaternion: Option<Quat>,
    pub altitude: f64,
    pub battery_voltage: f64,
    pub rocket_state: String,
    // Trailing sample interval, seconds
    pub sampling_min: Option<f64>,
    pub sampling_max: Option<f64>,
    pub sampling_avg: Option<f64>,
}

impl LiveStatus {
    pub fn from_pipeline(pipeline: &TelemetryPipeline, uptime_seconds: u64, lines_rejected: u64) -> Self {
        let bank = pipeline.bank();
        let dataset = pipeline.dataset();
        let last = dataset.records().last();
        let rates: Option<SamplingRates> = dataset.metadata().sampling_rates;

        Self {
            timestamp: current_timestamp(),
            uptime_seconds,
            records_received: dataset.len() as u64,
            lines_rejected,
            filter: bank.kind().to_string(),
            filter_enabled: bank.enabled(),
            use_device_quaternion: bank.use_device_quaternion(),
            telemetry_timestamp_ms: last.map(|r| r.timestamp),
            orientation: last.map(|r| r.orientation),
            quaternion: last.and_then(|r| r.calculated_quaternion),
            altitude: last.map(|r| r.sensors.altitude).unwrap_or(0.0),
            battery_voltage: last.map(|r| r.system.battery_voltage).unwrap_or(0.0),
            rocket_state: last
                .map(|r| r.system.rocket_state.clone())
                .unwrap_or_default(),
            sampling_min: rates.map(|r| r.min),
            sampling_max: rates.map(|r| r.max),
            sampling_avg: rates.map(|r| r.avg),
        }
    }

    /// One-line console summary.
    pub fn summary(&self) -> String {
        let (roll, pitch, yaw) = self
            .orientation
            .map(|o| (o.x, o.y, o.z))
            .unwrap_or((0.0, 0.0, 0.0));
        format!(
            "records={} rejected={} filter={} roll={:.1} pitch={:.1} yaw={:.1} alt={:.1}m state={}",
            self.records_received,
            self.lines_rejected,
            self.filter,
            roll,
            pitch,
            yaw,
            self.altitude,
            self.rocket_state
        )
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
