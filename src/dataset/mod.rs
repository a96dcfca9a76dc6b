//! Telemetry Dataset Store.
//!
//! One append-only sequence of canonical records shared by the two drivers:
//! live ingest computes orientation record by record with
//! [`TelemetryDataset::compute_orientation_at`], batch mode re-runs every record
//! with [`TelemetryDataset::recalculate_orientation`].

pub mod csv_io;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, TelemetryError};
use crate::filters::{FilterBank, StepPolicy};
use crate::normalizer;
use crate::types::{Attitude, Axes, Orientation, TelemetryRecord};

/// Records considered by the trailing sampling-rate summary.
pub const SAMPLING_WINDOW: usize = 10;

// ─── Metadata ────────────────────────────────────────────────────────────────

/// Delta-time summary in seconds over the trailing window.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SamplingRates {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMetadata {
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub sampling_rates: Option<SamplingRates>,
    pub total_points: usize,
    pub has_quaternions: bool,
}

fn trailing_sampling_rates(records: &[TelemetryRecord]) -> Option<SamplingRates> {
    if records.len() < 2 {
        return None;
    }
    let window = &records[records.len().saturating_sub(SAMPLING_WINDOW)..];
    let intervals = &window[1..];

    let mut total = 0.0;
    let mut min = f64::INFINITY;
    let mut max = 0.0_f64;
    for dt in intervals.iter().map(|r| r.delta_time).filter(|dt| *dt != 0.0) {
        total += dt;
        min = min.min(dt);
        max = max.max(dt);
    }

    // zero-length intervals are skipped for min/max but still count towards avg
    (total > 0.0).then(|| SamplingRates {
        min,
        max,
        avg: total / intervals.len() as f64,
    })
}

// ─── Series ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SeriesKind {
    Accel,
    Gyro,
    Orientation,
    Altitude,
}

impl FromStr for SeriesKind {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accel" => Ok(SeriesKind::Accel),
            "gyro" => Ok(SeriesKind::Gyro),
            "orientation" => Ok(SeriesKind::Orientation),
            "altitude" => Ok(SeriesKind::Altitude),
            _ => Err(TelemetryError::UnknownSeriesKind(s.to_string())),
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeriesKind::Accel => "accel",
            SeriesKind::Gyro => "gyro",
            SeriesKind::Orientation => "orientation",
            SeriesKind::Altitude => "altitude",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn pick(&self, axes: &Axes) -> f64 {
        match self {
            Axis::X => axes.x,
            Axis::Y => axes.y,
            Axis::Z => axes.z,
        }
    }
}

impl FromStr for Axis {
    type Err = TelemetryError;

    /// Accepts `x`/`y`/`z` or the indices `0`/`1`/`2`.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" | "0" => Ok(Axis::X),
            "y" | "1" => Ok(Axis::Y),
            "z" | "2" => Ok(Axis::Z),
            _ => Err(TelemetryError::UnknownAxis(s.to_string())),
        }
    }
}

/// One chart point: `x` is the timestamp in ms.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub x: f64,
    pub y: f64,
}

fn series_value(record: &TelemetryRecord, kind: SeriesKind, axis: Axis) -> f64 {
    match kind {
        SeriesKind::Accel => axis.pick(&record.sensors.accel),
        SeriesKind::Gyro => axis.pick(&record.sensors.gyro),
        SeriesKind::Orientation => {
            let Orientation { x, y, z } = record.orientation;
            axis.pick(&Axes::new(x, y, z))
        }
        SeriesKind::Altitude => record.sensors.altitude,
    }
}

// ─── Statistics ──────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ValueStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl ValueStats {
    fn from_values(values: impl Iterator<Item = f64>) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        if count == 0 {
            return Self::default();
        }
        Self { min, max, avg: sum / count as f64 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct AxisStats {
    pub x: ValueStats,
    pub y: ValueStats,
    pub z: ValueStats,
}

impl AxisStats {
    fn from_axes(samples: impl Iterator<Item = Axes> + Clone) -> Self {
        Self {
            x: ValueStats::from_values(samples.clone().map(|a| a.x)),
            y: ValueStats::from_values(samples.clone().map(|a| a.y)),
            z: ValueStats::from_values(samples.map(|a| a.z)),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetStatistics {
    pub count: usize,
    /// seconds
    pub duration: f64,
    pub sampling_rates: Option<SamplingRates>,
    pub acceleration: AxisStats,
    pub gyroscope: AxisStats,
    pub orientation: AxisStats,
    pub altitude: ValueStats,
    pub has_quaternions: bool,
}

// ─── Dataset ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default)]
pub struct TelemetryDataset {
    records: Vec<TelemetryRecord>,
    cursor: usize,
    metadata: DatasetMetadata,
}

impl TelemetryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize `raw` and append it. Orientation is not computed here.
    pub fn add_data_point(&mut self, raw: &Value) -> &TelemetryRecord {
        self.push_record(normalizer::normalize(raw))
    }

    /// Append an already-canonical record, computing its delta time against
    /// the last stored record.
    pub fn push_record(&mut self, mut record: TelemetryRecord) -> &TelemetryRecord {
        match self.records.last() {
            Some(prev) => record.delta_time = (record.timestamp - prev.timestamp) / 1000.0,
            None => {
                record.delta_time = 0.0;
                self.metadata.start_time = Some(record.timestamp);
            }
        }

        self.metadata.has_quaternions |= record.has_device_quaternion();
        self.metadata.end_time = Some(record.timestamp);
        self.metadata.total_points += 1;

        self.records.push(record);
        // a window of zero-length intervals keeps the last summary
        if let Some(rates) = trailing_sampling_rates(&self.records) {
            self.metadata.sampling_rates = Some(rates);
        }

        let last = self.records.len() - 1;
        &self.records[last]
    }

    /// Replace the contents with `raw` records. An empty input leaves the
    /// dataset untouched. Returns the number of records loaded.
    pub fn load_from_records(&mut self, raw: &[Value]) -> usize {
        if raw.is_empty() {
            return 0;
        }
        self.reset();
        for value in raw {
            self.add_data_point(value);
        }
        self.records.len()
    }

    pub fn reset(&mut self) {
        self.records.clear();
        self.cursor = 0;
        self.metadata = DatasetMetadata::default();
    }

    pub fn records(&self) -> &[TelemetryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TelemetryRecord> {
        self.records.get(index)
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_record(&self) -> Option<&TelemetryRecord> {
        self.records.get(self.cursor)
    }

    pub fn set_cursor(&mut self, index: usize) -> Result<&TelemetryRecord> {
        let len = self.records.len();
        if index >= len {
            return Err(TelemetryError::IndexOutOfRange { index, len });
        }
        self.cursor = index;
        Ok(&self.records[index])
    }

    /// Records in `start..end`.
    pub fn data_range(&self, start: usize, end: usize) -> Result<&[TelemetryRecord]> {
        let len = self.records.len();
        if start > end || end > len {
            return Err(TelemetryError::InvalidRange { start, end, len });
        }
        Ok(&self.records[start..end])
    }

    pub fn filter<P>(&self, mut predicate: P) -> Vec<&TelemetryRecord>
    where
        P: FnMut(&TelemetryRecord) -> bool,
    {
        self.records.iter().filter(|r| predicate(*r)).collect()
    }

    /// `(timestamp, value)` pairs for one channel. `axis` is ignored for
    /// altitude.
    pub fn data_series(&self, kind: SeriesKind, axis: Axis) -> impl Iterator<Item = SeriesPoint> + '_ {
        self.records.iter().map(move |r| SeriesPoint {
            x: r.timestamp,
            y: series_value(r, kind, axis),
        })
    }

    pub fn statistics(&self) -> DatasetStatistics {
        if self.records.is_empty() {
            return DatasetStatistics::default();
        }

        let duration = match (self.metadata.start_time, self.metadata.end_time) {
            (Some(start), Some(end)) => (end - start) / 1000.0,
            _ => 0.0,
        };
        let records = self.records.iter();

        DatasetStatistics {
            count: self.records.len(),
            duration,
            sampling_rates: self.metadata.sampling_rates,
            acceleration: AxisStats::from_axes(records.clone().map(|r| r.sensors.accel)),
            gyroscope: AxisStats::from_axes(records.clone().map(|r| r.sensors.gyro)),
            orientation: AxisStats::from_axes(
                records.clone().map(|r| Axes::new(r.orientation.x, r.orientation.y, r.orientation.z)),
            ),
            altitude: ValueStats::from_values(records.map(|r| r.sensors.altitude)),
            has_quaternions: self.metadata.has_quaternions,
        }
    }

    // ─── Orientation ─────────────────────────────────────────────────────────

    /// Compute and store the attitude of the record at `index` from its
    /// predecessor, reusing whatever state `bank` carries. Record 0 is seeded.
    pub fn compute_orientation_at(&mut self, index: usize, bank: &mut FilterBank) -> Result<Attitude> {
        let len = self.records.len();
        if index >= len {
            return Err(TelemetryError::IndexOutOfRange { index, len });
        }

        let attitude = if index == 0 {
            bank.seed(&self.records[0])
        } else {
            let previous = self.records[index - 1].attitude();
            bank.estimate(&self.records[index], Some(&previous.orientation))
                .unwrap_or(previous)
        };

        self.records[index].set_attitude(attitude);
        Ok(attitude)
    }

    /// Recompute every record from index 0 under the bank's current settings,
    /// integrating each record's stored delta time without the live clamp.
    ///
    /// The Madgwick state is reset first, so repeated passes over the same
    /// records produce identical results.
    pub fn recalculate_orientation(&mut self, bank: &mut FilterBank) {
        if self.records.is_empty() {
            return;
        }

        bank.reset();

        let mut previous = bank.seed(&self.records[0]);
        self.records[0].set_attitude(previous);

        let mut skipped = 0usize;
        for record in self.records.iter_mut().skip(1) {
            let step = bank.estimate_with(record, Some(&previous.orientation), StepPolicy::Recorded);
            let attitude = match step {
                Some(attitude) => attitude,
                None => {
                    skipped += 1;
                    previous
                }
            };
            record.set_attitude(attitude);
            previous = attitude;
        }

        log::debug!("{} records carried forward with non-positive delta time", skipped);
        log::info!(
            "recomputed orientation for {} records ({}, device quaternion {})",
            self.records.len(),
            if bank.enabled() { bank.kind().as_str() } else { "accel-only" },
            bank.use_device_quaternion()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{FilterConfig, FilterKind};
    use crate::types::Quat;
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    fn sample(ts: f64, accel: [f64; 3], gyro: [f64; 3]) -> Value {
        json!({
            "timestamp": ts,
            "accel": {"x": accel[0], "y": accel[1], "z": accel[2]},
            "gyro": {"x": gyro[0], "y": gyro[1], "z": gyro[2]},
        })
    }

    fn flight(n: usize) -> TelemetryDataset {
        let mut ds = TelemetryDataset::new();
        for i in 0..n {
            let t = i as f64;
            // non-uniform spacing
            let ts = 1000.0 + t * 20.0 + if i % 3 == 0 { 5.0 } else { 0.0 };
            ds.add_data_point(&sample(
                ts,
                [0.1 * (t * 0.1).sin(), 0.2 * (t * 0.05).cos(), 0.95],
                [15.0 * (t * 0.2).sin(), -8.0, 30.0],
            ));
        }
        ds
    }

    #[test]
    fn test_delta_time_and_metadata() {
        let mut ds = TelemetryDataset::new();
        ds.add_data_point(&sample(1000.0, [0.0, 0.0, 1.0], [0.0; 3]));
        ds.add_data_point(&sample(1100.0, [0.0, 0.0, 1.0], [0.0; 3]));
        ds.add_data_point(&sample(1300.0, [0.0, 0.0, 1.0], [0.0; 3]));

        assert_eq!(ds.records()[0].delta_time, 0.0);
        assert_abs_diff_eq!(ds.records()[1].delta_time, 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(ds.records()[2].delta_time, 0.2, epsilon = 1e-12);

        let meta = ds.metadata();
        assert_eq!(meta.start_time, Some(1000.0));
        assert_eq!(meta.end_time, Some(1300.0));
        assert_eq!(meta.total_points, 3);
        assert!(!meta.has_quaternions);

        let rates = meta.sampling_rates.unwrap();
        assert_abs_diff_eq!(rates.min, 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(rates.max, 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(rates.avg, 0.15, epsilon = 1e-12);
    }

    #[test]
    fn test_sampling_rates_use_trailing_window() {
        let mut ds = TelemetryDataset::new();
        // one long gap early on, then steady 10 ms spacing
        ds.add_data_point(&sample(0.0, [0.0, 0.0, 1.0], [0.0; 3]));
        ds.add_data_point(&sample(5000.0, [0.0, 0.0, 1.0], [0.0; 3]));
        for i in 1..=20 {
            ds.add_data_point(&sample(5000.0 + i as f64 * 10.0, [0.0, 0.0, 1.0], [0.0; 3]));
        }
        let rates = ds.metadata().sampling_rates.unwrap();
        assert_abs_diff_eq!(rates.max, 0.01, epsilon = 1e-9);
        assert_abs_diff_eq!(rates.avg, 0.01, epsilon = 1e-9);
    }

    #[test]
    fn test_quaternion_presence_tracked() {
        let mut ds = TelemetryDataset::new();
        ds.add_data_point(&sample(0.0, [0.0, 0.0, 1.0], [0.0; 3]));
        assert!(!ds.metadata().has_quaternions);
        ds.add_data_point(&json!({"timestamp": 10, "quat": {"qW": 1, "qX": 0, "qY": 0, "qZ": 0}}));
        assert!(ds.metadata().has_quaternions);
    }

    #[test]
    fn test_first_record_seeding() {
        let mut ds = flight(20);
        let mut bank = FilterBank::default();
        ds.recalculate_orientation(&mut bank);
        assert_eq!(ds.records()[0].orientation, Orientation::ZERO);
        assert_eq!(ds.records()[0].calculated_quaternion, Some(Quat::IDENTITY));

        let q = Quat::from_euler(&Orientation::new(0.0, 0.0, 60.0));
        let mut ds = TelemetryDataset::new();
        ds.add_data_point(&json!({
            "timestamp": 0,
            "quat": {"qW": q.w, "qX": q.x, "qY": q.y, "qZ": q.z}
        }));
        ds.add_data_point(&sample(10.0, [0.0, 0.0, 1.0], [0.0; 3]));

        ds.recalculate_orientation(&mut bank);
        assert_eq!(ds.records()[0].orientation.z, 0.0);

        bank.set_use_device_quaternion(true);
        ds.recalculate_orientation(&mut bank);
        assert_abs_diff_eq!(ds.records()[0].orientation.z, 60.0, epsilon = 1e-9);
    }

    #[test]
    fn test_recalculate_is_idempotent() {
        for kind in FilterKind::ALL {
            let mut ds = flight(200);
            let mut bank = FilterBank::new(kind, FilterConfig::default());

            ds.recalculate_orientation(&mut bank);
            let first: Vec<_> = ds.records().iter().map(TelemetryRecord::attitude).collect();

            ds.recalculate_orientation(&mut bank);
            let second: Vec<_> = ds.records().iter().map(TelemetryRecord::attitude).collect();

            assert_eq!(first, second, "recompute differs for {}", kind);
        }
    }

    #[test]
    fn test_scenario_complementary_roll() {
        let mut ds = TelemetryDataset::new();
        ds.add_data_point(&sample(0.0, [0.0, 0.0, 1.0], [0.0; 3]));
        ds.add_data_point(&sample(100.0, [0.0, 0.0, 1.0], [10.0, 0.0, 0.0]));

        let mut bank = FilterBank::default();
        ds.recalculate_orientation(&mut bank);
        assert_abs_diff_eq!(ds.records()[1].orientation.x, 0.98, epsilon = 1e-12);

        let q = ds.records()[1].calculated_quaternion.unwrap();
        assert_abs_diff_eq!(q.to_euler().x, 0.98, epsilon = 1e-9);
    }

    #[test]
    fn test_non_increasing_timestamp_keeps_prior_orientation() {
        let mut ds = TelemetryDataset::new();
        ds.add_data_point(&sample(0.0, [0.0, 0.0, 1.0], [0.0; 3]));
        ds.add_data_point(&sample(100.0, [0.0, 0.0, 1.0], [10.0, 0.0, 0.0]));
        ds.add_data_point(&sample(100.0, [0.0, 1.0, 0.0], [500.0, 500.0, 500.0]));
        ds.add_data_point(&sample(50.0, [1.0, 0.0, 0.0], [500.0, 500.0, 500.0]));

        for kind in FilterKind::ALL {
            let mut bank = FilterBank::new(kind, FilterConfig::default());
            ds.recalculate_orientation(&mut bank);
            let r = ds.records();
            assert_eq!(r[2].orientation, r[1].orientation);
            assert_eq!(r[3].orientation, r[1].orientation);
            assert_eq!(r[3].calculated_quaternion, r[1].calculated_quaternion);
            assert!(r[3].orientation.is_finite());
        }
    }

    #[test]
    fn test_device_quaternion_mirrored_into_calculated() {
        let q = Quat::from_euler(&Orientation::new(20.0, 10.0, -30.0));
        let mut ds = TelemetryDataset::new();
        ds.add_data_point(&sample(0.0, [0.0, 0.0, 1.0], [0.0; 3]));
        ds.add_data_point(&json!({
            "timestamp": 10,
            "accelX": 0, "accelY": 0, "accelZ": 1,
            "quatW": q.w, "quatX": q.x, "quatY": q.y, "quatZ": q.z
        }));
        ds.add_data_point(&sample(20.0, [0.0, 0.0, 1.0], [0.0, 0.0, 100.0]));

        let mut bank = FilterBank::default();
        bank.set_use_device_quaternion(true);
        ds.recalculate_orientation(&mut bank);

        let r = &ds.records()[1];
        assert_abs_diff_eq!(r.orientation.x, 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(r.orientation.z, -30.0, epsilon = 1e-9);
        assert_eq!(r.calculated_quaternion, r.quaternion);

        // record without a device quaternion falls back to the filter
        assert_abs_diff_eq!(ds.records()[2].orientation.z, -30.0 + 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_batch_integrates_recorded_delta_time() {
        let mut ds = TelemetryDataset::new();
        ds.add_data_point(&sample(0.0, [0.0, 0.0, 1.0], [10.0, 0.0, 10.0]));
        ds.add_data_point(&sample(200.0, [0.0, 0.0, 1.0], [10.0, 0.0, 10.0]));

        let mut bank = FilterBank::default();
        ds.recalculate_orientation(&mut bank);
        let r = &ds.records()[1];
        assert_abs_diff_eq!(r.delta_time, 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(r.orientation.x, 1.96, epsilon = 1e-12);
        assert_abs_diff_eq!(r.orientation.z, 2.0, epsilon = 1e-12);

        // the live path still bounds the step
        let mut live = ds.clone();
        live.compute_orientation_at(1, &mut FilterBank::default()).unwrap();
        assert_abs_diff_eq!(live.records()[1].orientation.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_incremental_matches_batch() {
        let source = flight(150);
        for kind in FilterKind::ALL {
            let mut live = TelemetryDataset::new();
            let mut live_bank = FilterBank::new(kind, FilterConfig::default());
            for record in source.records() {
                live.push_record(record.clone());
                let index = live.len() - 1;
                live.compute_orientation_at(index, &mut live_bank).unwrap();
            }

            let mut batch = source.clone();
            let mut batch_bank = FilterBank::new(kind, FilterConfig::default());
            batch.recalculate_orientation(&mut batch_bank);

            for (a, b) in live.records().iter().zip(batch.records()) {
                assert_eq!(a.attitude(), b.attitude(), "{} diverged", kind);
            }
        }
    }

    #[test]
    fn test_statistics() {
        let mut ds = TelemetryDataset::new();
        ds.add_data_point(&json!({"timestamp": 1000, "accelX": 1, "accelY": 0, "accelZ": 0, "altitude": 10}));
        ds.add_data_point(&json!({"timestamp": 2000, "accelX": 3, "accelY": 0, "accelZ": 0, "altitude": 30}));
        ds.add_data_point(&json!({"timestamp": 3500, "accelX": -1, "accelY": 0, "accelZ": 0, "altitude": 20}));

        let stats = ds.statistics();
        assert_eq!(stats.count, 3);
        assert_abs_diff_eq!(stats.duration, 2.5, epsilon = 1e-12);
        assert_eq!(stats.acceleration.x.min, -1.0);
        assert_eq!(stats.acceleration.x.max, 3.0);
        assert_abs_diff_eq!(stats.acceleration.x.avg, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.altitude.avg, 20.0, epsilon = 1e-12);
        assert_eq!(stats.altitude.max, 30.0);
        assert!(!stats.has_quaternions);
        assert!(stats.sampling_rates.is_some());
    }

    #[test]
    fn test_empty_dataset_operations() {
        let mut ds = TelemetryDataset::new();
        let mut bank = FilterBank::default();
        ds.recalculate_orientation(&mut bank);

        let stats = ds.statistics();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.duration, 0.0);
        assert!(stats.sampling_rates.is_none());
        assert!(ds.current_record().is_none());
        assert_eq!(ds.data_series(SeriesKind::Accel, Axis::X).count(), 0);
        assert_eq!(ds.data_range(0, 0).unwrap().len(), 0);
        assert_eq!(ds.load_from_records(&[]), 0);
    }

    #[test]
    fn test_cursor_and_range_bounds() {
        let mut ds = flight(5);
        let last_ts = ds.records()[4].timestamp;
        assert_eq!(ds.set_cursor(4).unwrap().timestamp, last_ts);
        assert_eq!(ds.cursor(), 4);

        assert!(matches!(
            ds.set_cursor(5),
            Err(TelemetryError::IndexOutOfRange { index: 5, len: 5 })
        ));
        assert_eq!(ds.cursor(), 4);

        assert_eq!(ds.data_range(1, 3).unwrap().len(), 2);
        assert!(matches!(ds.data_range(3, 1), Err(TelemetryError::InvalidRange { .. })));
        assert!(matches!(ds.data_range(0, 6), Err(TelemetryError::InvalidRange { .. })));

        let mut bank = FilterBank::default();
        assert!(ds.compute_orientation_at(9, &mut bank).is_err());
    }

    #[test]
    fn test_data_series_and_filter() {
        let mut ds = TelemetryDataset::new();
        ds.add_data_point(&json!({"timestamp": 0, "gyroX": 1, "gyroY": 2, "gyroZ": 3, "altitude": 5}));
        ds.add_data_point(&json!({"timestamp": 10, "gyroX": 4, "gyroY": 5, "gyroZ": 6, "altitude": 7}));

        let gyro_y: Vec<_> = ds.data_series(SeriesKind::Gyro, Axis::Y).collect();
        assert_eq!(gyro_y, vec![SeriesPoint { x: 0.0, y: 2.0 }, SeriesPoint { x: 10.0, y: 5.0 }]);

        // restartable
        let again: Vec<_> = ds.data_series(SeriesKind::Gyro, Axis::Y).collect();
        assert_eq!(gyro_y, again);

        let altitude: Vec<_> = ds.data_series(SeriesKind::Altitude, Axis::Z).map(|p| p.y).collect();
        assert_eq!(altitude, vec![5.0, 7.0]);

        assert_eq!(ds.filter(|r| r.sensors.altitude > 6.0).len(), 1);

        assert_eq!("Orientation".parse::<SeriesKind>().unwrap(), SeriesKind::Orientation);
        assert!("pressure".parse::<SeriesKind>().is_err());
        assert_eq!("2".parse::<Axis>().unwrap(), Axis::Z);
        assert!("w".parse::<Axis>().is_err());
    }

    #[test]
    fn test_reset_and_reload() {
        let mut ds = flight(10);
        ds.set_cursor(3).unwrap();
        ds.reset();
        assert!(ds.is_empty());
        assert_eq!(ds.cursor(), 0);
        assert_eq!(ds.metadata(), &DatasetMetadata::default());

        let raw = vec![sample(5.0, [0.0, 0.0, 1.0], [0.0; 3]), sample(15.0, [0.0, 0.0, 1.0], [0.0; 3])];
        assert_eq!(ds.load_from_records(&raw), 2);
        assert_eq!(ds.metadata().start_time, Some(5.0));
        assert_abs_diff_eq!(ds.records()[1].delta_time, 0.01, epsilon = 1e-12);
    }
}
