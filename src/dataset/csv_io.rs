//! Flat CSV export/import for [`TelemetryDataset`].
//!
//! Absent quaternions are written as empty cells, never `0`. Import runs every
//! row through the normalizer, so older exports with dotted headers
//! (`accel.x`, `quaternion.qW`, ...) load as well.

use std::io::{Read, Write};

use csv::{ReaderBuilder, Trim, Writer};
use serde_json::{Map, Value};

use super::TelemetryDataset;
use crate::error::Result;
use crate::types::{Quat, TelemetryRecord};

pub const CSV_COLUMNS: [&str; 23] = [
    "timestamp",
    "deltaTime",
    "accelX",
    "accelY",
    "accelZ",
    "gyroX",
    "gyroY",
    "gyroZ",
    "orientationX",
    "orientationY",
    "orientationZ",
    "quatW",
    "quatX",
    "quatY",
    "quatZ",
    "calcQuatW",
    "calcQuatX",
    "calcQuatY",
    "calcQuatZ",
    "altitude",
    "temperature",
    "battery_voltage",
    "rocketState",
];

fn quat_cells(q: Option<Quat>) -> [String; 4] {
    match q {
        Some(q) => [q.w.to_string(), q.x.to_string(), q.y.to_string(), q.z.to_string()],
        None => Default::default(),
    }
}

fn csv_row(r: &TelemetryRecord) -> Vec<String> {
    let mut row = vec![
        r.timestamp.to_string(),
        r.delta_time.to_string(),
        r.sensors.accel.x.to_string(),
        r.sensors.accel.y.to_string(),
        r.sensors.accel.z.to_string(),
        r.sensors.gyro.x.to_string(),
        r.sensors.gyro.y.to_string(),
        r.sensors.gyro.z.to_string(),
        r.orientation.x.to_string(),
        r.orientation.y.to_string(),
        r.orientation.z.to_string(),
    ];
    row.extend(quat_cells(r.quaternion));
    row.extend(quat_cells(r.calculated_quaternion));
    row.extend([
        r.sensors.altitude.to_string(),
        r.sensors.temperature.to_string(),
        r.system.battery_voltage.to_string(),
        r.system.rocket_state.clone(),
    ]);
    row
}

impl TelemetryDataset {
    /// Whole dataset as CSV text; an empty dataset exports as an empty string.
    pub fn export_to_csv(&self) -> Result<String> {
        if self.is_empty() {
            return Ok(String::new());
        }
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = Writer::from_writer(writer);
        wtr.write_record(CSV_COLUMNS)?;
        for record in self.records() {
            wtr.write_record(csv_row(record))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Replace the contents with the rows of `text`. Input without data rows
    /// leaves the dataset untouched and returns 0.
    pub fn load_from_csv(&mut self, text: &str) -> Result<usize> {
        self.read_csv(text.as_bytes())
    }

    pub fn read_csv<R: Read>(&mut self, reader: R) -> Result<usize> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            let row: Map<String, Value> = headers
                .iter()
                .zip(record.iter())
                .map(|(key, cell)| {
                    let value = if cell.is_empty() {
                        Value::Null
                    } else {
                        Value::String(cell.to_string())
                    };
                    (key.to_string(), value)
                })
                .collect();
            rows.push(Value::Object(row));
        }

        log::debug!("parsed {} CSV rows with {} columns", rows.len(), headers.len());
        Ok(self.load_from_records(&rows))
    }
}
