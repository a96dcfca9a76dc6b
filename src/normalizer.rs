//! Format Normalizer: maps heterogeneous raw telemetry shapes onto
//! [`TelemetryRecord`].
//!
//! Accepted inputs are the live-stream JSON (`{timestamp, accel:{..}, gyro:{..},
//! quat:{..}}`), the canonical shape itself, and the flat column layouts of the
//! various CSV exports. Every field group is resolved first-match-wins; anything
//! missing or unparsable takes the documented default. Nothing here fails.

use serde_json::{Map, Value};

use crate::types::{
    Axes, Orientation, Quat, Simulation, TelemetryRecord, DEFAULT_BATTERY_VOLTAGE,
    DEFAULT_ROCKET_STATE, DEFAULT_TEMPERATURE_C,
};

const ADC_FULL_SCALE: f64 = 1023.0;
const ADC_REFERENCE_VOLTS: f64 = 5.0;

const ACCEL_COLUMNS: [[&str; 3]; 3] = [
    ["accelX", "accelY", "accelZ"],
    ["AccelX_telemetria", "AccelY_telemetria", "AccelZ_telemetria"],
    ["accel.x", "accel.y", "accel.z"],
];
const GYRO_COLUMNS: [[&str; 3]; 3] = [
    ["gyroX", "gyroY", "gyroZ"],
    ["GyroX_telemetria", "GyroY_telemetria", "GyroZ_telemetria"],
    ["gyro.x", "gyro.y", "gyro.z"],
];
const ORIENTATION_COLUMNS: [[&str; 3]; 2] = [
    ["orientationX", "orientationY", "orientationZ"],
    ["orientation.x", "orientation.y", "orientation.z"],
];
const QUAT_COLUMNS: [[&str; 4]; 2] = [
    ["quatW", "quatX", "quatY", "quatZ"],
    ["quaternion.qW", "quaternion.qX", "quaternion.qY", "quaternion.qZ"],
];
const CALC_QUAT_COLUMNS: [[&str; 4]; 2] = [
    ["calcQuatW", "calcQuatX", "calcQuatY", "calcQuatZ"],
    [
        "calculatedQuaternion.qW",
        "calculatedQuaternion.qX",
        "calculatedQuaternion.qY",
        "calculatedQuaternion.qZ",
    ],
];

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64
}

/// Normalize `raw`, stamping records without a usable timestamp with the
/// current time.
pub fn normalize(raw: &Value) -> TelemetryRecord {
    normalize_with_fallback(raw, now_millis())
}

/// Normalize `raw`, using `fallback_ms` when no usable timestamp is present.
pub fn normalize_with_fallback(raw: &Value, fallback_ms: f64) -> TelemetryRecord {
    let Value::Object(obj) = raw else {
        log::warn!("telemetry record is not an object, using defaults");
        return default_record(fallback_ms);
    };

    if is_canonical(obj) {
        match serde_json::from_value::<TelemetryRecord>(raw.clone()) {
            Ok(record) => return sanitize_canonical(record),
            Err(e) => log::debug!("canonical-looking record did not deserialize ({}), mapping fields", e),
        }
    }

    map_fields(obj, fallback_ms)
}

/// Numeric coercion shared by every field: native numbers, and numeric strings
/// with `.` or `,` as decimal separator. Non-finite results are rejected.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replacen(',', ".", 1).parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

// ─── Canonical shape ─────────────────────────────────────────────────────────

fn is_canonical(obj: &Map<String, Value>) -> bool {
    matches!(obj.get("timestamp"), Some(Value::Number(_)))
        && obj.get("sensors").is_some_and(Value::is_object)
        && obj.get("system").is_some_and(Value::is_object)
}

fn sanitize_canonical(mut record: TelemetryRecord) -> TelemetryRecord {
    record.quaternion = record.quaternion.and_then(|q| accept_quaternion(q, "quaternion"));
    record.calculated_quaternion = record
        .calculated_quaternion
        .and_then(|q| accept_quaternion(q, "calculatedQuaternion"));
    record.orientation = record.orientation.normalized();
    record
}

// ─── Field mapping ───────────────────────────────────────────────────────────

fn default_record(timestamp: f64) -> TelemetryRecord {
    let mut record = TelemetryRecord {
        timestamp,
        ..Default::default()
    };
    record.system.millis = timestamp;
    record
}

fn map_fields(obj: &Map<String, Value>, fallback_ms: f64) -> TelemetryRecord {
    let sensors = obj.get("sensors").and_then(Value::as_object);
    let system = obj.get("system").and_then(Value::as_object);

    let timestamp = if let Some(v) = present(obj, "timestamp") {
        number_or(Some(v), fallback_ms, "timestamp")
    } else if let Some(v) = present(obj, "Tempo") {
        coerce_f64(v).map(|secs| secs * 1000.0).unwrap_or_else(|| {
            log::warn!("unparsable Tempo value {}, using fallback timestamp", v);
            fallback_ms
        })
    } else if let Some(v) = present(obj, "millis") {
        number_or(Some(v), fallback_ms, "millis")
    } else {
        fallback_ms
    };

    let mut record = default_record(timestamp);

    record.sensors.accel = resolve_axes(obj, sensors, "accel", &ACCEL_COLUMNS);
    record.sensors.gyro = resolve_axes(obj, sensors, "gyro", &GYRO_COLUMNS);

    record.sensors.altitude = first_number(
        &[present(obj, "altitude"), present(obj, "Altezza_telemetria"), nested(sensors, "altitude")],
        0.0,
        "altitude",
    );
    record.sensors.temperature = first_number(
        &[present(obj, "temperature"), nested(sensors, "temperature")],
        DEFAULT_TEMPERATURE_C,
        "temperature",
    );

    record.system.battery_voltage = if let Some(v) = present(obj, "battery_voltage") {
        number_or(Some(v), DEFAULT_BATTERY_VOLTAGE, "battery_voltage")
    } else if let Some(v) = present(obj, "battery") {
        number_or(Some(v), DEFAULT_BATTERY_VOLTAGE, "battery")
    } else if let Some(v) = present(obj, "analogValue") {
        coerce_f64(v)
            .map(|raw| raw / ADC_FULL_SCALE * ADC_REFERENCE_VOLTS)
            .unwrap_or_else(|| {
                log::warn!("unparsable analogValue {}, using {}", v, DEFAULT_BATTERY_VOLTAGE);
                DEFAULT_BATTERY_VOLTAGE
            })
    } else {
        number_or(nested(system, "battery_voltage"), DEFAULT_BATTERY_VOLTAGE, "battery_voltage")
    };

    record.system.rocket_state = [present(obj, "state"), present(obj, "rocketState"), nested(system, "rocketState")]
        .into_iter()
        .flatten()
        .find_map(stringify)
        .unwrap_or_else(|| DEFAULT_ROCKET_STATE.to_string());

    record.system.millis = first_number(&[present(obj, "millis"), nested(system, "millis")], timestamp, "millis");
    record.system.free_heap = system_extra(obj, system, "free_heap", 0.0);
    record.system.free_space = system_extra(obj, system, "free_space", 0.0);
    record.system.total_space = system_extra(obj, system, "total_space", 1.0);
    record.system.wifi_strength = system_extra(obj, system, "wifi_strength", 0.0);

    record.simulation = resolve_simulation(obj);
    record.orientation = resolve_orientation(obj);
    record.quaternion = resolve_quaternion(obj, &["quat", "quaternion"], &QUAT_COLUMNS, "quaternion");
    record.calculated_quaternion = resolve_quaternion(
        obj,
        &["calculatedQuaternion"],
        &CALC_QUAT_COLUMNS,
        "calculatedQuaternion",
    );

    record
}

fn present<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| !v.is_null())
}

fn nested<'a>(map: Option<&'a Map<String, Value>>, key: &str) -> Option<&'a Value> {
    map.and_then(|m| present(m, key))
}

fn number_or(value: Option<&Value>, default: f64, field: &str) -> f64 {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return default;
    };
    coerce_f64(value).unwrap_or_else(|| {
        log::warn!("unparsable {} value {}, using {}", field, value, default);
        default
    })
}

/// First candidate that is present wins, even when it then fails to parse.
fn first_number(candidates: &[Option<&Value>], default: f64, field: &str) -> f64 {
    number_or(candidates.iter().copied().flatten().next(), default, field)
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn system_extra(obj: &Map<String, Value>, system: Option<&Map<String, Value>>, key: &str, default: f64) -> f64 {
    first_number(&[present(obj, key), nested(system, key)], default, key)
}

fn axes_from(map: &Map<String, Value>, keys: [&str; 3], field: &str) -> Axes {
    Axes::new(
        number_or(map.get(keys[0]), 0.0, field),
        number_or(map.get(keys[1]), 0.0, field),
        number_or(map.get(keys[2]), 0.0, field),
    )
}

fn resolve_axes(
    obj: &Map<String, Value>,
    sensors: Option<&Map<String, Value>>,
    group: &str,
    columns: &[[&str; 3]],
) -> Axes {
    let inner = obj
        .get(group)
        .and_then(Value::as_object)
        .or_else(|| sensors.and_then(|s| s.get(group)).and_then(Value::as_object));
    if let Some(inner) = inner {
        return axes_from(inner, ["x", "y", "z"], group);
    }
    columns
        .iter()
        .find(|keys| obj.contains_key(keys[0]))
        .map(|keys| axes_from(obj, *keys, group))
        .unwrap_or_default()
}

fn resolve_orientation(obj: &Map<String, Value>) -> Orientation {
    let axes = if let Some(inner) = obj.get("orientation").and_then(Value::as_object) {
        axes_from(inner, ["x", "y", "z"], "orientation")
    } else {
        ORIENTATION_COLUMNS
            .iter()
            .find(|keys| obj.contains_key(keys[0]))
            .map(|keys| axes_from(obj, *keys, "orientation"))
            .unwrap_or_default()
    };
    Orientation::new(axes.x, axes.y, axes.z).normalized()
}

fn resolve_simulation(obj: &Map<String, Value>) -> Simulation {
    let inner = obj.get("simulation").and_then(Value::as_object);
    Simulation {
        altitude: first_number(
            &[present(obj, "Altezza_simulazione"), nested(inner, "altitude")],
            0.0,
            "simulation altitude",
        ),
        velocity: first_number(
            &[present(obj, "Velocita_totale_simulazione"), nested(inner, "velocity")],
            0.0,
            "simulation velocity",
        ),
    }
}

/// All four components must parse; anything less is an absent quaternion.
fn quaternion_from(map: &Map<String, Value>, keys: [&str; 4]) -> Option<Quat> {
    let mut parts = [0.0; 4];
    for (slot, key) in parts.iter_mut().zip(keys) {
        *slot = map.get(key).and_then(coerce_f64)?;
    }
    Some(Quat::new(parts[0], parts[1], parts[2], parts[3]))
}

fn resolve_quaternion(
    obj: &Map<String, Value>,
    nested_keys: &[&str],
    columns: &[[&str; 4]],
    field: &str,
) -> Option<Quat> {
    for key in nested_keys {
        if let Some(inner) = obj.get(*key).and_then(Value::as_object) {
            let q = quaternion_from(inner, ["qW", "qX", "qY", "qZ"])
                .or_else(|| quaternion_from(inner, ["w", "x", "y", "z"]));
            return q.and_then(|q| accept_quaternion(q, field));
        }
    }
    let keys = columns.iter().find(|keys| obj.contains_key(keys[0]))?;
    quaternion_from(obj, *keys).and_then(|q| accept_quaternion(q, field))
}

fn accept_quaternion(q: Quat, field: &str) -> Option<Quat> {
    let unit = q.normalized();
    if unit.is_none() {
        log::warn!("discarding degenerate {} {:?}", field, q);
    }
    unit
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    #[test]
    fn test_coerce_numbers_and_strings() {
        assert_eq!(coerce_f64(&json!(1.5)), Some(1.5));
        assert_eq!(coerce_f64(&json!("2.25")), Some(2.25));
        assert_eq!(coerce_f64(&json!("3,5")), Some(3.5));
        assert_eq!(coerce_f64(&json!(" -0,125 ")), Some(-0.125));
        assert_eq!(coerce_f64(&json!("abc")), None);
        assert_eq!(coerce_f64(&json!("NaN")), None);
        assert_eq!(coerce_f64(&json!(true)), None);
        assert_eq!(coerce_f64(&Value::Null), None);
    }

    #[test]
    fn test_live_stream_shape() {
        let raw = json!({
            "timestamp": 1500,
            "accel": {"x": 0.1, "y": -0.2, "z": 0.98},
            "gyro": {"x": 1.0, "y": 2.0, "z": 3.0},
            "quat": {"qW": 0.0, "qX": 0.0, "qY": 0.0, "qZ": 2.0},
            "altitude": 120.5,
            "temperature": 18.0,
            "battery_voltage": 3.9,
            "state": "ASCENT"
        });
        let record = normalize_with_fallback(&raw, 0.0);

        assert_eq!(record.timestamp, 1500.0);
        assert_eq!(record.system.millis, 1500.0);
        assert_eq!(record.sensors.accel, Axes::new(0.1, -0.2, 0.98));
        assert_eq!(record.sensors.gyro, Axes::new(1.0, 2.0, 3.0));
        assert_eq!(record.sensors.altitude, 120.5);
        assert_eq!(record.sensors.temperature, 18.0);
        assert_eq!(record.system.battery_voltage, 3.9);
        assert_eq!(record.system.rocket_state, "ASCENT");
        // renormalized on ingestion
        assert_eq!(record.quaternion, Some(Quat::new(0.0, 0.0, 0.0, 1.0)));
        assert!(record.calculated_quaternion.is_none());
    }

    #[test]
    fn test_flat_csv_columns_with_comma_decimals() {
        let raw = json!({
            "timestamp": "2000",
            "accelX": "0,5", "accelY": "0", "accelZ": "1,0",
            "gyroX": "10", "gyroY": "", "gyroZ": "-5",
            "quatW": "1", "quatX": "0", "quatY": "0", "quatZ": "0",
            "analogValue": "1023",
            "rocketState": 3
        });
        let record = normalize_with_fallback(&raw, 0.0);

        assert_eq!(record.timestamp, 2000.0);
        assert_eq!(record.sensors.accel, Axes::new(0.5, 0.0, 1.0));
        // empty string falls back to 0
        assert_eq!(record.sensors.gyro, Axes::new(10.0, 0.0, -5.0));
        assert_abs_diff_eq!(record.system.battery_voltage, 5.0, epsilon = 1e-12);
        assert_eq!(record.system.rocket_state, "3");
        assert_eq!(record.quaternion, Some(Quat::IDENTITY));
    }

    #[test]
    fn test_legacy_italian_columns() {
        let raw = json!({
            "Tempo": "1,5",
            "AccelX_telemetria": 0.0, "AccelY_telemetria": 0.0, "AccelZ_telemetria": 1.0,
            "GyroX_telemetria": 4.0, "GyroY_telemetria": 5.0, "GyroZ_telemetria": 6.0,
            "Altezza_telemetria": "300,25",
            "Altezza_simulazione": 310.0,
            "Velocita_totale_simulazione": "45"
        });
        let record = normalize_with_fallback(&raw, 0.0);

        assert_eq!(record.timestamp, 1500.0);
        assert_eq!(record.sensors.accel.z, 1.0);
        assert_eq!(record.sensors.gyro, Axes::new(4.0, 5.0, 6.0));
        assert_eq!(record.sensors.altitude, 300.25);
        assert_eq!(record.simulation.altitude, 310.0);
        assert_eq!(record.simulation.velocity, 45.0);
        assert_eq!(record.sensors.temperature, DEFAULT_TEMPERATURE_C);
        assert_eq!(record.system.battery_voltage, DEFAULT_BATTERY_VOLTAGE);
        assert_eq!(record.system.rocket_state, DEFAULT_ROCKET_STATE);
    }

    #[test]
    fn test_dotted_export_columns() {
        let raw = json!({
            "timestamp": 10,
            "accel.x": "1", "accel.y": "2", "accel.z": "3",
            "gyro.x": "4", "gyro.y": "5", "gyro.z": "6",
            "orientation.x": "190", "orientation.y": "0", "orientation.z": "-45",
            "quaternion.qW": "", "quaternion.qX": "", "quaternion.qY": "", "quaternion.qZ": "",
            "calculatedQuaternion.qW": "1", "calculatedQuaternion.qX": "0",
            "calculatedQuaternion.qY": "0", "calculatedQuaternion.qZ": "0"
        });
        let record = normalize_with_fallback(&raw, 0.0);

        assert_eq!(record.sensors.accel, Axes::new(1.0, 2.0, 3.0));
        assert_eq!(record.sensors.gyro, Axes::new(4.0, 5.0, 6.0));
        assert_abs_diff_eq!(record.orientation.x, -170.0, epsilon = 1e-12);
        assert_eq!(record.orientation.z, -45.0);
        assert!(record.quaternion.is_none());
        assert_eq!(record.calculated_quaternion, Some(Quat::IDENTITY));
    }

    #[test]
    fn test_incomplete_quaternion_is_absent() {
        let raw = json!({
            "timestamp": 1,
            "quatW": "1", "quatX": "0", "quatY": "oops", "quatZ": "0"
        });
        assert!(normalize_with_fallback(&raw, 0.0).quaternion.is_none());

        let nested = json!({"timestamp": 1, "quat": {"qW": 1.0, "qX": 0.0, "qY": 0.0}});
        assert!(normalize_with_fallback(&nested, 0.0).quaternion.is_none());

        let zero = json!({"timestamp": 1, "quat": {"w": 0, "x": 0, "y": 0, "z": 0}});
        assert!(normalize_with_fallback(&zero, 0.0).quaternion.is_none());
    }

    #[test]
    fn test_nested_quaternion_with_short_names() {
        let raw = json!({"timestamp": 1, "quaternion": {"w": 0.5, "x": 0.5, "y": 0.5, "z": 0.5}});
        let q = normalize_with_fallback(&raw, 0.0).quaternion.unwrap();
        assert_abs_diff_eq!(q.norm_squared(), 1.0, epsilon = 1e-12);
        assert_eq!(q.w, 0.5);
    }

    #[test]
    fn test_canonical_record_passes_through() {
        let mut original = TelemetryRecord {
            timestamp: 4200.0,
            delta_time: 0.02,
            quaternion: Some(Quat::new(0.0, 1.0, 0.0, 0.0)),
            ..Default::default()
        };
        original.sensors.accel = Axes::new(0.0, 0.0, 1.0);
        original.system.rocket_state = "APOGEE".to_string();
        original.system.free_heap = 12345.0;

        let raw = serde_json::to_value(&original).unwrap();
        let record = normalize_with_fallback(&raw, 0.0);
        assert_eq!(record, original);
    }

    #[test]
    fn test_canonical_with_string_values_is_mapped() {
        let raw = json!({
            "timestamp": 100,
            "sensors": {"accel": {"x": "0,5", "y": 0, "z": 1}, "gyro": {"x": 1, "y": 2, "z": 3},
                        "altitude": "12", "temperature": 25},
            "system": {"battery_voltage": 3.7, "rocketState": "IDLE", "free_heap": 9}
        });
        let record = normalize_with_fallback(&raw, 0.0);
        assert_eq!(record.sensors.accel, Axes::new(0.5, 0.0, 1.0));
        assert_eq!(record.sensors.gyro, Axes::new(1.0, 2.0, 3.0));
        assert_eq!(record.sensors.altitude, 12.0);
        assert_eq!(record.sensors.temperature, 25.0);
        assert_eq!(record.system.battery_voltage, 3.7);
        assert_eq!(record.system.rocket_state, "IDLE");
        assert_eq!(record.system.free_heap, 9.0);
        assert_eq!(record.system.total_space, 1.0);
    }

    #[test]
    fn test_unrecognized_input_gets_defaults() {
        let record = normalize_with_fallback(&json!({"foo": "bar"}), 777.0);
        assert_eq!(record.timestamp, 777.0);
        assert_eq!(record.system.millis, 777.0);
        assert_eq!(record.sensors.accel, Axes::default());
        assert_eq!(record.sensors.temperature, 20.0);
        assert_eq!(record.system.battery_voltage, 4.2);
        assert_eq!(record.system.rocket_state, "Unknown");
        assert!(record.quaternion.is_none());

        let record = normalize_with_fallback(&json!([1, 2, 3]), 5.0);
        assert_eq!(record.timestamp, 5.0);

        let record = normalize_with_fallback(&json!({"timestamp": "soon", "temperature": "warm"}), 9.0);
        assert_eq!(record.timestamp, 9.0);
        assert_eq!(record.sensors.temperature, 20.0);
    }

    #[test]
    fn test_missing_timestamp_uses_wall_clock() {
        let before = now_millis();
        let record = normalize(&json!({"accelX": 1}));
        assert!(record.timestamp >= before);
        assert_eq!(record.sensors.accel.x, 1.0);
    }
}
