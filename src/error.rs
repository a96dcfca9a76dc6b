use thiserror::Error;

/// Errors surfaced to callers of the telemetry core.
///
/// Malformed telemetry never ends up here: the normalizer and the filters
/// recover locally with documented defaults. Only caller misuse and I/O-level
/// failures are reported.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Unknown filter kind: {0}")]
    UnknownFilterKind(String),

    #[error("Unknown series kind: {0}")]
    UnknownSeriesKind(String),

    #[error("Unknown axis: {0}")]
    UnknownAxis(String),

    #[error("Index {index} out of range for dataset of {len} records")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid range {start}..{end} for dataset of {len} records")]
    InvalidRange { start: usize, end: usize, len: usize },

    #[error("Invalid filter parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;
