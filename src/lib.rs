//! Orientation estimation for rocket flight telemetry.
//!
//! Raw samples go through the [`normalizer`] into a [`dataset::TelemetryDataset`];
//! the [`filters::FilterBank`] turns accelerometer and gyro readings (or a
//! device quaternion) into roll/pitch/yaw and a unit quaternion per record.
//! [`pipeline::TelemetryPipeline`] drives both the live and the batch path.

pub mod dataset;
pub mod error;
pub mod filters;
pub mod live_status;
pub mod normalizer;
pub mod pipeline;
pub mod types;

pub use dataset::TelemetryDataset;
pub use error::{Result, TelemetryError};
pub use filters::{FilterBank, FilterConfig, FilterKind, FilterParamPatch};
pub use pipeline::{PipelineConfig, TelemetryPipeline};
pub use types::{Attitude, Orientation, Quat, TelemetryRecord};
