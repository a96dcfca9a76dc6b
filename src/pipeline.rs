//! Live and batch drivers over one dataset and one filter bank.
//!
//! The two disciplines share the same store: [`TelemetryPipeline::ingest`]
//! appends and estimates one record with the persistent filter state, while
//! [`TelemetryPipeline::recalculate`] re-runs the whole sequence from scratch.
//! The caller is the single writer; nothing here is shared across threads.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dataset::{DatasetStatistics, TelemetryDataset};
use crate::error::{Result, TelemetryError};
use crate::filters::{FilterBank, FilterConfig, FilterKind, FilterParamPatch};
use crate::types::TelemetryRecord;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub filter_kind: FilterKind,
    pub use_device_quaternion: bool,
    pub filter_enabled: bool,
    pub filters: FilterConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            filter_kind: FilterKind::Complementary,
            use_device_quaternion: false,
            filter_enabled: true,
            filters: FilterConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate the filter parameters.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.filters.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[derive(Clone, Debug, Default)]
pub struct TelemetryPipeline {
    dataset: TelemetryDataset,
    bank: FilterBank,
}

impl TelemetryPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let mut bank = FilterBank::new(config.filter_kind, config.filters);
        bank.set_use_device_quaternion(config.use_device_quaternion);
        bank.set_enabled(config.filter_enabled);
        Self {
            dataset: TelemetryDataset::new(),
            bank,
        }
    }

    pub fn dataset(&self) -> &TelemetryDataset {
        &self.dataset
    }

    /// Cursor and other playback state live on the dataset.
    pub fn dataset_mut(&mut self) -> &mut TelemetryDataset {
        &mut self.dataset
    }

    pub fn bank(&self) -> &FilterBank {
        &self.bank
    }

    pub fn statistics(&self) -> DatasetStatistics {
        self.dataset.statistics()
    }

    // ─── Drivers ─────────────────────────────────────────────────────────────

    /// Live path: normalize, append, estimate the new record.
    pub fn ingest(&mut self, raw: &Value) -> Result<&TelemetryRecord> {
        self.dataset.add_data_point(raw);
        self.estimate_last()
    }

    /// Live path for records that are already canonical.
    pub fn ingest_record(&mut self, record: TelemetryRecord) -> Result<&TelemetryRecord> {
        self.dataset.push_record(record);
        self.estimate_last()
    }

    fn estimate_last(&mut self) -> Result<&TelemetryRecord> {
        let index = self.dataset.len().saturating_sub(1);
        self.dataset.compute_orientation_at(index, &mut self.bank)?;
        self.dataset.get(index).ok_or(TelemetryError::IndexOutOfRange {
            index,
            len: self.dataset.len(),
        })
    }

    /// Batch path: recompute every stored record.
    pub fn recalculate(&mut self) {
        self.dataset.recalculate_orientation(&mut self.bank);
    }

    /// Replace the dataset with `raw` records and recompute. Returns the number
    /// of records loaded; empty input changes nothing.
    pub fn load_records(&mut self, raw: &[Value]) -> usize {
        let loaded = self.dataset.load_from_records(raw);
        if loaded > 0 {
            self.recalculate();
        }
        loaded
    }

    pub fn load_csv(&mut self, text: &str) -> Result<usize> {
        let loaded = self.dataset.load_from_csv(text)?;
        if loaded > 0 {
            self.recalculate();
        }
        Ok(loaded)
    }

    pub fn export_csv(&self) -> Result<String> {
        self.dataset.export_to_csv()
    }

    // ─── Control surface ─────────────────────────────────────────────────────

    /// Switch algorithm; resets the Madgwick state and recomputes the dataset.
    pub fn set_filter_kind(&mut self, kind: FilterKind) {
        self.bank.set_kind(kind);
        self.recalculate();
    }

    /// Parse and switch. An unknown name is an error and the current kind stays.
    pub fn set_filter_kind_by_name(&mut self, name: &str) -> Result<()> {
        let kind = name.parse::<FilterKind>()?;
        self.set_filter_kind(kind);
        Ok(())
    }

    /// Toggle device-quaternion passthrough and recompute the dataset.
    pub fn set_use_device_quaternion(&mut self, enabled: bool) {
        self.bank.set_use_device_quaternion(enabled);
        self.recalculate();
    }

    /// Takes effect for subsequent estimates; call [`Self::recalculate`] to
    /// apply it to stored records.
    pub fn set_filter_enabled(&mut self, enabled: bool) {
        self.bank.set_enabled(enabled);
    }

    pub fn configure_filter(&mut self, kind: FilterKind, patch: &FilterParamPatch) -> Result<()> {
        self.bank.configure(kind, patch)
    }

    /// Clear records and restore the Madgwick state. Settings are kept.
    pub fn reset(&mut self) {
        self.dataset.reset();
        self.bank.reset();
    }
}
