// In: src/config.rs

//! The single source of truth for ingestion configuration.
//!
//! `IngestConfig` is created once at the application boundary (from JSON or in
//! code) and passed down read-only. It carries the slicing policy, the float
//! sparsification toggle and the dynamic-bucketing flag recorded in descriptors.
//! String encoding is not configured here: it is part of each column's declared
//! type (ASCII vs UTF-8, fixed vs dynamic width).

use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// The unified configuration for ingesting one frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct IngestConfig {
    /// **The target number of rows per physical slice.**
    #[serde(default = "default_rows_per_segment")]
    pub rows_per_segment: usize,

    /// The maximum number of columns stored together in one slice.
    #[serde(default = "default_columns_per_segment")]
    pub columns_per_segment: usize,

    /// If true, floating point columns are written sparsely: NaN rows are
    /// dropped and recorded as absent in a presence bitmap.
    #[serde(default)]
    pub sparsify_floats: bool,

    /// Recorded in the frame descriptor; tells readers that columns may be
    /// bucketed dynamically rather than laid out from a fixed schema.
    #[serde(default)]
    pub bucketize_dynamic: bool,

    /// If true, slices are produced concurrently on the rayon pool.
    #[serde(default = "default_true")]
    pub parallel_slices: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            rows_per_segment: default_rows_per_segment(),
            columns_per_segment: default_columns_per_segment(),
            sparsify_floats: false,
            bucketize_dynamic: false,
            parallel_slices: true,
        }
    }
}

impl IngestConfig {
    /// Parses a config from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, IngestError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.rows_per_segment == 0 || self.columns_per_segment == 0 {
            return Err(IngestError::InvalidConfig(format!(
                "Slicing policy needs at least one row and one column per segment, got {} x {}",
                self.rows_per_segment, self.columns_per_segment
            )));
        }
        Ok(())
    }
}

/// Helper for `serde` to default a boolean field to true.
fn default_true() -> bool {
    true
}

fn default_rows_per_segment() -> usize {
    100_000
}

fn default_columns_per_segment() -> usize {
    127
}
