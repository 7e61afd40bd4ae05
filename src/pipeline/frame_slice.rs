//! Row and column ranges describing how one logical frame decomposes into
//! physical slices, and the storage keys those slices are persisted under.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::column_store::{Segment, StringPool};

//==================================================================================
// 1. Ranges
//==================================================================================

/// A half-open range `[start, end)` of frame rows.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "row range [{}, {}) is inverted", start, end);
        Self { start, end }
    }

    /// Number of rows covered.
    pub fn diff(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn contains(&self, row: usize) -> bool {
        (self.start..self.end).contains(&row)
    }
}

impl fmt::Display for RowRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A half-open range `[start, end)` of column positions in the stream descriptor.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ColRange {
    pub start: usize,
    pub end: usize,
}

impl ColRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "column range [{}, {}) is inverted", start, end);
        Self { start, end }
    }

    pub fn diff(&self) -> usize {
        self.end.saturating_sub(self.start)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FrameSlice {
    pub col_range: ColRange,
    pub row_range: RowRange,
}

impl FrameSlice {
    pub fn new(col_range: ColRange, row_range: RowRange) -> Self {
        Self {
            col_range,
            row_range,
        }
    }

    pub fn rows(&self) -> usize {
        self.row_range.diff()
    }

    pub fn columns(&self) -> usize {
        self.col_range.diff()
    }
}

//==================================================================================
// 2. Storage Keys
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    TableData,
    TableIndex,
    Version,
}

/// An immutable storage key, as issued by the version catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct AtomKey {
    pub stream_id: String,
    pub key_type: KeyType,
    pub version_id: u64,
    /// Nanoseconds since the Unix epoch.
    pub creation_ts: i64,
    pub content_hash: u64,
    pub start_index: i64,
    pub end_index: i64,
}

impl AtomKey {
    pub fn created_at(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.creation_ts)
    }
}

impl fmt::Display for AtomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}:{}:v{}:{:#x}@{}",
            self.key_type, self.stream_id, self.version_id, self.content_hash, self.creation_ts
        )
    }
}

//==================================================================================
// 3. Slice + Key
//==================================================================================

/// One entry of a frame's slice sequence: where the slice sits in the frame,
/// the key it is (or will be) stored under, and its materialized segment.
#[derive(Debug)]
pub struct SliceAndKey<'a> {
    pub slice: FrameSlice,
    pub key: Option<AtomKey>,
    pub segment: Option<Segment<'a>>,
}

impl<'a> SliceAndKey<'a> {
    pub fn new(slice: FrameSlice) -> Self {
        Self {
            slice,
            key: None,
            segment: None,
        }
    }

    pub fn with_segment(slice: FrameSlice, segment: Segment<'a>) -> Self {
        Self {
            slice,
            key: None,
            segment: Some(segment),
        }
    }

    pub fn with_key(mut self, key: AtomKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn string_pool(&self) -> Option<&StringPool> {
        self.segment.as_ref().and_then(|s| s.string_pool())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_row_range_span() {
        let range = RowRange::new(10, 15);
        assert_eq!(range.diff(), 5);
        assert!(range.contains(10));
        assert!(!range.contains(15));
        assert_eq!(range.to_string(), "[10, 15)");
    }

    #[test]
    fn test_key_creation_time() {
        let key = AtomKey {
            stream_id: "ticks".into(),
            key_type: KeyType::TableData,
            version_id: 4,
            creation_ts: 1_700_000_000_123_456_789,
            content_hash: 0xabc,
            start_index: 0,
            end_index: 100,
        };
        let created = key.created_at();
        assert_eq!(created.year(), 2023);
        assert_eq!(created.timestamp_subsec_nanos(), 123_456_789);
        assert!(key.to_string().starts_with("TableData:ticks:v4:0xabc@"));
    }
}
