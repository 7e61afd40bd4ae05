//! Assembles the persisted frame descriptor from a fresh ingestion frame, an
//! existing index segment (append path) or a reconciled pipeline context.
//!
//! Previous/next version links are never invented here: they come from the
//! version catalog, either passed in directly or looked up through
//! [`VersionCatalog`].

use arrow_schema::SchemaRef;
use serde::{Deserialize, Serialize};

use super::context::PipelineContext;
use super::frame_slice::AtomKey;
use super::input_frame::InputTensorFrame;
use super::slice_rowcounts::get_slice_rowcounts;
use crate::error::IngestError;
use crate::types::StreamDescriptor;

//==================================================================================
// 1. Metadata Carried by Descriptors
//==================================================================================

/// How the index of the external representation maps onto stored fields.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexNormalization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `false` when the index was synthesized (a plain row count) and should not
    /// be restored as a column.
    pub is_physically_stored: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// How the external representation maps to internal types, so readers can
/// rebuild the original shape.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(tag = "input_type", rename_all = "snake_case")]
pub enum NormalizationMetadata {
    /// A table with named columns.
    DataFrame {
        index: IndexNormalization,
        /// External column names that were not valid field names, keyed by the
        /// stored field name.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        renamed_columns: Vec<(String, String)>,
    },
    /// A single named column with an index.
    Series {
        index: IndexNormalization,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// A bare n-dimensional array, flattened to rows.
    NdArray { shape: Vec<usize> },
    /// Stored as-is.
    #[default]
    Raw,
}

/// Opaque user metadata attached to a version.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct UserMetadata(pub serde_json::Value);

//==================================================================================
// 2. The Frame Descriptor
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FrameDescriptor {
    pub total_rows: u64,
    pub stream_descriptor: StreamDescriptor,
    pub normalization: NormalizationMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<UserMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_key: Option<AtomKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_key: Option<AtomKey>,
    /// Whether a sparse/dynamic-schema column layout is recorded.
    pub bucketize_dynamic: bool,
}

impl FrameDescriptor {
    pub fn arrow_schema(&self) -> SchemaRef {
        self.stream_descriptor.to_arrow_schema()
    }

    pub fn to_json(&self) -> Result<String, IngestError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, IngestError> {
        Ok(serde_json::from_str(json)?)
    }
}

//==================================================================================
// 3. Collaborator Interfaces
//==================================================================================

/// The key/version catalog, consumed only for the identifiers it hands out.
pub trait VersionCatalog {
    fn previous_version(&self, stream_id: &str) -> Option<AtomKey>;

    fn next_version(&self, _stream_id: &str) -> Option<AtomKey> {
        None
    }
}

/// Read access to an already persisted index segment, used when appending.
pub trait IndexSegmentReader {
    fn stream_descriptor(&self) -> &StreamDescriptor;
    fn normalization(&self) -> &NormalizationMetadata;
    fn user_metadata(&self) -> Option<&UserMetadata>;
}

/// A previously built descriptor can stand in for its index segment.
impl IndexSegmentReader for FrameDescriptor {
    fn stream_descriptor(&self) -> &StreamDescriptor {
        &self.stream_descriptor
    }

    fn normalization(&self) -> &NormalizationMetadata {
        &self.normalization
    }

    fn user_metadata(&self) -> Option<&UserMetadata> {
        self.user_metadata.as_ref()
    }
}

//==================================================================================
// 4. Builders
//==================================================================================

pub fn make_frame_descriptor(
    total_rows: usize,
    desc: StreamDescriptor,
    norm_meta: NormalizationMetadata,
    user_meta: Option<UserMetadata>,
    prev_key: Option<AtomKey>,
    next_key: Option<AtomKey>,
    bucketize_dynamic: bool,
) -> FrameDescriptor {
    FrameDescriptor {
        total_rows: total_rows as u64,
        stream_descriptor: desc,
        normalization: norm_meta,
        user_metadata: user_meta,
        prev_key,
        next_key,
        bucketize_dynamic,
    }
}

/// The append path: schema and metadata come from the existing index segment,
/// `total_rows` is the new total after the append.
pub fn descriptor_from_index_segment<R: IndexSegmentReader + ?Sized>(
    total_rows: usize,
    index_segment_reader: &R,
    prev_key: Option<AtomKey>,
    bucketize_dynamic: bool,
) -> FrameDescriptor {
    make_frame_descriptor(
        total_rows,
        index_segment_reader.stream_descriptor().clone(),
        index_segment_reader.normalization().clone(),
        index_segment_reader.user_metadata().cloned(),
        prev_key,
        None,
        bucketize_dynamic,
    )
}

/// Builds the descriptor of a reconciled context. The row count is the grouped
/// count of the slice sequence, so column-parallel slices are counted once.
pub fn descriptor_from_pipeline_context(
    pipeline_context: &PipelineContext<'_>,
    prev_key: Option<AtomKey>,
    bucketize_dynamic: bool,
) -> FrameDescriptor {
    let total_rows = get_slice_rowcounts(&pipeline_context.slice_and_keys);
    log::debug!(
        "Building descriptor for '{}' from {} slices, {} rows",
        pipeline_context.desc.stream_id,
        pipeline_context.len(),
        total_rows
    );
    make_frame_descriptor(
        total_rows,
        pipeline_context.desc.clone(),
        pipeline_context.norm_meta.clone(),
        pipeline_context.user_meta.clone(),
        prev_key,
        None,
        bucketize_dynamic,
    )
}

/// Builds the index descriptor for a fresh ingestion frame appended after
/// `existing_rows` rows.
pub fn index_descriptor_from_frame(
    frame: InputTensorFrame<'_>,
    existing_rows: usize,
    prev_key: Option<AtomKey>,
) -> FrameDescriptor {
    let total_rows = frame.num_rows + existing_rows;
    make_frame_descriptor(
        total_rows,
        frame.desc,
        frame.norm_meta,
        frame.user_meta,
        prev_key,
        None,
        frame.bucketize_dynamic,
    )
}

/// Fills the descriptor's version links from the catalog entries of
/// `stream_id`. Links the catalog does not know about are left as they are.
pub fn link_from_catalog(
    mut descriptor: FrameDescriptor,
    catalog: &dyn VersionCatalog,
    stream_id: &str,
) -> FrameDescriptor {
    if let Some(prev) = catalog.previous_version(stream_id) {
        descriptor.prev_key = Some(prev);
    }
    if let Some(next) = catalog.next_version(stream_id) {
        descriptor.next_key = Some(next);
    }
    descriptor
}
