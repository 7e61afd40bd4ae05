//! This module defines the ingestion pipeline: writing tensors into segment
//! columns, reconciling the slice sequence of a frame, and building the
//! persisted frame descriptor.

//==================================================================================
// 1. Module Declarations
//==================================================================================

pub mod column_writer;
pub mod context;
pub mod descriptor;
pub mod frame_slice;
pub mod frame_writer;
pub mod input_frame;
pub mod slice_rowcounts;
pub mod string_encoding;
pub mod string_size;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================

pub use self::column_writer::{write_column, WriteOptions, WriteOutcome};
pub use self::context::{PipelineContext, PipelineContextRow};
pub use self::descriptor::{
    descriptor_from_index_segment, descriptor_from_pipeline_context, index_descriptor_from_frame,
    link_from_catalog, make_frame_descriptor, FrameDescriptor, IndexNormalization,
    IndexSegmentReader, NormalizationMetadata, UserMetadata, VersionCatalog,
};
pub use self::frame_slice::{AtomKey, ColRange, FrameSlice, KeyType, RowRange, SliceAndKey};
pub use self::frame_writer::{slice_frame, write_frame};
pub use self::input_frame::InputTensorFrame;
pub use self::slice_rowcounts::{
    adjust_context_rowcounts, adjust_slice_rowcounts, get_slice_rowcounts, offset_and_row_count,
};
pub use self::string_encoding::{DecodeGuard, DecodeLock};
pub use self::string_size::{first_string_size, max_string_size};

#[cfg(test)]
mod column_writer_tests;
