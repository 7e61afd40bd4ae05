//! This module defines the core, strongly-typed data representations used
//! throughout the ingestion pipeline.
//!
//! It includes the closed `DataType` tag set with its visitor-based dispatch and
//! the stream schema types shared by segments and descriptors.

pub mod data_type;
pub mod stream_descriptor;

// Re-export the main type(s) for easier access.
pub use data_type::{DataType, TypeVisitor, STRING_OFFSET_WIDTH};
pub use stream_descriptor::{FieldDescriptor, IndexDescriptor, IndexKind, StreamDescriptor};
