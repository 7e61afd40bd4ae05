// In: src/error.rs

//! This module defines the single, unified error type for the entire tickstore
//! ingestion core. It uses the `thiserror` crate to provide ergonomic,
//! context-aware error handling.
//!
//! Only string encoding distinguishes per-row from per-column granularity: the
//! column writer hands back a [`StringEncodingError`] value and the caller decides
//! whether to promote it into [`IngestError::StringEncoding`]. Everything else is
//! fatal for the column or frame being built.

use std::fmt;

use thiserror::Error;

use crate::types::DataType;

#[derive(Error, Debug)]
pub enum IngestError {
    // =========================================================================
    // === High-Level, Semantic Errors (Specific to ingestion)
    // =========================================================================
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Unsupported data type for this operation: {0}")]
    UnsupportedType(String),

    #[error("String encoding failed in column '{column}' at row {row}: {reason}")]
    StringEncoding {
        column: String,
        row: usize,
        reason: String,
    },

    #[error("Sparse write is only supported for floating point columns, got {0}")]
    SparsifyTypeError(DataType),

    #[error("String pool not found for context row {0}")]
    MissingStringPool(usize),

    #[error("Invalid tensor: {0}")]
    InvalidTensor(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    #[error("Internal logic error (this is a bug): {0}")]
    InternalError(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error from the Serde JSON library, typically while loading config or
    /// serializing descriptors.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// An error originating from the underlying I/O subsystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from a safe byte-casting operation failing.
    #[error("Byte slice casting error: {0}")]
    PodCast(String), // Manual `From` impl is needed as bytemuck::PodCastError doesn't impl Error
}

// =============================================================================
// === Manual `From` Implementations ===
// =============================================================================

impl From<bytemuck::PodCastError> for IngestError {
    fn from(err: bytemuck::PodCastError) -> Self {
        IngestError::PodCast(err.to_string())
    }
}

//==================================================================================
// Recoverable, per-row string encoding failure
//==================================================================================

/// A string cell that could not be decoded under the column's encoding.
///
/// `row_index_in_slice` is local to the slice being written, not the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringEncodingError {
    pub row_index_in_slice: usize,
    pub reason: String,
}

impl StringEncodingError {
    pub fn new(row_index_in_slice: usize, reason: impl Into<String>) -> Self {
        Self {
            row_index_in_slice,
            reason: reason.into(),
        }
    }

    /// Promotes the row-level failure to a frame-fatal error. `slice_start` is the
    /// first frame row of the slice the error was raised in.
    pub fn into_frame_error(self, column: &str, slice_start: usize) -> IngestError {
        IngestError::StringEncoding {
            column: column.to_string(),
            row: slice_start + self.row_index_in_slice,
            reason: self.reason,
        }
    }
}

impl fmt::Display for StringEncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "string encoding error at slice row {}: {}",
            self.row_index_in_slice, self.reason
        )
    }
}
