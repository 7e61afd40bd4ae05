//! The per-frame pipeline context: the ordered slice sequence plus the frame's
//! schema and metadata.
//!
//! A context is built once per frame, mutated in place while slices are produced
//! and reconciled, and then read-only for descriptor building and read-path
//! utilities.

use super::descriptor::{NormalizationMetadata, UserMetadata};
use super::frame_slice::SliceAndKey;
use crate::column_store::StringPool;
use crate::error::IngestError;
use crate::types::StreamDescriptor;

#[derive(Debug)]
pub struct PipelineContext<'a> {
    pub desc: StreamDescriptor,
    pub norm_meta: NormalizationMetadata,
    pub user_meta: Option<UserMetadata>,
    pub slice_and_keys: Vec<SliceAndKey<'a>>,
    total_rows: usize,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        desc: StreamDescriptor,
        norm_meta: NormalizationMetadata,
        user_meta: Option<UserMetadata>,
    ) -> Self {
        Self {
            desc,
            norm_meta,
            user_meta,
            slice_and_keys: Vec::new(),
            total_rows: 0,
        }
    }

    pub fn push(&mut self, slice_and_key: SliceAndKey<'a>) {
        self.slice_and_keys.push(slice_and_key);
    }

    pub fn len(&self) -> usize {
        self.slice_and_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slice_and_keys.is_empty()
    }

    /// Total rows as of the last reconciliation.
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub(crate) fn set_total_rows(&mut self, total_rows: usize) {
        self.total_rows = total_rows;
    }

    pub fn row(&self, index: usize) -> Result<PipelineContextRow<'_, 'a>, IngestError> {
        if index >= self.slice_and_keys.len() {
            return Err(IngestError::OutOfBounds(format!(
                "Context row {} requested from a context of {} slices",
                index,
                self.slice_and_keys.len()
            )));
        }
        Ok(PipelineContextRow {
            context: self,
            index,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = PipelineContextRow<'_, 'a>> + '_ {
        (0..self.slice_and_keys.len()).map(move |index| PipelineContextRow {
            context: self,
            index,
        })
    }
}

/// A cursor onto one slice of a context.
#[derive(Debug, Clone, Copy)]
pub struct PipelineContextRow<'c, 'a> {
    context: &'c PipelineContext<'a>,
    index: usize,
}

impl<'c, 'a> PipelineContextRow<'c, 'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn slice_and_key(&self) -> &'c SliceAndKey<'a> {
        &self.context.slice_and_keys[self.index]
    }

    pub fn has_string_pool(&self) -> bool {
        self.slice_and_key().string_pool().is_some()
    }

    pub fn string_pool(&self) -> Result<&'c StringPool, IngestError> {
        self.slice_and_key()
            .string_pool()
            .ok_or(IngestError::MissingStringPool(self.index))
    }
}
