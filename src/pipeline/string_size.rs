//! Byte-length statistics over the pooled strings a slice references, used by
//! read paths to size fixed-width output buffers.

use super::context::PipelineContextRow;
use crate::column_store::{is_a_string, OwnedBuffer, StringOffset};
use crate::error::IngestError;

/// The offsets of the context row's slice, taken out of `src`, a frame-wide
/// buffer of string offsets whose first element is frame row
/// `first_row_in_frame`.
fn slice_offsets<'b>(
    context_row: &PipelineContextRow<'_, '_>,
    src: &'b OwnedBuffer,
    first_row_in_frame: usize,
) -> Result<&'b [StringOffset], IngestError> {
    let row_range = context_row.slice_and_key().slice.row_range;
    let offsets = src.typed::<StringOffset>()?;
    let start = row_range.start.checked_sub(first_row_in_frame).ok_or_else(|| {
        IngestError::OutOfBounds(format!(
            "Slice {} starts at row {}, before the buffer's first row {}",
            context_row.index(),
            row_range.start,
            first_row_in_frame
        ))
    })?;
    let end = start + row_range.diff();
    offsets.get(start..end).ok_or_else(|| {
        IngestError::OutOfBounds(format!(
            "Slice {} rows {} map to [{}, {}) of a buffer holding {} offsets",
            context_row.index(),
            row_range,
            start,
            end,
            offsets.len()
        ))
    })
}

/// Byte length of the first real string in the slice, or 0 if it has none.
pub fn first_string_size(
    context_row: &PipelineContextRow<'_, '_>,
    src: &OwnedBuffer,
    first_row_in_frame: usize,
) -> Result<usize, IngestError> {
    let pool = context_row.string_pool()?;
    let offsets = slice_offsets(context_row, src, first_row_in_frame)?;
    match offsets.iter().copied().find(|&o| is_a_string(o)) {
        Some(offset) => Ok(pool.get_const_view(offset)?.len()),
        None => Ok(0),
    }
}

/// The maximum byte length over the slice's real strings, or 0 if it has none.
pub fn max_string_size(
    context_row: &PipelineContextRow<'_, '_>,
    src: &OwnedBuffer,
    first_row_in_frame: usize,
) -> Result<usize, IngestError> {
    let pool = context_row.string_pool()?;
    let offsets = slice_offsets(context_row, src, first_row_in_frame)?;
    offsets
        .iter()
        .copied()
        .filter(|&o| is_a_string(o))
        .try_fold(0usize, |max, offset| -> Result<usize, IngestError> {
            Ok(max.max(pool.get_const_view(offset)?.len()))
        })
}
