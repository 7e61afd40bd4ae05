//! The frame-level write path: partitions an input frame into slices, builds
//! one segment per slice (in parallel when configured), and hands back a
//! reconciled pipeline context.

use rayon::prelude::*;

use super::column_writer::{write_column, WriteOptions};
use super::context::PipelineContext;
use super::frame_slice::{ColRange, FrameSlice, RowRange, SliceAndKey};
use super::input_frame::InputTensorFrame;
use super::slice_rowcounts::adjust_context_rowcounts;
use super::string_encoding::DecodeLock;
use crate::column_store::Segment;
use crate::config::IngestConfig;
use crate::error::IngestError;

//==================================================================================
// 1. Slicing
//==================================================================================

/// Partitions `frame` into row blocks of `rows_per_segment` and column groups
/// of `columns_per_segment`. Slices are ordered row-major: every column group
/// of a row block before the next row block. Row ranges are stream rows, i.e.
/// shifted by the frame's offset.
pub fn slice_frame(
    frame: &InputTensorFrame<'_>,
    config: &IngestConfig,
) -> Result<Vec<FrameSlice>, IngestError> {
    config.validate()?;
    let num_columns = frame.num_columns();
    if num_columns == 0 || frame.num_rows == 0 {
        return Ok(Vec::new());
    }

    let row_blocks = frame.num_rows.div_ceil(config.rows_per_segment);
    let col_groups = num_columns.div_ceil(config.columns_per_segment);
    let mut slices = Vec::with_capacity(row_blocks * col_groups);
    for row_start in (0..frame.num_rows).step_by(config.rows_per_segment) {
        let row_end = (row_start + config.rows_per_segment).min(frame.num_rows);
        let row_range = RowRange::new(frame.offset + row_start, frame.offset + row_end);
        for col_start in (0..num_columns).step_by(config.columns_per_segment) {
            let col_end = (col_start + config.columns_per_segment).min(num_columns);
            slices.push(FrameSlice::new(ColRange::new(col_start, col_end), row_range));
        }
    }
    Ok(slices)
}

//==================================================================================
// 2. Segment Production
//==================================================================================

/// Builds the segment of one slice. A string encoding failure aborts the slice
/// and is reported against its frame row.
fn write_slice<'a>(
    frame: &InputTensorFrame<'a>,
    slice: FrameSlice,
    config: &IngestConfig,
    decode_lock: &DecodeLock,
) -> Result<SliceAndKey<'a>, IngestError> {
    let desc = frame.desc.subset(slice.col_range.start, slice.col_range.end)?;
    let mut segment = Segment::new(desc);
    let source_row = slice.row_range.start - frame.offset;

    for (local_col, col) in (slice.col_range.start..slice.col_range.end).enumerate() {
        let field = frame.desc.field(col)?;
        let tensor = frame.field_tensors.get(col).ok_or_else(|| {
            IngestError::InternalError(format!("No tensor for field '{}'", field.name))
        })?;
        let options = WriteOptions::from_config(config, decode_lock);
        let outcome = write_column(
            &mut segment,
            local_col,
            field.data_type,
            tensor,
            source_row,
            slice.rows(),
            &options,
        )?;
        if let Some(encoding_error) = outcome {
            return Err(encoding_error.into_frame_error(&field.name, source_row));
        }
    }
    Ok(SliceAndKey::with_segment(slice, segment))
}

/// Writes every slice of `frame` and returns the reconciled context.
///
/// Slices are produced independently; the first failing slice in slice order
/// decides the returned error, and no partial context is returned.
pub fn write_frame<'a>(
    frame: &InputTensorFrame<'a>,
    config: &IngestConfig,
    decode_lock: &DecodeLock,
) -> Result<PipelineContext<'a>, IngestError> {
    let slices = slice_frame(frame, config)?;
    if config.sparsify_floats {
        if let Some(field) = frame.desc.fields.iter().find(|f| !f.data_type.is_float()) {
            log::error!(
                "Sparse write requested for '{}', but field '{}' is {}",
                frame.desc.stream_id,
                field.name,
                field.data_type
            );
            return Err(IngestError::SparsifyTypeError(field.data_type));
        }
    }
    log::info!(
        "Writing '{}': {} rows x {} columns in {} slices{}",
        frame.desc.stream_id,
        frame.num_rows,
        frame.num_columns(),
        slices.len(),
        if config.parallel_slices { " (parallel)" } else { "" }
    );

    let results: Vec<Result<SliceAndKey<'a>, IngestError>> = if config.parallel_slices {
        slices
            .par_iter()
            .map(|slice| write_slice(frame, *slice, config, decode_lock))
            .collect()
    } else {
        slices
            .iter()
            .map(|slice| write_slice(frame, *slice, config, decode_lock))
            .collect()
    };

    let mut context = PipelineContext::new(
        frame.desc.clone(),
        frame.norm_meta.clone(),
        frame.user_meta.clone(),
    );
    for result in results {
        context.push(result?);
    }

    adjust_context_rowcounts(&mut context);
    log_metric!(
        "event" = "write_frame",
        "stream" = &frame.desc.stream_id,
        "slices" = &context.len(),
        "rows" = &context.total_rows()
    );
    Ok(context)
}
