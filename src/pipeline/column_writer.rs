//! This module writes one tensor into one column of a segment.
//!
//! It is the only place where a runtime `DataType` is turned into a concrete
//! write strategy. Dispatch goes through [`DataType::visit`]; each arm picks the
//! cheapest strategy the source layout allows:
//!
//! - **zero-copy**: a C-contiguous numeric source is borrowed, not copied;
//! - **flatten**: a strided source is materialized first (slower, logged);
//! - **sparse**: float columns drop NaN rows behind a presence bitmap;
//! - **intern**: variable-length strings are decoded and pooled per segment.

use std::mem::size_of;

use bytemuck::Pod;

use super::string_encoding::{encode_cell, DecodeLock, EncodedCell, ScopedDecodeLock};
use crate::column_store::{OwnedBuffer, Segment, SparseMap, StringOffset};
use crate::config::IngestConfig;
use crate::error::{IngestError, StringEncodingError};
use crate::tensor::{flatten_objects, flatten_tensor, NativeTensor, StringObject};
use crate::traits::{Bool8Tag, StaticTypeTag};
use crate::types::{DataType, TypeVisitor, STRING_OFFSET_WIDTH};

/// A column write either succeeds, stops on a recoverable string encoding
/// failure, or fails outright.
pub type WriteOutcome = Result<Option<StringEncodingError>, IngestError>;

/// Per-column write options.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions<'l> {
    /// Store only non-NaN values plus a presence bitmap. Floats only.
    pub sparsify_floats: bool,
    pub decode_lock: &'l DecodeLock,
}

impl Default for WriteOptions<'static> {
    fn default() -> Self {
        Self {
            sparsify_floats: false,
            decode_lock: DecodeLock::global(),
        }
    }
}

impl<'l> WriteOptions<'l> {
    /// Options for every column written under `config`.
    pub fn from_config(config: &IngestConfig, decode_lock: &'l DecodeLock) -> Self {
        Self {
            sparsify_floats: config.sparsify_floats,
            decode_lock,
        }
    }
}

//==================================================================================
// 1. Public Entry Point
//==================================================================================

/// Writes rows `[source_row, source_row + rows_to_write)` of `tensor` into
/// column `col` of `segment`, declared as `type_desc`.
///
/// Returns `Ok(Some(_))` only for string columns, when a cell could not be
/// encoded; its row index is relative to `source_row`.
pub fn write_column<'a>(
    segment: &mut Segment<'a>,
    col: usize,
    type_desc: DataType,
    tensor: &NativeTensor<'a>,
    source_row: usize,
    rows_to_write: usize,
    options: &WriteOptions<'_>,
) -> WriteOutcome {
    let column_type = segment.column(col)?.data_type();
    if column_type != type_desc || tensor.data_type() != type_desc {
        return Err(IngestError::SchemaMismatch(format!(
            "Column {} is stored as {}, declared as {}, tensor is {}",
            col,
            column_type,
            type_desc,
            tensor.data_type()
        )));
    }
    if tensor.ndim() != 1 {
        return Err(IngestError::UnsupportedType(format!(
            "Cannot write a {}-dimensional {} tensor into a single column",
            tensor.ndim(),
            type_desc
        )));
    }
    if tensor.holds_objects() && !type_desc.is_dynamic_string() {
        return Err(IngestError::UnsupportedType(format!(
            "Object cells cannot be written as {}",
            type_desc
        )));
    }
    if options.sparsify_floats && !type_desc.is_float() {
        return Err(IngestError::SparsifyTypeError(type_desc));
    }
    tensor.check_rows(source_row, rows_to_write)?;
    segment.check_row_count(col, rows_to_write)?;

    let outcome = type_desc.visit(ColumnWriteVisitor {
        segment: &mut *segment,
        col,
        declared: type_desc,
        tensor,
        source_row,
        rows: rows_to_write,
        options,
    })?;

    if outcome.is_none() {
        segment.note_rows_written(rows_to_write);
    }
    Ok(outcome)
}

//==================================================================================
// 2. The Dispatch Arms
//==================================================================================

struct ColumnWriteVisitor<'w, 'a, 'l> {
    segment: &'w mut Segment<'a>,
    col: usize,
    declared: DataType,
    tensor: &'w NativeTensor<'a>,
    source_row: usize,
    rows: usize,
    options: &'w WriteOptions<'l>,
}

impl<'w, 'a, 'l> TypeVisitor for ColumnWriteVisitor<'w, 'a, 'l> {
    type Output = WriteOutcome;

    fn visit_numeric<T: StaticTypeTag>(self) -> WriteOutcome {
        if T::DATA_TYPE != self.declared {
            return Err(IngestError::SchemaMismatch(format!(
                "Dispatch arm for {} selected for a column declared as {}",
                T::DATA_TYPE,
                self.declared
            )));
        }
        if self.options.sparsify_floats {
            self.write_sparse::<T>()?;
        } else {
            self.write_dense::<T::Raw>()?;
        }
        Ok(None)
    }

    fn visit_bool(self) -> WriteOutcome {
        self.visit_numeric::<Bool8Tag>()
    }

    fn visit_fixed_string(self, tag: DataType) -> WriteOutcome {
        let elsize = self.tensor.elsize();
        let column = self.segment.column_mut(self.col)?;
        let buffer = column.allocate_data(elsize, self.rows);
        let dst = buffer.data_mut();
        for (i, record) in dst.chunks_exact_mut(elsize.max(1)).enumerate().take(self.rows) {
            record.copy_from_slice(self.tensor.record_at(self.source_row + i)?);
        }
        log_metric!(
            "event" = "column_write",
            "strategy" = "fixed_string_copy",
            "type" = &tag,
            "rows" = &self.rows,
            "width" = &elsize
        );
        Ok(None)
    }

    fn visit_dynamic_string(self, tag: DataType) -> WriteOutcome {
        let utf = tag.is_utf();
        let stride = self.tensor.strides()[0];
        let flattened = if self.tensor.is_c_style(self.tensor.elsize()) {
            None
        } else {
            log::warn!(
                "Column {} has strided object cells (stride {}), flattening {} rows",
                self.col,
                stride,
                self.rows
            );
            Some(flatten_objects(self.tensor, self.source_row, self.rows)?)
        };

        let (column, pool) = self.segment.column_and_pool_mut(self.col)?;
        let offsets = column
            .allocate_data(STRING_OFFSET_WIDTH, self.rows)
            .typed_mut::<StringOffset>()?;
        let mut scoped_lock = ScopedDecodeLock::new(self.options.decode_lock);

        for (i, slot) in offsets.iter_mut().enumerate() {
            let cell: StringObject<'a> = match &flattened {
                Some(cells) => cells[i],
                None => self.tensor.object_at((self.source_row + i) * stride)?,
            };
            *slot = match encode_cell(cell, utf, &mut scoped_lock) {
                Ok(EncodedCell::Sentinel(sentinel)) => sentinel,
                Ok(EncodedCell::Content(bytes)) => pool.get(&bytes).offset(),
                Err(reason) => {
                    log::warn!(
                        "String encoding failed in column {} at slice row {}: {}",
                        self.col,
                        i,
                        reason
                    );
                    return Ok(Some(StringEncodingError::new(i, reason)));
                }
            };
        }

        log_metric!(
            "event" = "column_write",
            "strategy" = "intern",
            "type" = &tag,
            "rows" = &self.rows,
            "pool_entries" = &pool.len(),
            "decode_lock" = &scoped_lock.is_held()
        );
        Ok(None)
    }

    fn visit_empty(self) -> WriteOutcome {
        self.segment.column_mut(self.col)?.set_empty_rows(self.rows);
        Ok(None)
    }
}

//==================================================================================
// 3. Numeric Strategies
//==================================================================================

impl<'w, 'a, 'l> ColumnWriteVisitor<'w, 'a, 'l> {
    fn write_dense<R: Pod>(self) -> Result<(), IngestError> {
        let width = size_of::<R>();
        let column = self.segment.column_mut(self.col)?;
        if self.tensor.is_c_style(width) {
            let bytes = self.tensor.contiguous_bytes(self.source_row, self.rows)?;
            column.attach_external(bytes, self.rows);
            log_metric!(
                "event" = "column_write",
                "strategy" = "zero_copy",
                "type" = &self.declared,
                "rows" = &self.rows
            );
        } else {
            log::warn!(
                "Column {} source is strided (stride {} for width {}), copying {} rows",
                self.col,
                self.tensor.strides()[0],
                width,
                self.rows
            );
            let buffer = flatten_tensor::<R>(self.tensor, self.source_row, self.rows)?;
            column.set_owned(buffer, self.rows);
        }
        Ok(())
    }

    fn write_sparse<T: StaticTypeTag>(self) -> Result<(), IngestError> {
        let stride = self.tensor.strides()[0];
        let mut values = OwnedBuffer::with_capacity(self.rows * size_of::<T::Raw>());
        let mut map = SparseMap::with_capacity(self.rows);
        for row in self.source_row..self.source_row + self.rows {
            let value = self.tensor.pod_at::<T::Raw>(row * stride)?;
            let present = !T::is_missing(value);
            map.push(present);
            if present {
                values.push(value);
            }
        }
        let column = self.segment.column_mut(self.col)?;
        column.set_sparse(values, map);
        log_metric!(
            "event" = "column_write",
            "strategy" = "sparse",
            "type" = &self.declared,
            "rows" = &self.rows,
            "present" = &column.sparse_map().map_or(0, |m| m.count_ones())
        );
        Ok(())
    }
}
