//! A single typed column of a segment.
//!
//! Storage is either borrowed from the caller (zero-copy attach, bounded by the
//! tensor's lifetime `'a`) or owned by the column. Sparse float columns keep only
//! the present values, densely packed, next to a presence bitmap.

use bitvec::prelude::*;
use bytemuck::Pod;

use super::buffer::OwnedBuffer;
use crate::error::IngestError;
use crate::types::DataType;

/// Presence bitmap of a sparse column: bit `i` is set when row `i` has a value.
pub type SparseMap = BitVec<u8, Lsb0>;

#[derive(Debug, Default)]
pub enum ColumnData<'a> {
    /// Nothing written yet.
    #[default]
    Unallocated,
    /// Borrowed view into caller-owned memory.
    External(&'a [u8]),
    /// Engine-owned storage.
    Owned(OwnedBuffer),
}

#[derive(Debug)]
pub struct Column<'a> {
    data_type: DataType,
    width: usize,
    data: ColumnData<'a>,
    sparse_map: Option<SparseMap>,
    row_count: usize,
}

impl<'a> Column<'a> {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            width: data_type.fixed_width().unwrap_or(0),
            data: ColumnData::Unallocated,
            sparse_map: None,
            row_count: 0,
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Element width in bytes (the offset width for pooled strings).
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn data(&self) -> &ColumnData<'a> {
        &self.data
    }

    pub fn is_allocated(&self) -> bool {
        !matches!(self.data, ColumnData::Unallocated)
    }

    /// `true` when the column references caller memory instead of owning it.
    pub fn is_external(&self) -> bool {
        matches!(self.data, ColumnData::External(_))
    }

    pub fn is_sparse(&self) -> bool {
        self.sparse_map.is_some()
    }

    pub fn sparse_map(&self) -> Option<&BitSlice<u8, Lsb0>> {
        self.sparse_map.as_deref()
    }

    /// The stored bytes; for sparse columns only the present values.
    pub fn bytes(&self) -> &[u8] {
        match &self.data {
            ColumnData::Unallocated => &[],
            ColumnData::External(bytes) => bytes,
            ColumnData::Owned(buffer) => buffer.data(),
        }
    }

    /// Typed view over the stored values.
    pub fn values<T: Pod>(&self) -> Result<&[T], IngestError> {
        if std::mem::size_of::<T>() != self.width {
            return Err(IngestError::SchemaMismatch(format!(
                "Column of {} has width {}, requested {} ({} bytes)",
                self.data_type,
                self.width,
                std::any::type_name::<T>(),
                std::mem::size_of::<T>()
            )));
        }
        Ok(bytemuck::try_cast_slice(self.bytes())?)
    }

    /// The value of logical row `row`; `None` for rows absent from a sparse column.
    pub fn value_at<T: Pod>(&self, row: usize) -> Result<Option<T>, IngestError> {
        self.check_row(row)?;
        let values = self.values::<T>()?;
        let index = match &self.sparse_map {
            None => row,
            Some(map) => {
                if !map[row] {
                    return Ok(None);
                }
                map[..row].count_ones()
            }
        };
        values.get(index).copied().map(Some).ok_or_else(|| {
            IngestError::InternalError(format!(
                "Column holds {} values but row {} maps to index {}",
                values.len(),
                row,
                index
            ))
        })
    }

    /// The fixed-width record stored for `row`.
    pub fn fixed_string_at(&self, row: usize) -> Result<&[u8], IngestError> {
        if !self.data_type.is_fixed_string() {
            return Err(IngestError::SchemaMismatch(format!(
                "Column of {} does not hold fixed-width strings",
                self.data_type
            )));
        }
        self.check_row(row)?;
        let start = row * self.width;
        Ok(&self.bytes()[start..start + self.width])
    }

    fn check_row(&self, row: usize) -> Result<(), IngestError> {
        if row >= self.row_count {
            return Err(IngestError::OutOfBounds(format!(
                "Row {} requested from column with {} rows",
                row, self.row_count
            )));
        }
        Ok(())
    }

    //==============================================================================
    // Write-side operations, driven by the column writer
    //==============================================================================

    pub(crate) fn attach_external(&mut self, bytes: &'a [u8], rows: usize) {
        debug_assert_eq!(bytes.len(), rows * self.width);
        self.data = ColumnData::External(bytes);
        self.sparse_map = None;
        self.row_count = rows;
    }

    pub(crate) fn set_owned(&mut self, buffer: OwnedBuffer, rows: usize) {
        debug_assert_eq!(buffer.bytes(), rows * self.width);
        self.data = ColumnData::Owned(buffer);
        self.sparse_map = None;
        self.row_count = rows;
    }

    pub(crate) fn set_sparse(&mut self, values: OwnedBuffer, map: SparseMap) {
        debug_assert_eq!(values.bytes(), map.count_ones() * self.width);
        self.row_count = map.len();
        self.data = ColumnData::Owned(values);
        self.sparse_map = Some(map);
    }

    /// Allocates zeroed owned storage for `rows` rows of `width` bytes each and
    /// returns it for in-place filling.
    pub(crate) fn allocate_data(&mut self, width: usize, rows: usize) -> &mut OwnedBuffer {
        self.width = width;
        self.row_count = rows;
        self.sparse_map = None;
        self.data = ColumnData::Owned(OwnedBuffer::presized(width * rows));
        match &mut self.data {
            ColumnData::Owned(buffer) => buffer,
            _ => unreachable!("storage was just allocated"),
        }
    }

    /// Records rows for a column type that has no storage.
    pub(crate) fn set_empty_rows(&mut self, rows: usize) {
        self.data = ColumnData::Unallocated;
        self.sparse_map = None;
        self.row_count = rows;
    }
}
