//! One physical slice of a frame: its columns, schema and string pool.
//!
//! A segment is built by exactly one worker. The pool is created on the first
//! variable-length string write and only grows while the segment is being built;
//! once the segment is handed to a pipeline context it is read through shared
//! references only.

use super::column::Column;
use super::string_pool::{is_a_string, StringOffset, StringPool};
use crate::error::IngestError;
use crate::types::StreamDescriptor;

#[derive(Debug)]
pub struct Segment<'a> {
    descriptor: StreamDescriptor,
    columns: Vec<Column<'a>>,
    string_pool: Option<StringPool>,
    row_count: usize,
}

impl<'a> Segment<'a> {
    /// An empty segment with one unallocated column per descriptor field.
    pub fn new(descriptor: StreamDescriptor) -> Self {
        let columns = descriptor
            .fields
            .iter()
            .map(|f| Column::new(f.data_type))
            .collect();
        Self {
            descriptor,
            columns,
            string_pool: None,
            row_count: 0,
        }
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column<'a>] {
        &self.columns
    }

    pub fn column(&self, col: usize) -> Result<&Column<'a>, IngestError> {
        self.columns.get(col).ok_or_else(|| {
            IngestError::OutOfBounds(format!(
                "Column {} requested from segment with {} columns",
                col,
                self.columns.len()
            ))
        })
    }

    pub fn column_mut(&mut self, col: usize) -> Result<&mut Column<'a>, IngestError> {
        let num_columns = self.columns.len();
        self.columns.get_mut(col).ok_or_else(|| {
            IngestError::OutOfBounds(format!(
                "Column {} requested from segment with {} columns",
                col, num_columns
            ))
        })
    }

    pub fn has_string_pool(&self) -> bool {
        self.string_pool.is_some()
    }

    pub fn string_pool(&self) -> Option<&StringPool> {
        self.string_pool.as_ref()
    }

    /// The column and the segment's pool, creating the pool on first use.
    pub(crate) fn column_and_pool_mut(
        &mut self,
        col: usize,
    ) -> Result<(&mut Column<'a>, &mut StringPool), IngestError> {
        let num_columns = self.columns.len();
        let column = self.columns.get_mut(col).ok_or_else(|| {
            IngestError::OutOfBounds(format!(
                "Column {} requested from segment with {} columns",
                col, num_columns
            ))
        })?;
        let pool = self.string_pool.get_or_insert_with(StringPool::new);
        Ok((column, pool))
    }

    /// Every column of a segment holds the slice's row count. Once a column
    /// has rows, a write of any other length is rejected.
    pub(crate) fn check_row_count(&self, col: usize, rows: usize) -> Result<(), IngestError> {
        if self.row_count != 0 && rows != self.row_count {
            return Err(IngestError::SchemaMismatch(format!(
                "Column {} writes {} rows into a segment of {} rows",
                col, rows, self.row_count
            )));
        }
        Ok(())
    }

    pub(crate) fn note_rows_written(&mut self, rows: usize) {
        self.row_count = rows;
    }

    /// The pooled string at `row` of a dynamic string column; `None` for the
    /// missing and NaN sentinels.
    pub fn string_at(&self, col: usize, row: usize) -> Result<Option<&[u8]>, IngestError> {
        let column = self.column(col)?;
        if !column.data_type().is_dynamic_string() {
            return Err(IngestError::SchemaMismatch(format!(
                "Column {} of {} is not a pooled string column",
                col,
                column.data_type()
            )));
        }
        let offset = column
            .value_at::<StringOffset>(row)?
            .ok_or_else(|| IngestError::InternalError("String columns are never sparse".into()))?;
        if !is_a_string(offset) {
            return Ok(None);
        }
        let pool = self
            .string_pool
            .as_ref()
            .ok_or_else(|| IngestError::InternalError(format!(
                "Column {} holds string offsets but the segment has no pool",
                col
            )))?;
        pool.get_const_view(offset).map(Some)
    }
}
