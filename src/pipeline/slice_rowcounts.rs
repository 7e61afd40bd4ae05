//! Row-count bookkeeping over a frame's slice sequence.
//!
//! Slices that cover the same rows with different column groups form one row
//! group and share one row range. Counting walks the sequence once. A slice
//! starts a new group when its row range differs from its predecessor's, or
//! when its column range already appeared in the current group: independent
//! producers may number their row blocks from 0, so equal provisional ranges
//! alone do not mean the same rows. The slices of a row group must be adjacent.

use super::context::PipelineContext;
use super::frame_slice::{ColRange, FrameSlice, RowRange, SliceAndKey};

/// The row group currently being walked.
#[derive(Debug, Default)]
struct GroupTracker {
    row_range: Option<RowRange>,
    col_ranges: Vec<ColRange>,
}

impl GroupTracker {
    fn starts_group(&mut self, slice: &FrameSlice) -> bool {
        let starts = self.row_range != Some(slice.row_range)
            || self.col_ranges.contains(&slice.col_range);
        if starts {
            self.row_range = Some(slice.row_range);
            self.col_ranges.clear();
        }
        self.col_ranges.push(slice.col_range);
        starts
    }
}

/// Iterates over the row span of each row group, in sequence order.
fn group_spans<'s>(slices: &'s [SliceAndKey<'_>]) -> impl Iterator<Item = usize> + 's {
    let mut tracker = GroupTracker::default();
    slices.iter().filter_map(move |sk| {
        tracker
            .starts_group(&sk.slice)
            .then(|| sk.slice.row_range.diff())
    })
}

/// Total distinct rows across a slice sequence.
pub fn get_slice_rowcounts(slices: &[SliceAndKey<'_>]) -> usize {
    group_spans(slices).sum()
}

/// Rebases `slices` so that row groups are contiguous from `base`, keeping each
/// group's span. Returns the row just past the last group.
fn rebase_row_ranges(slices: &mut [SliceAndKey<'_>], base: usize) -> usize {
    let mut offset = base;
    let mut tracker = GroupTracker::default();
    let mut current = RowRange::new(base, base);
    for sk in slices.iter_mut() {
        if tracker.starts_group(&sk.slice) {
            current = RowRange::new(offset, offset + sk.slice.row_range.diff());
            offset = current.end;
        }
        sk.slice.row_range = current;
    }
    offset
}

/// Renumbers row ranges so that row groups are contiguous from 0, and returns
/// the total row count.
pub fn adjust_slice_rowcounts(slices: &mut [SliceAndKey<'_>]) -> usize {
    let total = rebase_row_ranges(slices, 0);
    log::debug!("Rebased {} slices from 0, {} rows", slices.len(), total);
    total
}

/// Reconciles a context in place: row groups become contiguous from the first
/// slice's existing start, and the context's total row count is updated.
pub fn adjust_context_rowcounts(pipeline_context: &mut PipelineContext<'_>) -> usize {
    let base = pipeline_context
        .slice_and_keys
        .first()
        .map(|sk| sk.slice.row_range.start)
        .unwrap_or(0);
    let end = rebase_row_ranges(&mut pipeline_context.slice_and_keys, base);
    let total_rows = end - base;
    pipeline_context.set_total_rows(total_rows);
    log::debug!(
        "Reconciled '{}': {} slices, rows [{}, {})",
        pipeline_context.desc.stream_id,
        pipeline_context.len(),
        base,
        end
    );
    total_rows
}

/// The first row of the sequence and its grouped row count; `(0, 0)` for an
/// empty sequence.
pub fn offset_and_row_count(pipeline_context: &PipelineContext<'_>) -> (usize, usize) {
    match pipeline_context.slice_and_keys.first() {
        None => (0, 0),
        Some(first) => (
            first.slice.row_range.start,
            get_slice_rowcounts(&pipeline_context.slice_and_keys),
        ),
    }
}
