//! Materializes a row range of a strided tensor into freshly owned, contiguous
//! storage.
//!
//! Elements are visited in C (row-major) order across every dimension, so the
//! output is exactly what a contiguous copy of the same logical rows would hold.
//! The output never aliases the source.

use bytemuck::Pod;

use super::{NativeTensor, StringObject};
use crate::column_store::OwnedBuffer;
use crate::error::IngestError;

//==================================================================================
// 1. Private Core Logic
//==================================================================================

/// Calls `visit` with the byte offset of every element, dimension by dimension.
fn walk<F>(shape: &[usize], strides: &[usize], base: usize, visit: &mut F) -> Result<(), IngestError>
where
    F: FnMut(usize) -> Result<(), IngestError>,
{
    match (shape.split_first(), strides.split_first()) {
        (None, _) => visit(base),
        (Some((&n, inner_shape)), Some((&stride, inner_strides))) => {
            for i in 0..n {
                walk(inner_shape, inner_strides, base + i * stride, visit)?;
            }
            Ok(())
        }
        (Some(_), None) => Err(IngestError::InternalError(
            "Tensor has fewer strides than dimensions".into(),
        )),
    }
}

/// Walks rows `[first_row, first_row + rows)` of `tensor`.
fn walk_rows<F>(
    tensor: &NativeTensor<'_>,
    first_row: usize,
    rows: usize,
    mut visit: F,
) -> Result<(), IngestError>
where
    F: FnMut(usize) -> Result<(), IngestError>,
{
    tensor.check_rows(first_row, rows)?;
    let strides = tensor.strides();
    let mut shape = tensor.shape().to_vec();
    shape[0] = rows;
    walk(&shape, strides, first_row * strides[0], &mut visit)
}

//==================================================================================
// 2. Public API
//==================================================================================

/// Copies rows `[first_row, first_row + rows)` into a new buffer of
/// `rows × row_elements × size_of::<T>()` bytes.
pub fn flatten_tensor<T: Pod>(
    tensor: &NativeTensor<'_>,
    first_row: usize,
    rows: usize,
) -> Result<OwnedBuffer, IngestError> {
    let count = rows * tensor.row_elements();
    let mut buffer = OwnedBuffer::presized(count * std::mem::size_of::<T>());
    {
        let dst = buffer.typed_mut::<T>()?;
        let mut pos = 0;
        walk_rows(tensor, first_row, rows, |offset| {
            dst[pos] = tensor.pod_at::<T>(offset)?;
            pos += 1;
            Ok(())
        })?;
        debug_assert_eq!(pos, count);
    }

    log_metric!(
        "event" = "flatten_tensor",
        "rows" = &rows,
        "bytes" = &buffer.bytes(),
        "source_stride" = &tensor.strides()[0]
    );
    Ok(buffer)
}

/// Copies the object cells of rows `[first_row, first_row + rows)` into a new
/// contiguous vector.
pub fn flatten_objects<'a>(
    tensor: &NativeTensor<'a>,
    first_row: usize,
    rows: usize,
) -> Result<Vec<StringObject<'a>>, IngestError> {
    let mut cells = Vec::with_capacity(rows * tensor.row_elements());
    walk_rows(tensor, first_row, rows, |offset| {
        cells.push(tensor.object_at(offset)?);
        Ok(())
    })?;
    Ok(cells)
}

//==================================================================================
// 3. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array1, Array2};

    #[test]
    fn test_flatten_transposed_block_in_row_major_order() {
        let block = Array2::from_shape_fn((3, 4), |(r, c)| (r * 10 + c) as i64);
        let transposed = block.t();
        let tensor = NativeTensor::from_view(transposed.view()).unwrap();

        let flat = flatten_tensor::<i64>(&tensor, 1, 2).unwrap();
        let expected: Vec<i64> = transposed
            .slice(s![1..3, ..])
            .iter()
            .copied()
            .collect();
        assert_eq!(flat.bytes(), 2 * 3 * 8);
        assert_eq!(flat.typed::<i64>().unwrap(), expected.as_slice());
    }

    #[test]
    fn test_flatten_stepped_column() {
        let data = Array1::from_iter((0..20).map(|v| v as f32));
        let stepped = data.slice(s![..;3]);
        let tensor = NativeTensor::from_view(stepped).unwrap();
        assert!(!tensor.is_c_style(4));

        let flat = flatten_tensor::<f32>(&tensor, 2, 4).unwrap();
        assert_eq!(flat.typed::<f32>().unwrap(), &[6.0, 9.0, 12.0, 15.0]);
        assert_ne!(flat.data().as_ptr(), tensor.ptr);
    }

    #[test]
    fn test_flatten_rejects_out_of_range_rows() {
        let data = [1u16, 2, 3];
        let tensor = NativeTensor::from_slice(&data);
        assert!(matches!(
            flatten_tensor::<u16>(&tensor, 2, 2),
            Err(IngestError::OutOfBounds(_))
        ));
        assert_eq!(flatten_tensor::<u16>(&tensor, 3, 0).unwrap().bytes(), 0);
    }

    #[test]
    fn test_flatten_objects_keeps_cells() {
        let first = b"a".as_slice();
        let block = Array2::from_shape_fn((3, 2), |(r, _)| {
            if r == 1 {
                StringObject::NaN
            } else {
                StringObject::Bytes(first)
            }
        });
        let tensor = NativeTensor::from_view(block.slice(s![.., 0])).unwrap();
        let cells = flatten_objects(&tensor, 0, 3).unwrap();
        assert_eq!(
            cells,
            vec![StringObject::Bytes(first), StringObject::NaN, StringObject::Bytes(first)]
        );
    }
}
