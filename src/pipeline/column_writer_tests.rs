use ndarray::{s, Array1, Array2};

use crate::column_store::{Segment, NAN_PLACEHOLDER, NOT_A_STRING};
use crate::error::IngestError;
use crate::pipeline::column_writer::{write_column, WriteOptions};
use crate::pipeline::string_encoding::DecodeLock;
use crate::tensor::{NativeTensor, StringObject};
use crate::types::{DataType, FieldDescriptor, IndexDescriptor, StreamDescriptor};

// Test Helpers
fn segment_of<'a>(data_type: DataType) -> Segment<'a> {
    Segment::new(StreamDescriptor::new(
        "test_stream",
        IndexDescriptor::row_count(),
        vec![FieldDescriptor::new("value", data_type)],
    ))
}

fn wide(s: &str) -> Vec<u32> {
    s.chars().map(|c| c as u32).collect()
}

fn options(lock: &DecodeLock, sparsify_floats: bool) -> WriteOptions<'_> {
    WriteOptions {
        sparsify_floats,
        decode_lock: lock,
    }
}

//==================================================================================
// Numeric & Boolean Columns
//==================================================================================

#[test]
fn test_contiguous_numeric_is_zero_copy() {
    let source: Vec<i64> = (0..16).map(|i| i * 3 - 7).collect();
    let tensor = NativeTensor::from_slice(&source);
    let mut segment = segment_of(DataType::Int64);
    let lock = DecodeLock::new();

    let outcome = write_column(&mut segment, 0, DataType::Int64, &tensor, 0, 16, &options(&lock, false)).unwrap();
    assert!(outcome.is_none());

    let column = segment.column(0).unwrap();
    assert!(column.is_external());
    assert_eq!(column.values::<i64>().unwrap(), source.as_slice());
    assert_eq!(column.bytes().as_ptr(), source.as_ptr() as *const u8);
    assert_eq!(segment.row_count(), 16);
}

#[test]
fn test_zero_copy_respects_source_row() {
    let source = [1.0f32, 2.0, 3.0, 4.0, 5.0];
    let tensor = NativeTensor::from_slice(&source);
    let mut segment = segment_of(DataType::Float32);
    let lock = DecodeLock::new();

    write_column(&mut segment, 0, DataType::Float32, &tensor, 2, 3, &options(&lock, false)).unwrap();
    let column = segment.column(0).unwrap();
    assert!(column.is_external());
    assert_eq!(column.values::<f32>().unwrap(), &[3.0, 4.0, 5.0]);
}

#[test]
fn test_bool_column_is_zero_copy() {
    let source = [true, false, false, true];
    let tensor = NativeTensor::from_slice(&source);
    let mut segment = segment_of(DataType::Bool8);
    let lock = DecodeLock::new();

    write_column(&mut segment, 0, DataType::Bool8, &tensor, 0, 4, &options(&lock, false)).unwrap();
    let column = segment.column(0).unwrap();
    assert!(column.is_external());
    assert_eq!(column.values::<u8>().unwrap(), &[1, 0, 0, 1]);
}

#[test]
fn test_strided_numeric_is_flattened() {
    let block = Array2::from_shape_fn((6, 3), |(r, c)| (r * 100 + c) as u32);
    let column_view = block.slice(s![.., 2]);
    let tensor = NativeTensor::from_view(column_view).unwrap();
    let mut segment = segment_of(DataType::UInt32);
    let lock = DecodeLock::new();

    write_column(&mut segment, 0, DataType::UInt32, &tensor, 1, 4, &options(&lock, false)).unwrap();
    let column = segment.column(0).unwrap();
    assert!(!column.is_external());
    assert_eq!(column.row_count(), 4);
    assert_eq!(column.values::<u32>().unwrap(), &[102, 202, 302, 402]);
}

#[test]
fn test_timestamp_column_needs_retagged_tensor() {
    let stamps = [1_700_000_000_000_000_000i64, 1_700_000_000_000_000_001];
    let mut segment = segment_of(DataType::NanosecondsUtc64);
    let lock = DecodeLock::new();

    let raw = NativeTensor::from_slice(&stamps);
    let err = write_column(&mut segment, 0, DataType::NanosecondsUtc64, &raw, 0, 2, &options(&lock, false)).unwrap_err();
    assert!(matches!(err, IngestError::SchemaMismatch(_)));

    let tagged = raw.with_data_type(DataType::NanosecondsUtc64).unwrap();
    write_column(&mut segment, 0, DataType::NanosecondsUtc64, &tagged, 0, 2, &options(&lock, false)).unwrap();
    assert_eq!(segment.column(0).unwrap().values::<i64>().unwrap(), &stamps);
}

#[test]
fn test_schema_mismatch_and_bounds() {
    let source = [1i32, 2, 3];
    let tensor = NativeTensor::from_slice(&source);
    let mut segment = segment_of(DataType::Int32);
    let lock = DecodeLock::new();

    let err = write_column(&mut segment, 0, DataType::Int64, &tensor, 0, 3, &options(&lock, false)).unwrap_err();
    assert!(matches!(err, IngestError::SchemaMismatch(_)));

    let err = write_column(&mut segment, 0, DataType::Int32, &tensor, 2, 2, &options(&lock, false)).unwrap_err();
    assert!(matches!(err, IngestError::OutOfBounds(_)));
    assert!(!segment.column(0).unwrap().is_allocated());
}

#[test]
fn test_multi_dimensional_tensor_is_unsupported() {
    let block = Array2::<f64>::zeros((4, 2));
    let tensor = NativeTensor::from_view(block.view()).unwrap();
    let mut segment = segment_of(DataType::Float64);
    let lock = DecodeLock::new();

    let err = write_column(&mut segment, 0, DataType::Float64, &tensor, 0, 4, &options(&lock, false)).unwrap_err();
    assert!(matches!(err, IngestError::UnsupportedType(_)));
}

#[test]
fn test_columns_of_a_segment_share_row_count() {
    let first = [1i64, 2, 3];
    let second = [10i64, 20];
    let mut segment = Segment::new(StreamDescriptor::new(
        "test_stream",
        IndexDescriptor::row_count(),
        vec![
            FieldDescriptor::new("a", DataType::Int64),
            FieldDescriptor::new("b", DataType::Int64),
        ],
    ));
    let lock = DecodeLock::new();

    write_column(&mut segment, 0, DataType::Int64, &NativeTensor::from_slice(&first), 0, 3, &options(&lock, false)).unwrap();
    let err = write_column(&mut segment, 1, DataType::Int64, &NativeTensor::from_slice(&second), 0, 2, &options(&lock, false)).unwrap_err();
    assert!(matches!(err, IngestError::SchemaMismatch(_)));
    assert!(!segment.column(1).unwrap().is_allocated());
    assert_eq!(segment.row_count(), 3);
}

//==================================================================================
// Sparse Float Columns
//==================================================================================

#[test]
fn test_sparse_bitmap_marks_non_nan_rows() {
    let source = [1.0f64, f64::NAN, 3.0, f64::NAN, f64::NAN, 6.0];
    let tensor = NativeTensor::from_slice(&source);
    let mut segment = segment_of(DataType::Float64);
    let lock = DecodeLock::new();

    write_column(&mut segment, 0, DataType::Float64, &tensor, 0, 6, &options(&lock, true)).unwrap();
    let column = segment.column(0).unwrap();
    assert!(column.is_sparse());
    assert_eq!(column.values::<f64>().unwrap(), &[1.0, 3.0, 6.0]);

    let map = column.sparse_map().unwrap();
    let present: Vec<bool> = map.iter().map(|b| *b).collect();
    assert_eq!(present, vec![true, false, true, false, false, true]);
    assert_eq!(column.value_at::<f64>(5).unwrap(), Some(6.0));
    assert_eq!(column.value_at::<f64>(1).unwrap(), None);
}

#[test]
fn test_sparsify_on_integer_column_leaves_no_write() {
    let source = [1i32, 2, 3];
    let tensor = NativeTensor::from_slice(&source);
    let mut segment = segment_of(DataType::Int32);
    let lock = DecodeLock::new();

    let err = write_column(&mut segment, 0, DataType::Int32, &tensor, 0, 3, &options(&lock, true)).unwrap_err();
    assert!(matches!(err, IngestError::SparsifyTypeError(DataType::Int32)));
    let column = segment.column(0).unwrap();
    assert!(!column.is_allocated());
    assert_eq!(column.row_count(), 0);
    assert_eq!(segment.row_count(), 0);
}

//==================================================================================
// String Columns
//==================================================================================

#[test]
fn test_fixed_strings_are_copied_at_stride() {
    let records = b"AAPL__MSFT__GOOG__";
    let tensor = NativeTensor::from_fixed_strings(records, 4, 6, 3, DataType::AsciiFixed64).unwrap();
    let mut segment = segment_of(DataType::AsciiFixed64);
    let lock = DecodeLock::new();

    write_column(&mut segment, 0, DataType::AsciiFixed64, &tensor, 1, 2, &options(&lock, false)).unwrap();
    let column = segment.column(0).unwrap();
    assert!(!segment.has_string_pool());
    assert_eq!(column.width(), 4);
    assert_eq!(column.fixed_string_at(0).unwrap(), b"MSFT");
    assert_eq!(column.fixed_string_at(1).unwrap(), b"GOOG");
}

#[test]
fn test_dynamic_strings_are_interned() {
    let cells = [
        StringObject::Bytes(b"buy"),
        StringObject::None,
        StringObject::Bytes(b"sell"),
        StringObject::NaN,
        StringObject::Bytes(b"buy"),
    ];
    let tensor = NativeTensor::from_slice(&cells);
    let mut segment = segment_of(DataType::Utf8Dynamic64);
    let lock = DecodeLock::new();

    let outcome = write_column(&mut segment, 0, DataType::Utf8Dynamic64, &tensor, 0, 5, &options(&lock, false)).unwrap();
    assert!(outcome.is_none());

    let offsets = segment.column(0).unwrap().values::<u64>().unwrap().to_vec();
    assert_eq!(offsets[0], offsets[4]);
    assert_ne!(offsets[0], offsets[2]);
    assert_eq!(offsets[1], NOT_A_STRING);
    assert_eq!(offsets[3], NAN_PLACEHOLDER);

    assert_eq!(segment.string_pool().unwrap().len(), 2);
    assert_eq!(segment.string_at(0, 2).unwrap(), Some(&b"sell"[..]));
    assert_eq!(segment.string_at(0, 3).unwrap(), None);
    assert_eq!(lock.acquisitions(), 0);
}

#[test]
fn test_strided_object_cells_are_flattened() {
    let cells = Array1::from(vec![
        StringObject::Bytes(b"a"),
        StringObject::Bytes(b"skip"),
        StringObject::Bytes(b"b"),
        StringObject::Bytes(b"skip"),
        StringObject::Bytes(b"c"),
    ]);
    let every_other = cells.slice(s![..;2]);
    let tensor = NativeTensor::from_view(every_other)
        .unwrap()
        .with_data_type(DataType::AsciiDynamic64)
        .unwrap();
    let mut segment = segment_of(DataType::AsciiDynamic64);
    let lock = DecodeLock::new();

    write_column(&mut segment, 0, DataType::AsciiDynamic64, &tensor, 0, 3, &options(&lock, false)).unwrap();
    assert_eq!(segment.string_at(0, 0).unwrap(), Some(&b"a"[..]));
    assert_eq!(segment.string_at(0, 2).unwrap(), Some(&b"c"[..]));
    assert_eq!(segment.string_pool().unwrap().len(), 3);
}

#[test]
fn test_encoding_error_carries_slice_row_and_releases_lock() {
    let ok = wide("Zürich");
    let bad = [0xD800u32];
    let cells = [
        StringObject::Bytes(b"frame row 0"),
        StringObject::Bytes(b"frame row 1"),
        StringObject::Wide(&ok),
        StringObject::Bytes(b"fine"),
        StringObject::Wide(&bad),
        StringObject::Bytes(b"never reached"),
    ];
    let tensor = NativeTensor::from_slice(&cells);
    let mut segment = segment_of(DataType::Utf8Dynamic64);
    let lock = DecodeLock::new();

    // Start at frame row 2: the failing cell is frame row 4, slice row 2.
    let outcome = write_column(&mut segment, 0, DataType::Utf8Dynamic64, &tensor, 2, 4, &options(&lock, false)).unwrap();
    let error = outcome.expect("the surrogate must fail to decode");
    assert_eq!(error.row_index_in_slice, 2);
    assert_eq!(lock.acquisitions(), 1);
    assert!(!lock.is_held());
    assert_eq!(segment.row_count(), 0);

    let promoted = error.into_frame_error("city", 2);
    assert!(matches!(promoted, IngestError::StringEncoding { row: 4, .. }));
}

#[test]
fn test_non_ascii_in_ascii_column_is_encoding_error() {
    let accented = wide("née");
    let cells = [StringObject::Bytes(b"plain"), StringObject::Wide(&accented)];
    let tensor = NativeTensor::from_slice(&cells)
        .with_data_type(DataType::AsciiDynamic64)
        .unwrap();
    let mut segment = segment_of(DataType::AsciiDynamic64);
    let lock = DecodeLock::new();

    let outcome = write_column(&mut segment, 0, DataType::AsciiDynamic64, &tensor, 0, 2, &options(&lock, false)).unwrap();
    assert_eq!(outcome.map(|e| e.row_index_in_slice), Some(1));
    assert_eq!(lock.acquisitions(), 0);
}

//==================================================================================
// Empty Columns
//==================================================================================

#[test]
fn test_empty_column_records_rows_only() {
    let placeholder = [0u8; 1];
    // SAFETY: zero-width elements at stride 0 never read the placeholder.
    let tensor = unsafe {
        NativeTensor::from_raw_parts(placeholder.as_ptr(), DataType::Empty, 0, false, vec![3], vec![0])
    }
    .unwrap();
    let mut segment = segment_of(DataType::Empty);
    let lock = DecodeLock::new();

    write_column(&mut segment, 0, DataType::Empty, &tensor, 0, 3, &options(&lock, false)).unwrap();
    let column = segment.column(0).unwrap();
    assert_eq!(column.row_count(), 3);
    assert!(!column.is_allocated());
    assert_eq!(segment.row_count(), 3);
}
