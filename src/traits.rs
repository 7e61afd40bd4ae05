//! This module defines the static type tags that pair a runtime [`DataType`] with
//! the raw element type stored in column buffers.

use bytemuck::Pod;
use num_traits::Float;
use std::fmt::Debug;

use crate::types::DataType;

/// A zero-sized marker linking a runtime tag to its raw storage type.
///
/// The column writer receives one of these per dispatch arm and checks that the
/// arm's `DATA_TYPE` agrees with both the declared column type and the tensor.
pub trait StaticTypeTag: Copy + Send + Sync + 'static {
    type Raw: Pod + Debug + Send + Sync;
    const DATA_TYPE: DataType;

    /// Whether `value` counts as absent in a sparse column.
    fn is_missing(_value: Self::Raw) -> bool {
        false
    }
}

macro_rules! impl_static_tag {
    ($Tag:ident, $Raw:ty, $dt:ident) => {
        #[derive(Debug, Clone, Copy)]
        pub struct $Tag;

        impl StaticTypeTag for $Tag {
            type Raw = $Raw;
            const DATA_TYPE: DataType = DataType::$dt;
        }
    };
}

macro_rules! impl_float_tag {
    ($Tag:ident, $Raw:ty, $dt:ident) => {
        #[derive(Debug, Clone, Copy)]
        pub struct $Tag;

        impl StaticTypeTag for $Tag {
            type Raw = $Raw;
            const DATA_TYPE: DataType = DataType::$dt;

            fn is_missing(value: $Raw) -> bool {
                Float::is_nan(value)
            }
        }
    };
}

impl_static_tag!(UInt8Tag, u8, UInt8);
impl_static_tag!(UInt16Tag, u16, UInt16);
impl_static_tag!(UInt32Tag, u32, UInt32);
impl_static_tag!(UInt64Tag, u64, UInt64);
impl_static_tag!(Int8Tag, i8, Int8);
impl_static_tag!(Int16Tag, i16, Int16);
impl_static_tag!(Int32Tag, i32, Int32);
impl_static_tag!(Int64Tag, i64, Int64);
impl_static_tag!(NanosecondsUtc64Tag, i64, NanosecondsUtc64);
// Booleans are stored as one byte per row.
impl_static_tag!(Bool8Tag, u8, Bool8);
impl_float_tag!(Float32Tag, f32, Float32);
impl_float_tag!(Float64Tag, f64, Float64);
