//! This module defines the canonical, closed set of runtime type tags used
//! throughout the ingestion pipeline, and the single exhaustive entry point that
//! turns a runtime tag into a statically-typed dispatch arm.

use crate::error::IngestError;
use crate::traits::{
    Float32Tag, Float64Tag, Int16Tag, Int32Tag, Int64Tag, Int8Tag, NanosecondsUtc64Tag,
    StaticTypeTag, UInt16Tag, UInt32Tag, UInt64Tag, UInt8Tag,
};
use arrow::datatypes::{DataType as ArrowDataType, TimeUnit};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width in bytes of a pooled string offset, as stored in dynamic string columns.
pub const STRING_OFFSET_WIDTH: usize = std::mem::size_of::<u64>();

/// The runtime type tag carried by both declared column types and tensors.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum DataType {
    UInt8 = 1,
    UInt16 = 2,
    UInt32 = 3,
    UInt64 = 4,
    Int8 = 5,
    Int16 = 6,
    Int32 = 7,
    Int64 = 8,
    Float32 = 9,
    Float64 = 10,
    Bool8 = 11,
    NanosecondsUtc64 = 12,
    AsciiFixed64 = 13,
    AsciiDynamic64 = 14,
    Utf8Fixed64 = 15,
    Utf8Dynamic64 = 16,
    Empty = 17,
}

/// The dispatch arms of [`DataType::visit`].
///
/// Numeric arms are generic over the static tag so the implementor sees the raw
/// element type and the tag it was selected for.
pub trait TypeVisitor {
    type Output;

    fn visit_numeric<T: StaticTypeTag>(self) -> Self::Output;
    fn visit_bool(self) -> Self::Output;
    fn visit_fixed_string(self, tag: DataType) -> Self::Output;
    fn visit_dynamic_string(self, tag: DataType) -> Self::Output;
    fn visit_empty(self) -> Self::Output;
}

impl DataType {
    /// Dispatches to the visitor arm matching this tag.
    pub fn visit<V: TypeVisitor>(self, visitor: V) -> V::Output {
        match self {
            Self::UInt8 => visitor.visit_numeric::<UInt8Tag>(),
            Self::UInt16 => visitor.visit_numeric::<UInt16Tag>(),
            Self::UInt32 => visitor.visit_numeric::<UInt32Tag>(),
            Self::UInt64 => visitor.visit_numeric::<UInt64Tag>(),
            Self::Int8 => visitor.visit_numeric::<Int8Tag>(),
            Self::Int16 => visitor.visit_numeric::<Int16Tag>(),
            Self::Int32 => visitor.visit_numeric::<Int32Tag>(),
            Self::Int64 => visitor.visit_numeric::<Int64Tag>(),
            Self::Float32 => visitor.visit_numeric::<Float32Tag>(),
            Self::Float64 => visitor.visit_numeric::<Float64Tag>(),
            Self::NanosecondsUtc64 => visitor.visit_numeric::<NanosecondsUtc64Tag>(),
            Self::Bool8 => visitor.visit_bool(),
            Self::AsciiFixed64 | Self::Utf8Fixed64 => visitor.visit_fixed_string(self),
            Self::AsciiDynamic64 | Self::Utf8Dynamic64 => visitor.visit_dynamic_string(self),
            Self::Empty => visitor.visit_empty(),
        }
    }

    /// Decodes a wire tag supplied by the host boundary.
    pub fn from_u8(code: u8) -> Result<Self, IngestError> {
        let dt = match code {
            1 => Self::UInt8,
            2 => Self::UInt16,
            3 => Self::UInt32,
            4 => Self::UInt64,
            5 => Self::Int8,
            6 => Self::Int16,
            7 => Self::Int32,
            8 => Self::Int64,
            9 => Self::Float32,
            10 => Self::Float64,
            11 => Self::Bool8,
            12 => Self::NanosecondsUtc64,
            13 => Self::AsciiFixed64,
            14 => Self::AsciiDynamic64,
            15 => Self::Utf8Fixed64,
            16 => Self::Utf8Dynamic64,
            17 => Self::Empty,
            other => {
                return Err(IngestError::UnsupportedType(format!(
                    "Unknown type tag {}",
                    other
                )))
            }
        };
        Ok(dt)
    }

    /// Element width in bytes for types whose width does not depend on the data.
    /// Fixed-width strings take their width from the tensor and return `None`.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            Self::UInt8 | Self::Int8 | Self::Bool8 => Some(1),
            Self::UInt16 | Self::Int16 => Some(2),
            Self::UInt32 | Self::Int32 | Self::Float32 => Some(4),
            Self::UInt64 | Self::Int64 | Self::Float64 | Self::NanosecondsUtc64 => Some(8),
            Self::AsciiDynamic64 | Self::Utf8Dynamic64 => Some(STRING_OFFSET_WIDTH),
            Self::AsciiFixed64 | Self::Utf8Fixed64 => None,
            Self::Empty => Some(0),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::UInt8
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
                | Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Float32
                | Self::Float64
                | Self::NanosecondsUtc64
        )
    }

    /// Returns `true` if the data type is a floating-point number.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Self::Bool8)
    }

    /// Strings of either width.
    pub fn is_sequence(&self) -> bool {
        self.is_fixed_string() || self.is_dynamic_string()
    }

    pub fn is_fixed_string(&self) -> bool {
        matches!(self, Self::AsciiFixed64 | Self::Utf8Fixed64)
    }

    /// Variable-length strings, stored as offsets into a string pool.
    pub fn is_dynamic_string(&self) -> bool {
        matches!(self, Self::AsciiDynamic64 | Self::Utf8Dynamic64)
    }

    pub fn is_utf(&self) -> bool {
        matches!(self, Self::Utf8Fixed64 | Self::Utf8Dynamic64)
    }

    pub fn is_empty_type(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Converts an Arrow `DataType` into a tickstore `DataType`.
    pub fn from_arrow_type(arrow_type: &ArrowDataType) -> Result<Self, IngestError> {
        match arrow_type {
            ArrowDataType::Int8 => Ok(Self::Int8),
            ArrowDataType::Int16 => Ok(Self::Int16),
            ArrowDataType::Int32 => Ok(Self::Int32),
            ArrowDataType::Int64 => Ok(Self::Int64),
            ArrowDataType::UInt8 => Ok(Self::UInt8),
            ArrowDataType::UInt16 => Ok(Self::UInt16),
            ArrowDataType::UInt32 => Ok(Self::UInt32),
            ArrowDataType::UInt64 => Ok(Self::UInt64),
            ArrowDataType::Float32 => Ok(Self::Float32),
            ArrowDataType::Float64 => Ok(Self::Float64),
            ArrowDataType::Boolean => Ok(Self::Bool8),
            ArrowDataType::Timestamp(TimeUnit::Nanosecond, _) => Ok(Self::NanosecondsUtc64),
            ArrowDataType::Utf8 | ArrowDataType::LargeUtf8 => Ok(Self::Utf8Dynamic64),
            ArrowDataType::Binary | ArrowDataType::LargeBinary => Ok(Self::AsciiDynamic64),
            ArrowDataType::FixedSizeBinary(_) => Ok(Self::AsciiFixed64),
            ArrowDataType::Null => Ok(Self::Empty),
            dt => Err(IngestError::UnsupportedType(format!(
                "Cannot convert Arrow type {:?} to a tickstore DataType",
                dt
            ))),
        }
    }

    /// Converts a `DataType` into the Arrow `DataType` used for schema export.
    /// `fixed_width` is only consulted for fixed-width strings.
    pub fn to_arrow_type(&self, fixed_width: Option<usize>) -> ArrowDataType {
        match self {
            Self::Int8 => ArrowDataType::Int8,
            Self::Int16 => ArrowDataType::Int16,
            Self::Int32 => ArrowDataType::Int32,
            Self::Int64 => ArrowDataType::Int64,
            Self::UInt8 => ArrowDataType::UInt8,
            Self::UInt16 => ArrowDataType::UInt16,
            Self::UInt32 => ArrowDataType::UInt32,
            Self::UInt64 => ArrowDataType::UInt64,
            Self::Float32 => ArrowDataType::Float32,
            Self::Float64 => ArrowDataType::Float64,
            Self::Bool8 => ArrowDataType::Boolean,
            Self::NanosecondsUtc64 => {
                ArrowDataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into()))
            }
            Self::AsciiDynamic64 => ArrowDataType::Binary,
            Self::Utf8Dynamic64 => ArrowDataType::Utf8,
            Self::AsciiFixed64 | Self::Utf8Fixed64 => match fixed_width {
                Some(width) => ArrowDataType::FixedSizeBinary(width as i32),
                None => ArrowDataType::Binary,
            },
            Self::Empty => ArrowDataType::Null,
        }
    }
}

/// Provides the canonical string representation for a `DataType`.
impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Describe;

    impl TypeVisitor for Describe {
        type Output = String;

        fn visit_numeric<T: StaticTypeTag>(self) -> String {
            format!("numeric:{}:{}", T::DATA_TYPE, std::mem::size_of::<T::Raw>())
        }
        fn visit_bool(self) -> String {
            "bool".into()
        }
        fn visit_fixed_string(self, tag: DataType) -> String {
            format!("fixed:{}", tag)
        }
        fn visit_dynamic_string(self, tag: DataType) -> String {
            format!("dynamic:{}", tag)
        }
        fn visit_empty(self) -> String {
            "empty".into()
        }
    }

    #[test]
    fn test_visit_selects_matching_static_tag() {
        assert_eq!(DataType::Float64.visit(Describe), "numeric:Float64:8");
        assert_eq!(DataType::UInt16.visit(Describe), "numeric:UInt16:2");
        assert_eq!(
            DataType::NanosecondsUtc64.visit(Describe),
            "numeric:NanosecondsUtc64:8"
        );
        assert_eq!(DataType::Bool8.visit(Describe), "bool");
        assert_eq!(DataType::Utf8Fixed64.visit(Describe), "fixed:Utf8Fixed64");
        assert_eq!(
            DataType::AsciiDynamic64.visit(Describe),
            "dynamic:AsciiDynamic64"
        );
        assert_eq!(DataType::Empty.visit(Describe), "empty");
    }

    #[test]
    fn test_wire_tag_roundtrip_and_unknown() {
        for code in 1..=17u8 {
            let dt = DataType::from_u8(code).unwrap();
            assert_eq!(dt as u8, code);
        }
        assert!(matches!(
            DataType::from_u8(99),
            Err(IngestError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_arrow_mapping() {
        assert_eq!(
            DataType::from_arrow_type(&ArrowDataType::Utf8).unwrap(),
            DataType::Utf8Dynamic64
        );
        assert_eq!(DataType::Bool8.to_arrow_type(None), ArrowDataType::Boolean);
        assert_eq!(
            DataType::AsciiFixed64.to_arrow_type(Some(6)),
            ArrowDataType::FixedSizeBinary(6)
        );
        assert!(DataType::from_arrow_type(&ArrowDataType::Date32).is_err());
    }
}
