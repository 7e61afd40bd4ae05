//! The engine's in-memory column store: owned buffers, columns, string pools
//! and the segments that group them per physical slice.

pub mod buffer;
pub mod column;
pub mod segment;
pub mod string_pool;

pub use buffer::OwnedBuffer;
pub use column::{Column, ColumnData, SparseMap};
pub use segment::Segment;
pub use string_pool::{
    is_a_string, OffsetString, StringOffset, StringPool, NAN_PLACEHOLDER, NOT_A_STRING,
};
