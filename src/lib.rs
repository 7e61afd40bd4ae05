//! This file is the root of the `tickstore` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of our library (`pipeline`, `column_store`, etc.)
//!     so the Rust compiler knows they exist.
//! 2.  Re-exporting the small set of types a host boundary needs to ingest a frame:
//!     tensors in, a reconciled pipeline context and a frame descriptor out.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
mod observability; // Make macros available throughout the crate

pub mod column_store;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod tensor;
pub mod traits;
pub mod types;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use config::IngestConfig;
pub use error::{IngestError, StringEncodingError};
pub use observability::init_logging;
pub use pipeline::{
    descriptor_from_pipeline_context, write_column, write_frame, DecodeLock, FrameDescriptor,
    InputTensorFrame, PipelineContext,
};
pub use tensor::{NativeTensor, StringObject};
pub use types::{DataType, StreamDescriptor};
