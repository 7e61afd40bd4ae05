//! Read-only views over externally owned, possibly strided array data.
//!
//! A [`NativeTensor`] never owns or mutates the memory it describes and never
//! outlives it: the lifetime `'a` ties the view to the caller's buffer. Data is
//! addressed through per-dimension byte strides, so column-major blocks, stepped
//! slices and fixed-width string records are all expressible without a copy.

use std::marker::PhantomData;

use bytemuck::Pod;
use ndarray::{ArrayView, Dimension};

use crate::error::IngestError;
use crate::types::DataType;

pub mod flatten;

pub use flatten::{flatten_objects, flatten_tensor};

//==================================================================================
// 1. Element Types
//==================================================================================

/// A cell of a variable-length string tensor, as handed over by the host.
///
/// `Wide` carries code points in the host's native wide representation; turning
/// it into UTF-8 is the decode step that may need the shared decode lock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StringObject<'s> {
    None,
    NaN,
    Bytes(&'s [u8]),
    Wide(&'s [u32]),
}

/// Rust element types a tensor can be built from.
pub trait NativeElement: Copy {
    /// The runtime tag a tensor of this element gets unless overridden.
    const DATA_TYPE: DataType;
    /// Whether elements are host objects rather than plain bytes.
    const IS_OBJECT: bool = false;
}

macro_rules! impl_native_element {
    ($($T:ty => $dt:ident),+ $(,)?) => {
        $(
            impl NativeElement for $T {
                const DATA_TYPE: DataType = DataType::$dt;
            }
        )+
    };
}

impl_native_element!(
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    bool => Bool8,
);

impl NativeElement for StringObject<'_> {
    const DATA_TYPE: DataType = DataType::Utf8Dynamic64;
    const IS_OBJECT: bool = true;
}

//==================================================================================
// 2. The Tensor View
//==================================================================================

#[derive(Debug, Clone)]
pub struct NativeTensor<'a> {
    ptr: *const u8,
    // Bytes addressable from `ptr`; every element reachable through shape and
    // strides lies inside `[ptr, ptr + extent)`.
    extent: usize,
    data_type: DataType,
    elsize: usize,
    holds_objects: bool,
    shape: Vec<usize>,
    strides: Vec<usize>,
    _marker: PhantomData<&'a [u8]>,
}

// SAFETY: the view is read-only and the memory it points at is borrowed for
// `'a`; object cells only hold shared references.
unsafe impl Send for NativeTensor<'_> {}
unsafe impl Sync for NativeTensor<'_> {}

fn extent_of(shape: &[usize], strides: &[usize], elsize: usize) -> usize {
    if shape.iter().any(|&n| n == 0) {
        return 0;
    }
    shape
        .iter()
        .zip(strides)
        .map(|(&n, &s)| (n - 1) * s)
        .sum::<usize>()
        + elsize
}

impl<'a> NativeTensor<'a> {
    /// A one-dimensional, contiguous view over `data`.
    pub fn from_slice<T: NativeElement>(data: &'a [T]) -> Self {
        let elsize = std::mem::size_of::<T>();
        Self {
            ptr: data.as_ptr() as *const u8,
            extent: std::mem::size_of_val(data),
            data_type: T::DATA_TYPE,
            elsize,
            holds_objects: T::IS_OBJECT,
            shape: vec![data.len()],
            strides: vec![elsize],
            _marker: PhantomData,
        }
    }

    /// A view over an `ndarray` view, keeping its layout. Negative strides are
    /// rejected; the host must materialize reversed views first.
    pub fn from_view<T: NativeElement, D: Dimension>(
        view: ArrayView<'a, T, D>,
    ) -> Result<Self, IngestError> {
        if view.ndim() == 0 {
            return Err(IngestError::InvalidTensor(
                "Zero-dimensional tensors cannot be written as columns".into(),
            ));
        }
        let elsize = std::mem::size_of::<T>();
        let strides = view
            .strides()
            .iter()
            .map(|&s| {
                usize::try_from(s).map(|s| s * elsize).map_err(|_| {
                    IngestError::InvalidTensor(format!("Negative stride {} is not supported", s))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let shape = view.shape().to_vec();
        Ok(Self {
            ptr: view.as_ptr() as *const u8,
            extent: extent_of(&shape, &strides, elsize),
            data_type: T::DATA_TYPE,
            elsize,
            holds_objects: T::IS_OBJECT,
            shape,
            strides,
            _marker: PhantomData,
        })
    }

    /// `rows` fixed-width string records of `width` bytes, `stride` bytes apart.
    pub fn from_fixed_strings(
        data: &'a [u8],
        width: usize,
        stride: usize,
        rows: usize,
        data_type: DataType,
    ) -> Result<Self, IngestError> {
        if !data_type.is_fixed_string() {
            return Err(IngestError::InvalidTensor(format!(
                "{} is not a fixed-width string type",
                data_type
            )));
        }
        if stride < width {
            return Err(IngestError::InvalidTensor(format!(
                "Stride {} is smaller than the record width {}",
                stride, width
            )));
        }
        let shape = vec![rows];
        let strides = vec![stride];
        let extent = extent_of(&shape, &strides, width);
        if extent > data.len() {
            return Err(IngestError::InvalidTensor(format!(
                "{} records of width {} at stride {} need {} bytes, buffer has {}",
                rows,
                width,
                stride,
                extent,
                data.len()
            )));
        }
        Ok(Self {
            ptr: data.as_ptr(),
            extent,
            data_type,
            elsize: width,
            holds_objects: false,
            shape,
            strides,
            _marker: PhantomData,
        })
    }

    /// Builds a view from raw parts supplied across the host boundary.
    ///
    /// # Safety
    /// `ptr` must point at memory that stays valid and unmodified for `'a`, holds
    /// initialized elements of `elsize` bytes at every offset reachable through
    /// `shape` and `strides`, and is suitably aligned for the element type. When
    /// `holds_objects` is set, every element must be a valid [`StringObject`].
    pub unsafe fn from_raw_parts(
        ptr: *const u8,
        data_type: DataType,
        elsize: usize,
        holds_objects: bool,
        shape: Vec<usize>,
        strides: Vec<usize>,
    ) -> Result<Self, IngestError> {
        if shape.is_empty() || shape.len() != strides.len() {
            return Err(IngestError::InvalidTensor(format!(
                "Shape {:?} and strides {:?} do not describe a tensor",
                shape, strides
            )));
        }
        if holds_objects && elsize != std::mem::size_of::<StringObject<'static>>() {
            return Err(IngestError::InvalidTensor(format!(
                "Object tensors need elements of {} bytes, got {}",
                std::mem::size_of::<StringObject<'static>>(),
                elsize
            )));
        }
        Ok(Self {
            ptr,
            extent: extent_of(&shape, &strides, elsize),
            data_type,
            elsize,
            holds_objects,
            shape,
            strides,
            _marker: PhantomData,
        })
    }

    /// Re-tags the tensor, e.g. `i64` data as `NanosecondsUtc64` or object cells
    /// as ASCII strings. The new tag must keep the element width.
    pub fn with_data_type(mut self, data_type: DataType) -> Result<Self, IngestError> {
        let compatible = if self.holds_objects {
            data_type.is_dynamic_string()
        } else {
            data_type.fixed_width() == Some(self.elsize)
                && !data_type.is_dynamic_string()
                || data_type.is_fixed_string()
        };
        if !compatible {
            return Err(IngestError::InvalidTensor(format!(
                "Cannot view {}-byte {} elements as {}",
                self.elsize, self.data_type, data_type
            )));
        }
        self.data_type = data_type;
        Ok(self)
    }

    //==============================================================================
    // Accessors
    //==============================================================================

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn elsize(&self) -> usize {
        self.elsize
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Byte strides, one per dimension.
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn num_rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Elements per row: the product of all dimensions after the first.
    pub fn row_elements(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    pub fn holds_objects(&self) -> bool {
        self.holds_objects
    }

    /// `true` when the tensor is laid out in C (row-major) order with elements of
    /// `width` bytes packed back to back. Dimensions of length one are ignored.
    pub fn is_c_style(&self, width: usize) -> bool {
        if width != self.elsize {
            return false;
        }
        let mut expected = width;
        for (&n, &s) in self.shape.iter().zip(&self.strides).rev() {
            if n > 1 && s != expected {
                return false;
            }
            expected *= n;
        }
        true
    }

    pub(crate) fn check_rows(&self, first_row: usize, rows: usize) -> Result<(), IngestError> {
        match first_row.checked_add(rows) {
            Some(end) if end <= self.num_rows() => Ok(()),
            _ => Err(IngestError::OutOfBounds(format!(
                "Rows [{}, {}+{}) requested from tensor with {} rows",
                first_row,
                first_row,
                rows,
                self.num_rows()
            ))),
        }
    }

    fn check_span(&self, byte_offset: usize, len: usize) -> Result<(), IngestError> {
        match byte_offset.checked_add(len) {
            Some(end) if end <= self.extent => Ok(()),
            _ => Err(IngestError::OutOfBounds(format!(
                "Byte range [{}, +{}) outside tensor extent {}",
                byte_offset, len, self.extent
            ))),
        }
    }

    //==============================================================================
    // Element Access (crate-internal)
    //==============================================================================

    /// The contiguous bytes of rows `[first_row, first_row + rows)`. Only valid
    /// for C-style tensors of plain data.
    pub(crate) fn contiguous_bytes(
        &self,
        first_row: usize,
        rows: usize,
    ) -> Result<&'a [u8], IngestError> {
        if self.holds_objects || !self.is_c_style(self.elsize) {
            return Err(IngestError::InternalError(
                "Zero-copy access requested on a non-contiguous tensor".into(),
            ));
        }
        self.check_rows(first_row, rows)?;
        let row_bytes = self.row_elements() * self.elsize;
        let start = first_row * row_bytes;
        let len = rows * row_bytes;
        if len == 0 {
            return Ok(&[]);
        }
        self.check_span(start, len)?;
        // SAFETY: the span lies inside the extent validated at construction, the
        // memory is borrowed for 'a and holds plain data.
        Ok(unsafe { std::slice::from_raw_parts(self.ptr.add(start), len) })
    }

    /// The plain-data element at `byte_offset`.
    pub(crate) fn pod_at<T: Pod>(&self, byte_offset: usize) -> Result<T, IngestError> {
        if self.holds_objects || std::mem::size_of::<T>() != self.elsize {
            return Err(IngestError::SchemaMismatch(format!(
                "Cannot read {} from a tensor of {}-byte {} elements",
                std::any::type_name::<T>(),
                self.elsize,
                self.data_type
            )));
        }
        self.check_span(byte_offset, self.elsize)?;
        // SAFETY: in bounds per the check above; `T: Pod` accepts any bit pattern
        // and the read tolerates misalignment.
        Ok(unsafe { std::ptr::read_unaligned(self.ptr.add(byte_offset) as *const T) })
    }

    /// The object cell at `byte_offset`.
    pub(crate) fn object_at(&self, byte_offset: usize) -> Result<StringObject<'a>, IngestError> {
        if !self.holds_objects {
            return Err(IngestError::UnsupportedType(format!(
                "Tensor of {} does not hold string objects",
                self.data_type
            )));
        }
        self.check_span(byte_offset, self.elsize)?;
        // SAFETY: object tensors are only built from `StringObject` memory
        // (checked by the constructors), and the offset is in bounds.
        Ok(unsafe { std::ptr::read_unaligned(self.ptr.add(byte_offset) as *const StringObject<'a>) })
    }

    /// The fixed-width record of `row`.
    pub(crate) fn record_at(&self, row: usize) -> Result<&'a [u8], IngestError> {
        if self.holds_objects {
            return Err(IngestError::UnsupportedType(
                "Object tensors have no fixed-width records".into(),
            ));
        }
        self.check_rows(row, 1)?;
        let start = row * self.strides[0];
        self.check_span(start, self.elsize)?;
        // SAFETY: in bounds per the check above, memory borrowed for 'a.
        Ok(unsafe { std::slice::from_raw_parts(self.ptr.add(start), self.elsize) })
    }
}
