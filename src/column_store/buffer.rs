//! Engine-owned byte storage, used both as the flatten target and as column
//! storage. Backed by Arrow's `MutableBuffer`, which keeps every allocation
//! 64-byte aligned so typed views via `bytemuck` never fail on alignment.

use arrow::buffer::MutableBuffer;
use bytemuck::Pod;

use crate::error::IngestError;

#[derive(Debug)]
pub struct OwnedBuffer {
    inner: MutableBuffer,
}

impl Default for OwnedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl OwnedBuffer {
    pub fn new() -> Self {
        Self {
            inner: MutableBuffer::new(0),
        }
    }

    /// A zero-filled buffer of exactly `bytes` bytes.
    pub fn presized(bytes: usize) -> Self {
        Self {
            inner: MutableBuffer::from_len_zeroed(bytes),
        }
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            inner: MutableBuffer::with_capacity(bytes),
        }
    }

    /// Copies `values` into a freshly allocated buffer.
    pub fn from_typed<T: Pod>(values: &[T]) -> Self {
        let mut buffer = Self::with_capacity(std::mem::size_of_val(values));
        buffer.extend_from_slice(bytemuck::cast_slice(values));
        buffer
    }

    pub fn bytes(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        self.inner.as_slice()
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.inner.as_slice_mut()
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.inner.extend_from_slice(bytes);
    }

    pub fn push<T: Pod>(&mut self, value: T) {
        self.inner.extend_from_slice(bytemuck::bytes_of(&value));
    }

    pub fn typed<T: Pod>(&self) -> Result<&[T], IngestError> {
        Ok(bytemuck::try_cast_slice(self.data())?)
    }

    pub fn typed_mut<T: Pod>(&mut self) -> Result<&mut [T], IngestError> {
        Ok(bytemuck::try_cast_slice_mut(self.data_mut())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presized_is_zeroed_and_typed() {
        let mut buffer = OwnedBuffer::presized(4 * std::mem::size_of::<f64>());
        assert_eq!(buffer.bytes(), 32);
        assert!(buffer.typed::<f64>().unwrap().iter().all(|v| *v == 0.0));

        buffer.typed_mut::<f64>().unwrap()[2] = 2.5;
        assert_eq!(buffer.typed::<f64>().unwrap()[2], 2.5);
    }

    #[test]
    fn test_typed_view_rejects_partial_elements() {
        let buffer = OwnedBuffer::from_typed(&[1u8, 2, 3]);
        assert!(matches!(
            buffer.typed::<u16>(),
            Err(IngestError::PodCast(_))
        ));
    }
}
