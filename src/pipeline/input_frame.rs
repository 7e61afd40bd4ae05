//! The unit of ingestion: one logical frame handed over by the host.

use super::descriptor::{NormalizationMetadata, UserMetadata};
use crate::error::IngestError;
use crate::tensor::NativeTensor;
use crate::types::StreamDescriptor;

/// A frame to ingest: a stream schema and one source tensor per field, in
/// field order. The tensors borrow host memory for `'a`.
#[derive(Debug, Clone)]
pub struct InputTensorFrame<'a> {
    pub desc: StreamDescriptor,
    pub field_tensors: Vec<NativeTensor<'a>>,
    pub norm_meta: NormalizationMetadata,
    pub user_meta: Option<UserMetadata>,
    pub num_rows: usize,
    /// First row of this frame within the stream; non-zero when appending.
    pub offset: usize,
    pub bucketize_dynamic: bool,
}

impl<'a> InputTensorFrame<'a> {
    pub fn new(
        desc: StreamDescriptor,
        field_tensors: Vec<NativeTensor<'a>>,
        norm_meta: NormalizationMetadata,
    ) -> Result<Self, IngestError> {
        if field_tensors.len() != desc.field_count() {
            return Err(IngestError::SchemaMismatch(format!(
                "Stream '{}' declares {} fields but {} tensors were supplied",
                desc.stream_id,
                desc.field_count(),
                field_tensors.len()
            )));
        }
        let num_rows = field_tensors.first().map(|t| t.num_rows()).unwrap_or(0);
        for (field, tensor) in desc.fields.iter().zip(&field_tensors) {
            if tensor.num_rows() != num_rows {
                return Err(IngestError::InvalidTensor(format!(
                    "Field '{}' has {} rows, expected {}",
                    field.name,
                    tensor.num_rows(),
                    num_rows
                )));
            }
        }
        Ok(Self {
            desc,
            field_tensors,
            norm_meta,
            user_meta: None,
            num_rows,
            offset: 0,
            bucketize_dynamic: false,
        })
    }

    pub fn with_user_metadata(mut self, user_meta: UserMetadata) -> Self {
        self.user_meta = Some(user_meta);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_bucketize_dynamic(mut self, bucketize_dynamic: bool) -> Self {
        self.bucketize_dynamic = bucketize_dynamic;
        self
    }

    pub fn num_columns(&self) -> usize {
        self.field_tensors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, FieldDescriptor, IndexDescriptor};

    fn descriptor() -> StreamDescriptor {
        StreamDescriptor::new(
            "quotes",
            IndexDescriptor::row_count(),
            vec![
                FieldDescriptor::new("bid", DataType::Float64),
                FieldDescriptor::new("size", DataType::UInt32),
            ],
        )
    }

    #[test]
    fn test_row_counts_must_agree() {
        let bids = [1.0f64, 2.0, 3.0];
        let sizes = [10u32, 20];
        let tensors = vec![NativeTensor::from_slice(&bids), NativeTensor::from_slice(&sizes)];
        let err = InputTensorFrame::new(descriptor(), tensors, NormalizationMetadata::Raw).unwrap_err();
        assert!(matches!(err, IngestError::InvalidTensor(_)));
    }

    #[test]
    fn test_tensor_per_field() {
        let bids = [1.0f64];
        let err = InputTensorFrame::new(
            descriptor(),
            vec![NativeTensor::from_slice(&bids)],
            NormalizationMetadata::Raw,
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::SchemaMismatch(_)));
    }

    #[test]
    fn test_builder_fields() {
        let bids = [1.0f64, 2.0];
        let sizes = [10u32, 20];
        let frame = InputTensorFrame::new(
            descriptor(),
            vec![NativeTensor::from_slice(&bids), NativeTensor::from_slice(&sizes)],
            NormalizationMetadata::Raw,
        )
        .unwrap()
        .with_offset(40)
        .with_bucketize_dynamic(true);
        assert_eq!(frame.num_rows, 2);
        assert_eq!(frame.offset, 40);
        assert!(frame.bucketize_dynamic);
        assert!(frame.user_meta.is_none());
    }
}
