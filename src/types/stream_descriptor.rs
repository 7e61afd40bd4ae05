//! The ordered column-name/type schema of a stream, shared by segments, contexts
//! and frame descriptors.

use std::sync::Arc;

use arrow_schema::{Field, Schema, SchemaRef};
use serde::{Deserialize, Serialize};

use super::DataType;
use crate::error::IngestError;

/// How rows of a stream are indexed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// The first `field_count` fields are a nanosecond timestamp index.
    Timestamp,
    /// Rows are addressed by position only.
    #[default]
    RowCount,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub kind: IndexKind,
    pub field_count: u32,
}

impl IndexDescriptor {
    pub fn timestamp() -> Self {
        Self {
            kind: IndexKind::Timestamp,
            field_count: 1,
        }
    }

    pub fn row_count() -> Self {
        Self::default()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub data_type: DataType,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub stream_id: String,
    pub index: IndexDescriptor,
    pub fields: Vec<FieldDescriptor>,
}

impl StreamDescriptor {
    pub fn new(
        stream_id: impl Into<String>,
        index: IndexDescriptor,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        Self {
            stream_id: stream_id.into(),
            index,
            fields,
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, pos: usize) -> Result<&FieldDescriptor, IngestError> {
        self.fields.get(pos).ok_or_else(|| {
            IngestError::OutOfBounds(format!(
                "Field {} requested from stream '{}' with {} fields",
                pos,
                self.stream_id,
                self.fields.len()
            ))
        })
    }

    pub fn find_field(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// The descriptor of the contiguous field sub-range `[first, last)`, used for
    /// column-sliced segments. Index fields are kept only if they fall in range.
    pub fn subset(&self, first: usize, last: usize) -> Result<Self, IngestError> {
        if first > last || last > self.fields.len() {
            return Err(IngestError::OutOfBounds(format!(
                "Field range [{}, {}) outside stream '{}' with {} fields",
                first,
                last,
                self.stream_id,
                self.fields.len()
            )));
        }
        let index_fields = (self.index.field_count as usize).saturating_sub(first);
        let index = if first < self.index.field_count as usize {
            IndexDescriptor {
                kind: self.index.kind,
                field_count: index_fields.min(last - first) as u32,
            }
        } else {
            IndexDescriptor::row_count()
        };
        Ok(Self {
            stream_id: self.stream_id.clone(),
            index,
            fields: self.fields[first..last].to_vec(),
        })
    }

    /// Exports the schema as an Arrow schema. Every field is nullable since
    /// strings carry null sentinels and sparse floats carry absent rows.
    pub fn to_arrow_schema(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .fields
            .iter()
            .map(|f| Field::new(f.name.clone(), f.data_type.to_arrow_type(None), true))
            .collect();
        Arc::new(Schema::new(fields))
    }

    /// Builds a descriptor from an Arrow schema, e.g. one recovered from an
    /// existing index segment.
    pub fn from_arrow_schema(
        stream_id: impl Into<String>,
        index: IndexDescriptor,
        schema: &Schema,
    ) -> Result<Self, IngestError> {
        let fields = schema
            .fields()
            .iter()
            .map(|f| Ok(FieldDescriptor::new(f.name().clone(), DataType::from_arrow_type(f.data_type())?)))
            .collect::<Result<Vec<_>, IngestError>>()?;
        Ok(Self::new(stream_id, index, fields))
    }
}
