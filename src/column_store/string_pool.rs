//! The append-only string interner owned by each segment.
//!
//! Every distinct byte string is stored once, as a length-prefixed entry in the
//! pool's storage, and is addressed by the byte position of that entry. Offsets
//! therefore grow monotonically and are never reused. Two offsets at the top of
//! the `u64` range are reserved process-wide for missing values and NaN
//! placeholders; real entries can never reach them.

use hashbrown::hash_map::{DefaultHashBuilder, RawEntryMut};
use hashbrown::HashMap;
use std::hash::BuildHasher;

use super::buffer::OwnedBuffer;
use crate::error::IngestError;

/// Offset of a string within its segment's pool, as stored in string columns.
pub type StringOffset = u64;

/// Stored for a missing (null/None) string cell.
pub const NOT_A_STRING: StringOffset = u64::MAX;
/// Stored for a NaN placeholder in a string column.
pub const NAN_PLACEHOLDER: StringOffset = u64::MAX - 1;

const LEN_PREFIX: usize = std::mem::size_of::<u64>();

/// `true` if `offset` refers to pooled data rather than a sentinel.
pub fn is_a_string(offset: StringOffset) -> bool {
    offset != NOT_A_STRING && offset != NAN_PLACEHOLDER
}

/// The result of interning: the stable offset and whether the entry was new.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetString {
    offset: StringOffset,
    inserted: bool,
}

impl OffsetString {
    pub fn offset(&self) -> StringOffset {
        self.offset
    }

    pub fn was_inserted(&self) -> bool {
        self.inserted
    }
}

pub struct StringPool {
    data: OwnedBuffer,
    // Keys are entry offsets; hashing and equality go through the entry bytes.
    table: HashMap<StringOffset, ()>,
    hasher: DefaultHashBuilder,
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StringPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StringPool")
            .field("strings", &self.len())
            .field("bytes", &self.data.bytes())
            .finish()
    }
}

fn entry_at(data: &[u8], offset: StringOffset) -> Option<&[u8]> {
    let start = usize::try_from(offset).ok()?;
    let prefix: [u8; LEN_PREFIX] = data.get(start..start + LEN_PREFIX)?.try_into().ok()?;
    let len = usize::try_from(u64::from_le_bytes(prefix)).ok()?;
    let body = start + LEN_PREFIX;
    data.get(body..body + len)
}

impl StringPool {
    pub fn new() -> Self {
        Self {
            data: OwnedBuffer::new(),
            table: HashMap::new(),
            hasher: DefaultHashBuilder::default(),
        }
    }

    /// Interns `bytes`, returning the offset of the existing entry when the same
    /// content was seen before.
    pub fn get(&mut self, bytes: &[u8]) -> OffsetString {
        let hash = self.hasher.hash_one(bytes);
        let Self {
            data,
            table,
            hasher,
        } = self;

        let existing = table
            .raw_entry_mut()
            .from_hash(hash, |&offset| entry_at(data.data(), offset) == Some(bytes));

        match existing {
            RawEntryMut::Occupied(entry) => OffsetString {
                offset: *entry.key(),
                inserted: false,
            },
            RawEntryMut::Vacant(entry) => {
                let offset = data.bytes() as StringOffset;
                debug_assert!(is_a_string(offset));
                data.push(bytes.len() as u64);
                data.extend_from_slice(bytes);

                let stored = data.data();
                entry.insert_with_hasher(hash, offset, (), |&key| {
                    hasher.hash_one(entry_at(stored, key).unwrap_or_default())
                });
                OffsetString {
                    offset,
                    inserted: true,
                }
            }
        }
    }

    /// The bytes interned at `offset`.
    pub fn get_const_view(&self, offset: StringOffset) -> Result<&[u8], IngestError> {
        if !is_a_string(offset) {
            return Err(IngestError::OutOfBounds(format!(
                "Sentinel offset {:#x} has no pooled string",
                offset
            )));
        }
        entry_at(self.data.data(), offset).ok_or_else(|| {
            IngestError::OutOfBounds(format!(
                "Offset {} is not a string entry in a pool of {} bytes",
                offset,
                self.data.bytes()
            ))
        })
    }

    /// Number of distinct strings interned.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Bytes used by the pool's storage, including length prefixes.
    pub fn size_bytes(&self) -> usize {
        self.data.bytes()
    }
}
