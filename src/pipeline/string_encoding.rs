//! Classification and decoding of variable-length string cells, and the shared
//! decode lock some decodes need.
//!
//! Pure ASCII content never needs the lock. Turning non-ASCII wide code points
//! into UTF-8 does: the lock is taken on the first such cell of a column and
//! kept until the column is finished, since a column with one non-ASCII value
//! tends to have many. The guard is dropped on every exit from the column loop,
//! including encoding errors.

use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use crate::column_store::{StringOffset, NAN_PLACEHOLDER, NOT_A_STRING};
use crate::tensor::StringObject;

//==================================================================================
// 1. The Shared Decode Lock
//==================================================================================

/// Process-wide exclusive access to the decode resource.
#[derive(Debug, Default)]
pub struct DecodeLock {
    mutex: Mutex<()>,
    acquisitions: AtomicUsize,
}

/// Held while decoding; releases the lock on drop.
#[derive(Debug)]
pub struct DecodeGuard<'l> {
    _guard: MutexGuard<'l, ()>,
}

static GLOBAL_DECODE_LOCK: DecodeLock = DecodeLock::new();

impl DecodeLock {
    pub const fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            acquisitions: AtomicUsize::new(0),
        }
    }

    /// The lock shared by every ingestion in the process.
    pub fn global() -> &'static DecodeLock {
        &GLOBAL_DECODE_LOCK
    }

    pub fn acquire(&self) -> DecodeGuard<'_> {
        // The protected state is `()`, so a poisoned lock is still usable.
        let guard = self
            .mutex
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        DecodeGuard { _guard: guard }
    }

    /// How many times the lock has been taken since creation.
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::Relaxed)
    }

    /// `true` if someone currently holds the lock.
    pub fn is_held(&self) -> bool {
        matches!(self.mutex.try_lock(), Err(TryLockError::WouldBlock))
    }
}

/// A lazily-acquired decode guard scoped to one column write.
pub(crate) struct ScopedDecodeLock<'l> {
    lock: &'l DecodeLock,
    guard: Option<DecodeGuard<'l>>,
}

impl<'l> ScopedDecodeLock<'l> {
    pub(crate) fn new(lock: &'l DecodeLock) -> Self {
        Self { lock, guard: None }
    }

    pub(crate) fn ensure_held(&mut self) {
        if self.guard.is_none() {
            log::debug!("Acquiring decode lock for the rest of the column");
            self.guard = Some(self.lock.acquire());
        }
    }

    pub(crate) fn is_held(&self) -> bool {
        self.guard.is_some()
    }
}

//==================================================================================
// 2. Cell Classification & Decoding
//==================================================================================

/// What a cell turned into before interning.
#[derive(Debug, PartialEq)]
pub(crate) enum EncodedCell<'c> {
    Sentinel(StringOffset),
    Content(Cow<'c, [u8]>),
}

/// Classifies one cell and decodes real strings for a column of the given
/// encoding. The `Err` carries the failure reason; the caller attaches the row.
pub(crate) fn encode_cell<'c>(
    cell: StringObject<'c>,
    utf: bool,
    scoped_lock: &mut ScopedDecodeLock<'_>,
) -> Result<EncodedCell<'c>, String> {
    match cell {
        StringObject::None => Ok(EncodedCell::Sentinel(NOT_A_STRING)),
        StringObject::NaN => Ok(EncodedCell::Sentinel(NAN_PLACEHOLDER)),
        StringObject::Bytes(bytes) => {
            if utf {
                std::str::from_utf8(bytes).map_err(|e| format!("invalid UTF-8: {}", e))?;
            }
            Ok(EncodedCell::Content(Cow::Borrowed(bytes)))
        }
        StringObject::Wide(code_points) => {
            if code_points.iter().all(|&cp| cp < 0x80) {
                return Ok(EncodedCell::Content(Cow::Owned(
                    code_points.iter().map(|&cp| cp as u8).collect(),
                )));
            }
            if !utf {
                let cp = code_points.iter().find(|&&cp| cp >= 0x80).copied().unwrap_or_default();
                return Err(format!("non-ASCII code point U+{:04X} in an ASCII column", cp));
            }
            scoped_lock.ensure_held();
            wide_to_utf8(code_points).map(|s| EncodedCell::Content(Cow::Owned(s.into_bytes())))
        }
    }
}

fn wide_to_utf8(code_points: &[u32]) -> Result<String, String> {
    code_points
        .iter()
        .map(|&cp| char::from_u32(cp).ok_or_else(|| format!("invalid code point {:#x}", cp)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide(s: &str) -> Vec<u32> {
        s.chars().map(|c| c as u32).collect()
    }

    #[test]
    fn test_sentinels() {
        let lock = DecodeLock::new();
        let mut scoped = ScopedDecodeLock::new(&lock);
        assert_eq!(
            encode_cell(StringObject::None, true, &mut scoped).unwrap(),
            EncodedCell::Sentinel(NOT_A_STRING)
        );
        assert_eq!(
            encode_cell(StringObject::NaN, false, &mut scoped).unwrap(),
            EncodedCell::Sentinel(NAN_PLACEHOLDER)
        );
    }

    #[test]
    fn test_ascii_wide_does_not_take_lock() {
        let lock = DecodeLock::new();
        let mut scoped = ScopedDecodeLock::new(&lock);
        let cps = wide("plain");
        let cell = encode_cell(StringObject::Wide(&cps), true, &mut scoped).unwrap();
        assert_eq!(cell, EncodedCell::Content(Cow::Owned(b"plain".to_vec())));
        assert!(!scoped.is_held());
        assert_eq!(lock.acquisitions(), 0);
    }

    #[test]
    fn test_non_ascii_wide_takes_lock_once() {
        let lock = DecodeLock::new();
        {
            let mut scoped = ScopedDecodeLock::new(&lock);
            for word in ["café", "naïve", "Zürich"] {
                let cps = wide(word);
                let cell = encode_cell(StringObject::Wide(&cps), true, &mut scoped).unwrap();
                assert_eq!(cell, EncodedCell::Content(Cow::Owned(word.as_bytes().to_vec())));
            }
            assert!(lock.is_held());
        }
        assert!(!lock.is_held());
        assert_eq!(lock.acquisitions(), 1);
    }

    #[test]
    fn test_decode_failures() {
        let lock = DecodeLock::new();
        let mut scoped = ScopedDecodeLock::new(&lock);

        let accented = wide("é");
        let err = encode_cell(StringObject::Wide(&accented), false, &mut scoped).unwrap_err();
        assert!(err.contains("U+00E9"));

        let surrogate = [0xD800u32];
        assert!(encode_cell(StringObject::Wide(&surrogate), true, &mut scoped).is_err());

        let bad_utf8 = [0xffu8, 0xfe];
        assert!(encode_cell(StringObject::Bytes(&bad_utf8), true, &mut scoped).is_err());
        // ASCII columns take raw bytes as they are.
        assert!(encode_cell(StringObject::Bytes(&bad_utf8), false, &mut scoped).is_ok());
    }
}
